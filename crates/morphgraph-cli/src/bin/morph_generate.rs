// morph-generate: Generate surface forms from stems and morpheme labels.
//
// Each request is a stem list and a morpheme sequence separated by
// whitespace. Stems are looked up by form or gloss and joined with `+`;
// `-` stands for no stems.
//
//   katit [Stem][-ing]
//   stroll [Stem]
//   - [go][PAST]
//
// Usage:
//   morph-generate [-m MODEL] [-w WS] [--in MODEL_ID] [REQUEST...]
//
// Options:
//   -m, --model PATH   Model definition (JSON)
//   -w, --ws ABBR      Output writing system (default: the model's first)
//   --in MODEL_ID      Generate in one model only
//   -h, --help         Print help

use std::io::{self, Write};
use std::sync::Arc;

use morphgraph::{
    LexicalStem, MorphemeSequence, MorphemeSequenceConstraint, Morphology, StemIdentityConstraint,
};

/// Split a request into its stems and its target sequence.
fn parse_request(
    morphology: &Morphology,
    request: &str,
) -> Result<(Vec<Arc<LexicalStem>>, MorphemeSequence), String> {
    let (stems, sequence) = request
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected: STEMS SEQUENCE".to_string())?;
    let sequence: MorphemeSequence = sequence.trim().parse().map_err(|e| format!("{e}"))?;
    if stems == "-" {
        return Ok((Vec::new(), sequence));
    }
    let stems = stems
        .split('+')
        .map(|s| morphology.search_stem(s).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((stems, sequence))
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (model_path, args) = morphgraph_cli::parse_model_path(&args);
    let (ws, args) =
        morphgraph_cli::take_option(&args, "--ws", Some("-w")).unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let (only_model, args) =
        morphgraph_cli::take_option(&args, "--in", None).unwrap_or_else(|e| morphgraph_cli::fatal(&e));

    if morphgraph_cli::wants_help(&args) {
        println!("morph-generate: Generate surface forms.");
        println!();
        println!("Usage: morph-generate [-m MODEL] [-w WS] [--in MODEL_ID] [REQUEST...]");
        println!();
        println!("A request is STEMS SEQUENCE, e.g. \"katit [Stem][-ing]\".");
        println!("STEMS is a +-joined list of stem forms or glosses, or - for none.");
        println!("If no REQUEST arguments are given, reads requests from stdin.");
        println!();
        println!("Options:");
        println!("  -m, --model PATH   Model definition (JSON)");
        println!("  -w, --ws ABBR      Output writing system");
        println!("  --in MODEL_ID      Generate in one model only");
        println!("  -h, --help         Print this help");
        return;
    }

    morphgraph_cli::init_logging();
    let requests = args;

    let morphology = morphgraph_cli::load_morphology(model_path.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let ws = morphgraph_cli::resolve_writing_system(&morphology, ws.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for request in morphgraph_cli::input_lines(requests) {
        let (stems, sequence) = match parse_request(&morphology, &request) {
            Ok(r) => r,
            Err(e) => {
                let _ = writeln!(out, "{request}: error: {e}");
                continue;
            }
        };
        let generated = morphology.generate_forms(
            &ws,
            StemIdentityConstraint::new(stems),
            MorphemeSequenceConstraint::new(&sequence),
            only_model.as_deref(),
        );
        match generated {
            Ok(g) if g.is_empty() => {
                let _ = writeln!(out, "{request}: (no form)");
            }
            Ok(g) => {
                let forms: Vec<String> = g.iter().map(|g| g.output().text().to_string()).collect();
                let _ = writeln!(out, "{request}: {}", forms.join(", "));
            }
            Err(e) => morphgraph_cli::fatal(&e.to_string()),
        }
    }
}
