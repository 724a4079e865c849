// morph-transduce: Rewrite words into another writing system.
//
// Parses each word, then regenerates every parse in the target writing
// system with the same stems and morpheme labels. With --stem, the first
// stem of each parse is replaced instead and the output stays in the input
// writing system.
//
// Usage:
//   morph-transduce [-m MODEL] [-w WS] (-t TARGET | --stem STEM) [WORD...]
//
// Options:
//   -m, --model PATH     Model definition (JSON)
//   -w, --ws ABBR        Input writing system (default: the model's first)
//   -t, --target ABBR    Output writing system
//   --stem TEXT          Replacement stem, looked up by form or gloss
//   -h, --help           Print help

use std::io::{self, Write};

use morphgraph::Form;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (model_path, args) = morphgraph_cli::parse_model_path(&args);
    let (ws, args) =
        morphgraph_cli::take_option(&args, "--ws", Some("-w")).unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let (target, args) = morphgraph_cli::take_option(&args, "--target", Some("-t"))
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let (stem, args) =
        morphgraph_cli::take_option(&args, "--stem", None).unwrap_or_else(|e| morphgraph_cli::fatal(&e));

    if morphgraph_cli::wants_help(&args) || (target.is_none() && stem.is_none()) {
        println!("morph-transduce: Rewrite words into another writing system or stem.");
        println!();
        println!("Usage: morph-transduce [-m MODEL] [-w WS] (-t TARGET | --stem STEM) [WORD...]");
        println!();
        println!("If WORD arguments are given, transduces each word.");
        println!("Otherwise reads words from stdin (one per line).");
        println!();
        println!("Options:");
        println!("  -m, --model PATH     Model definition (JSON)");
        println!("  -w, --ws ABBR        Input writing system");
        println!("  -t, --target ABBR    Output writing system");
        println!("  --stem TEXT          Replacement stem (form or gloss)");
        println!("  -h, --help           Print this help");
        return;
    }

    morphgraph_cli::init_logging();
    let words: Vec<String> = args.iter().filter(|a| !a.starts_with('-')).cloned().collect();

    let morphology = morphgraph_cli::load_morphology(model_path.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let ws = morphgraph_cli::resolve_writing_system(&morphology, ws.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let target = match &target {
        Some(t) => Some(
            morphgraph_cli::resolve_writing_system(&morphology, Some(t))
                .unwrap_or_else(|e| morphgraph_cli::fatal(&e)),
        ),
        None => None,
    };
    let replacement = match &stem {
        Some(s) => Some(
            morphology
                .search_stem(s)
                .unwrap_or_else(|e| morphgraph_cli::fatal(&e.to_string())),
        ),
        None => None,
    };

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for word in morphgraph_cli::input_lines(words) {
        let form = Form::new(ws.clone(), &word);
        let generated = match (&replacement, &target) {
            (Some(stem), _) => morphology.replace_stem_into(&form, stem.clone()),
            (None, Some(target)) => morphology.transduce_into(&form, target),
            (None, None) => Vec::new(),
        };
        if generated.is_empty() {
            let _ = writeln!(out, "{word}: (no transduction)");
            continue;
        }
        let forms: Vec<String> = generated
            .iter()
            .map(|g| g.output().text().to_string())
            .collect();
        let _ = writeln!(out, "{word}: {}", forms.join(", "));
    }
}
