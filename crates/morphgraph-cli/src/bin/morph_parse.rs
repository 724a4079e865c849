// morph-parse: Morphological parsing of words.
//
// Parses each word against every model and prints one line per completed
// parse: the morpheme-label summary followed by the stems it used.
//
// Usage:
//   morph-parse [-m MODEL] [-w WS] [--unique] [--first] [WORD...]
//
// Options:
//   -m, --model PATH   Model definition (JSON)
//   -w, --ws ABBR      Input writing system (default: the model's first)
//   --unique           Collapse parses with equal labels and stems
//   --first            Stop at the first parse
//   -h, --help         Print help

use std::io::{self, Write};

use morphgraph::{Form, ParseFlags};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (model_path, args) = morphgraph_cli::parse_model_path(&args);
    let (ws, args) =
        morphgraph_cli::take_option(&args, "--ws", Some("-w")).unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let (unique, args) = morphgraph_cli::take_flag(&args, "--unique");
    let (first, args) = morphgraph_cli::take_flag(&args, "--first");

    if morphgraph_cli::wants_help(&args) {
        println!("morph-parse: Morphological parsing of words.");
        println!();
        println!("Usage: morph-parse [-m MODEL] [-w WS] [--unique] [--first] [WORD...]");
        println!();
        println!("If WORD arguments are given, parses each word.");
        println!("Otherwise reads words from stdin (one per line).");
        println!();
        println!("Options:");
        println!("  -m, --model PATH   Model definition (JSON)");
        println!("  -w, --ws ABBR      Input writing system");
        println!("  --unique           Collapse parses with equal labels and stems");
        println!("  --first            Stop at the first parse");
        println!("  -h, --help         Print this help");
        return;
    }

    morphgraph_cli::init_logging();
    let words: Vec<String> = args.iter().filter(|a| !a.starts_with('-')).cloned().collect();

    let morphology = morphgraph_cli::load_morphology(model_path.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let ws = morphgraph_cli::resolve_writing_system(&morphology, ws.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let flags = if first { ParseFlags::only_one() } else { ParseFlags::default() };

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for word in morphgraph_cli::input_lines(words) {
        let form = Form::new(ws.clone(), &word);
        let parses = if unique {
            morphology.unique_parsings(&form, flags)
        } else {
            morphology.possible_parsings(&form, flags)
        };
        if parses.is_empty() {
            let _ = writeln!(out, "{word}: (no parse)");
            continue;
        }
        let _ = writeln!(out, "{word}:");
        for p in &parses {
            let _ = writeln!(out, "  {}", morphgraph_cli::describe_parsing(p, &ws));
        }
    }
}
