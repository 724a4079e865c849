// morph-guess: Suggest stems for words the lexicon does not know.
//
// Parses each word with stem guessing enabled and prints the parses that
// rely on a hypothesized stem, marking the guessed stem text.
//
// Usage:
//   morph-guess [-m MODEL] [-w WS] [--all] [WORD...]
//
// Options:
//   -m, --model PATH   Model definition (JSON)
//   -w, --ws ABBR      Input writing system (default: the model's first)
//   --all              Also print parses that use only known stems
//   -h, --help         Print help

use std::io::{self, Write};

use morphgraph::Form;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (model_path, args) = morphgraph_cli::parse_model_path(&args);
    let (ws, args) =
        morphgraph_cli::take_option(&args, "--ws", Some("-w")).unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let (all, args) = morphgraph_cli::take_flag(&args, "--all");

    if morphgraph_cli::wants_help(&args) {
        println!("morph-guess: Suggest stems for unknown words.");
        println!();
        println!("Usage: morph-guess [-m MODEL] [-w WS] [--all] [WORD...]");
        println!();
        println!("If WORD arguments are given, guesses for each word.");
        println!("Otherwise reads words from stdin (one per line).");
        println!();
        println!("Options:");
        println!("  -m, --model PATH   Model definition (JSON)");
        println!("  -w, --ws ABBR      Input writing system");
        println!("  --all              Also print parses with known stems only");
        println!("  -h, --help         Print this help");
        return;
    }

    morphgraph_cli::init_logging();
    let words: Vec<String> = args.iter().filter(|a| !a.starts_with('-')).cloned().collect();

    let morphology = morphgraph_cli::load_morphology(model_path.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));
    let ws = morphgraph_cli::resolve_writing_system(&morphology, ws.as_deref())
        .unwrap_or_else(|e| morphgraph_cli::fatal(&e));

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for word in morphgraph_cli::input_lines(words) {
        let guesses: Vec<_> = morphology
            .guess_stem(&Form::new(ws.clone(), &word))
            .into_iter()
            .filter(|p| all || p.uses_hypothetical_stem())
            .collect();
        if guesses.is_empty() {
            let _ = writeln!(out, "{word}: (no guess)");
            continue;
        }
        let _ = writeln!(out, "{word}:");
        for p in &guesses {
            let guessed: Vec<String> = p
                .stems()
                .iter()
                .filter(|s| s.is_hypothetical())
                .filter_map(|s| s.display_text(&ws).map(str::to_string))
                .collect();
            let _ = writeln!(
                out,
                "  {}  guessed: {}",
                morphgraph_cli::describe_parsing(p, &ws),
                if guessed.is_empty() { "-".to_string() } else { guessed.join(", ") }
            );
        }
    }
}
