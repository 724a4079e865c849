// morphgraph-cli: shared utilities for CLI tools.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;

use morphgraph::{Morphology, MorphologyError, Parsing, WritingSystem};
use tracing_subscriber::EnvFilter;

/// Model file name looked up in the fallback directories.
const MODEL_FILE: &str = "model.json";

/// Environment variable naming a model file or a directory containing one.
const MODEL_ENV: &str = "MORPHGRAPH_MODEL";

/// Environment variable holding a `tracing` filter for diagnostics.
const LOG_ENV: &str = "MORPHGRAPH_LOG";

/// Search for a model file and load it.
///
/// Search order:
/// 1. `model_path` argument (if provided)
/// 2. `MORPHGRAPH_MODEL` environment variable
/// 3. `~/.morphgraph/model.json`
/// 4. `model.json` in the current working directory
pub fn load_morphology(model_path: Option<&str>) -> Result<Morphology, String> {
    let search_paths = build_search_paths(model_path);

    for candidate in &search_paths {
        let path = if candidate.is_dir() {
            candidate.join(MODEL_FILE)
        } else {
            candidate.clone()
        };
        if path.is_file() {
            return Morphology::from_path(&path)
                .map_err(|e: MorphologyError| format!("failed to load {}: {e}", path.display()));
        }
    }

    Err(format!(
        "could not find {} in any of the search paths:\n{}",
        MODEL_FILE,
        search_paths
            .iter()
            .map(|p| format!("  - {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n")
    ))
}

/// Build the list of files and directories to search for a model.
fn build_search_paths(model_path: Option<&str>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(p) = model_path {
        paths.push(PathBuf::from(p));
    }

    if let Ok(env_path) = std::env::var(MODEL_ENV) {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".morphgraph"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Remove `--long=VALUE`, `--long VALUE` or `-s VALUE` from `args`.
///
/// Returns `(value, remaining_args)`. The last occurrence wins.
pub fn take_option(
    args: &[String],
    long: &str,
    short: Option<&str>,
) -> Result<(Option<String>, Vec<String>), String> {
    let prefix = format!("{long}=");
    let mut value = None;
    let mut remaining = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if let Some(v) = arg.strip_prefix(&prefix) {
            value = Some(v.to_string());
        } else if arg == long || Some(arg.as_str()) == short {
            match iter.next() {
                Some(v) => value = Some(v.clone()),
                None => return Err(format!("{arg} requires a value")),
            }
        } else {
            remaining.push(arg.clone());
        }
    }

    Ok((value, remaining))
}

/// Parse a `--model=PATH` or `-m PATH` argument from command line args.
pub fn parse_model_path(args: &[String]) -> (Option<String>, Vec<String>) {
    take_option(args, "--model", Some("-m")).unwrap_or_else(|e| fatal(&e))
}

/// Remove a boolean flag from `args`, reporting whether it was present.
pub fn take_flag(args: &[String], flag: &str) -> (bool, Vec<String>) {
    let present = args.iter().any(|a| a == flag);
    let remaining = args.iter().filter(|a| *a != flag).cloned().collect();
    (present, remaining)
}

/// The named writing system, or the model's default one.
pub fn resolve_writing_system(
    morphology: &Morphology,
    abbreviation: Option<&str>,
) -> Result<WritingSystem, String> {
    match abbreviation {
        Some(a) => morphology.writing_system(a).cloned().ok_or_else(|| {
            let known: Vec<&str> = morphology
                .writing_systems()
                .iter()
                .map(WritingSystem::abbreviation)
                .collect();
            format!("unknown writing system {a:?} (model has: {})", known.join(", "))
        }),
        None => morphology
            .default_writing_system()
            .cloned()
            .ok_or_else(|| "model declares no writing systems".to_string()),
    }
}

/// Words from the positional arguments, or from stdin (one per line) when
/// there are none. Blank lines are skipped.
pub fn input_lines(words: Vec<String>) -> Box<dyn Iterator<Item = String>> {
    if !words.is_empty() {
        return Box::new(words.into_iter());
    }
    let lines = io::stdin().lock().lines().map_while(|line| match line {
        Ok(l) => Some(l),
        Err(e) => {
            eprintln!("error reading stdin: {e}");
            None
        }
    });
    Box::new(
        lines
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    )
}

/// One-line description of a parse: label summary plus its stems.
pub fn describe_parsing(parsing: &Parsing, ws: &WritingSystem) -> String {
    let stems: Vec<String> = parsing
        .stems()
        .iter()
        .map(|s| {
            let text = s.display_text(ws).unwrap_or("?");
            match s.glosses().next() {
                Some(g) => format!("{text} ({})", g.text()),
                None => text.to_string(),
            }
        })
        .collect();
    if stems.is_empty() {
        parsing.summary()
    } else {
        format!("{}  stems: {}", parsing.summary(), stems.join(", "))
    }
}

/// Send `tracing` output to stderr, filtered by `MORPHGRAPH_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn option_forms() {
        let (v, rest) = take_option(&args(&["-m", "a.json", "word"]), "--model", Some("-m")).unwrap();
        assert_eq!(v.as_deref(), Some("a.json"));
        assert_eq!(rest, args(&["word"]));

        let (v, rest) = take_option(&args(&["word", "--model=b.json"]), "--model", Some("-m")).unwrap();
        assert_eq!(v.as_deref(), Some("b.json"));
        assert_eq!(rest, args(&["word"]));

        let (v, _) = take_option(&args(&["--model", "c.json"]), "--model", None).unwrap();
        assert_eq!(v.as_deref(), Some("c.json"));
    }

    #[test]
    fn option_without_value_is_an_error() {
        assert!(take_option(&args(&["-w"]), "--ws", Some("-w")).is_err());
    }

    #[test]
    fn flags_are_removed() {
        let (unique, rest) = take_flag(&args(&["--unique", "katit"]), "--unique");
        assert!(unique);
        assert_eq!(rest, args(&["katit"]));
        let (unique, _) = take_flag(&args(&["katit"]), "--unique");
        assert!(!unique);
    }

    #[test]
    fn help_detection() {
        assert!(wants_help(&args(&["-h"])));
        assert!(wants_help(&args(&["x", "--help"])));
        assert!(!wants_help(&args(&["x"])));
    }

    #[test]
    fn explicit_path_is_searched_first() {
        let paths = build_search_paths(Some("/tmp/model.json"));
        assert_eq!(paths[0], PathBuf::from("/tmp/model.json"));
    }

    #[test]
    fn missing_model_lists_search_paths() {
        let err = load_morphology(Some("/nonexistent/morphgraph/model.json")).unwrap_err();
        assert!(err.contains("/nonexistent/morphgraph/model.json"));
    }
}
