// Criterion benchmarks for morphgraph.
//
// Uses the English fixture from the integration tests. Set MORPHGRAPH_MODEL
// to benchmark another model file; the word list then comes from
// MORPHGRAPH_WORDS (one word per line) if set.
//
// Run:
//   cargo bench -p morphgraph
//   MORPHGRAPH_MODEL=/path/to/model.json MORPHGRAPH_WORDS=/path/to/words.txt cargo bench -p morphgraph

use criterion::{Criterion, criterion_group, criterion_main};
use morphgraph::{
    Form, MorphemeSequence, MorphemeSequenceConstraint, Morphology, ParseFlags, StemId,
    StemIdentityConstraint,
};

// ---------------------------------------------------------------------------
// Model discovery
// ---------------------------------------------------------------------------

fn model_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("MORPHGRAPH_MODEL") {
        return std::path::PathBuf::from(path);
    }
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/english.json")
}

fn load_words() -> Vec<String> {
    if let Ok(path) = std::env::var("MORPHGRAPH_WORDS") {
        return std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
    }
    [
        "katit", "katiting", "walk", "walking", "sing", "singing", "went", "go", "goed", "kaka",
        "mo", "pasi", "pasni", "xyz",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

fn load_morphology(bench: &str, c: &mut Criterion) -> Option<Morphology> {
    match Morphology::from_path(model_path()) {
        Ok(m) => Some(m),
        Err(e) => {
            eprintln!("[{bench}] model not loaded ({e}) -- skipping (set MORPHGRAPH_MODEL)");
            c.bench_function(&format!("{bench} (skipped)"), |b| b.iter(|| {}));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Parse every word of the word list against every model.
fn bench_parse_words(c: &mut Criterion) {
    let Some(morphology) = load_morphology("parse_words", c) else {
        return;
    };
    let Some(ws) = morphology.default_writing_system().cloned() else {
        return;
    };
    let forms: Vec<Form> = load_words().iter().map(|w| Form::new(ws.clone(), w)).collect();

    c.bench_function("parse_words", |b| {
        b.iter(|| {
            for form in &forms {
                std::hint::black_box(morphology.possible_parsings(form, ParseFlags::default()));
            }
        });
    });
}

/// Parse with stem guessing, which explores every prefix as a stem.
fn bench_guess_stems(c: &mut Criterion) {
    let Some(morphology) = load_morphology("guess_stems", c) else {
        return;
    };
    let Some(ws) = morphology.default_writing_system().cloned() else {
        return;
    };
    let forms: Vec<Form> = load_words().iter().map(|w| Form::new(ws.clone(), w)).collect();

    c.bench_function("guess_stems", |b| {
        b.iter(|| {
            for form in &forms {
                std::hint::black_box(morphology.guess_stem(form));
            }
        });
    });
}

/// Generate the progressive of the fixture's first stem.
fn bench_generate(c: &mut Criterion) {
    let Some(morphology) = load_morphology("generate", c) else {
        return;
    };
    let Some(ws) = morphology.default_writing_system().cloned() else {
        return;
    };
    let Some(list) = morphology.stem_list_names().first().map(|s| s.to_string()) else {
        eprintln!("[generate] model has no stem lists -- skipping");
        return;
    };
    let Ok(stem) = morphology.stem(&list, StemId(1)) else {
        eprintln!("[generate] stem #1 not found in {list} -- skipping");
        return;
    };
    let Ok(target) = "[Stem][-ing]".parse::<MorphemeSequence>() else {
        return;
    };

    c.bench_function("generate_progressive", |b| {
        b.iter(|| {
            std::hint::black_box(morphology.generate_forms(
                &ws,
                StemIdentityConstraint::new(vec![stem.clone()]),
                MorphemeSequenceConstraint::new(&target),
                None,
            ))
        });
    });
}

/// Full parse -> generate round trip into the second writing system.
fn bench_transduce(c: &mut Criterion) {
    let Some(morphology) = load_morphology("transduce", c) else {
        return;
    };
    let [source, target, ..] = morphology.writing_systems() else {
        eprintln!("[transduce] model declares fewer than two writing systems -- skipping");
        return;
    };
    let forms: Vec<Form> = load_words()
        .iter()
        .map(|w| Form::new(source.clone(), w))
        .collect();

    c.bench_function("transduce_words", |b| {
        b.iter(|| {
            for form in &forms {
                std::hint::black_box(morphology.transduce_into(form, target));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_parse_words,
    bench_guess_stems,
    bench_generate,
    bench_transduce,
);
criterion_main!(benches);
