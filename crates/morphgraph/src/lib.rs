//! Morphological parsing and generation over declarative node-graph models.
//!
//! A [`Morphology`] owns a linked [`Grammar`] plus the writing systems and
//! input normalizers it was loaded with. Models are usually read from a JSON
//! [`ModelDefinition`]; the [`GrammarBuilder`] API builds the same graph in
//! code.
//!
//! ```no_run
//! use morphgraph::{Morphology, ParseFlags};
//!
//! let morphology = Morphology::from_path("model.json")?;
//! let en = morphology.writing_system("en").cloned().unwrap_or_default();
//! for parse in morphology.possible_parsings(&morphgraph::Form::new(en, "katiting"), ParseFlags::default()) {
//!     println!("{}", parse.summary());
//! }
//! # Ok::<(), morphgraph::MorphologyError>(())
//! ```
//!
//! # Architecture
//!
//! - [`definition`] -- Serde model format and the loader that turns it into a grammar
//! - [`morphology`] -- The facade: parse, guess, generate, transduce, stem editing

pub mod definition;
pub mod morphology;

pub use definition::ModelDefinition;
pub use morphology::Morphology;

pub use morphgraph_core::{
    CoreError, Form, MorphemeLabel, MorphemeSequence, NodeId, Normalizer, Tag, TextDirection,
    WritingSystem,
};
pub use morphgraph_engine::{
    Allomorph, AllomorphKind, Constraint, ConstraintKind, Generation, Grammar, GrammarBuilder,
    GrammarError, LexicalStem, MemoryStemList, Mode, MorphemeSequenceConstraint, Node, NodeKind,
    NullLog, ParseFlags, Parsing, ParsingLog, Portmanteau, StemId, StemIdentityConstraint,
    StemStore, TracingLog, TraversalConfig,
};

use std::path::PathBuf;

/// Error type for model loading and facade operations.
#[derive(Debug, thiserror::Error)]
pub enum MorphologyError {
    /// The graph could not be built or linked.
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// A value type (normalizer pattern, morpheme sequence) was malformed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The model document is not valid JSON or does not fit the schema.
    #[error("invalid model definition: {0}")]
    Definition(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model document declares no writing systems.
    #[error("model definition declares no writing systems")]
    NoWritingSystem,

    #[error("unknown writing system {0:?}")]
    UnknownWritingSystem(String),

    #[error("unknown model {0:?}")]
    UnknownModel(String),

    #[error("unknown stem list {0:?}")]
    UnknownStemList(String),

    /// `search_stem` found nothing.
    #[error("no stem matches {0:?}")]
    NoMatchingStem(String),

    /// `search_stem` found more than one stem.
    #[error("{count} stems match {text:?}")]
    AmbiguousStem { text: String, count: usize },

    /// No writable stem list admits the stem's tags.
    #[error("no writable stem list accepts stem {0:?}")]
    StemRejected(String),
}
