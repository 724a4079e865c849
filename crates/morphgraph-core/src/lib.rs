//! Shared value types for the morphgraph morphological engine.
//!
//! Everything in this crate is an immutable (or copy-on-write) domain
//! primitive that the traversal engine hashes, compares and clones freely.
//!
//! # Architecture
//!
//! - [`writing_system`] -- Interned script identity plus display metadata
//! - [`ids`] -- Interned identifiers: [`Tag`], [`MorphemeLabel`], [`NodeId`]
//! - [`form`] -- A string in a particular writing system
//! - [`sequence`] -- Ordered morpheme-label sequences (`[a][b][c]`)
//! - [`normalize`] -- Per-writing-system input normalization

pub mod form;
pub mod ids;
pub mod normalize;
pub mod sequence;
pub mod writing_system;

pub use form::Form;
pub use ids::{MorphemeLabel, NodeId, Tag};
pub use normalize::Normalizer;
pub use sequence::MorphemeSequence;
pub use writing_system::{TextDirection, WritingSystem};

/// Error type for value-type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid normalization pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("malformed morpheme sequence {0:?}")]
    MalformedSequence(String),
    #[error("empty identifier")]
    EmptyIdentifier,
}
