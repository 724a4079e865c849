//! Traversal and constraint engine for finite-state morphological models.
//!
//! A morphological model is a directed graph of morpheme nodes. Parsing walks
//! the graph consuming an input form; generation walks the same graph
//! consuming a target morpheme sequence and emitting allomorphs. Both share
//! one backtracking search, bounded on cycles by a per-jump traversal budget.
//!
//! # Architecture
//!
//! - [`index`] -- Typed arena handles
//! - [`allomorph`] -- Allomorphs and portmanteaux
//! - [`stem`] -- Lexical stems and the [`StemStore`](stem::StemStore) interface
//! - [`constraint`] -- Match, local, long-distance and nested constraints
//! - [`rules`] -- Allomorph-generation rule sets applied at load time
//! - [`steps`] -- Persistent step list shared between search branches
//! - [`parsing`] -- Parsing state object
//! - [`generation`] -- Generation state and its goal queues
//! - [`node`] -- Graph node variants
//! - [`grammar`] -- The node/constraint arena and its builder
//! - [`link`] -- Post-load linking passes
//! - [`traverse`] -- The search itself
//! - [`config`] -- Traversal configuration threaded through every call
//! - [`log`] -- Diagnostic hooks invoked during traversal

pub mod allomorph;
pub mod config;
pub mod constraint;
pub mod generation;
pub mod grammar;
pub mod index;
mod link;
pub mod log;
pub mod node;
pub mod parsing;
pub mod rules;
pub mod stem;
pub mod steps;
pub mod traverse;

pub use allomorph::{Allomorph, AllomorphKind, Portmanteau};
pub use config::{MAXIMUM_JUMPS, Mode, ParseFlags, TraversalConfig};
pub use constraint::{Constraint, ConstraintKind, ConstraintType};
pub use generation::{Generation, MorphemeSequenceConstraint, StemIdentityConstraint};
pub use grammar::{Grammar, GrammarBuilder};
pub use index::{ConstraintIndex, NodeIndex, RuleIndex, StemListIndex};
pub use log::{NullLog, ParsingLog, TracingLog};
pub use node::{Node, NodeKind};
pub use parsing::{Parsing, Status};
pub use stem::{LexicalStem, MemoryStemList, StemId, StemStore};
pub use traverse::Traversal;

use morphgraph_core::{MorphemeLabel, NodeId};

/// Error type for grammar construction, linking and stem storage.
///
/// Every variant is a configuration or data-authoring mistake. Traversal
/// dead ends are never errors; they are empty result lists.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("jump {jump} targets unknown node {target}")]
    UnresolvedJump { jump: NodeId, target: NodeId },
    #[error("copy {copy} refers to unknown node {source_id}")]
    UnresolvedCopy { copy: NodeId, source_id: NodeId },
    #[error("copy {0} is part of a copy cycle")]
    CopyCycle(NodeId),
    #[error("constraint pointer to unknown constraint {0:?}")]
    UnresolvedPointer(String),
    #[error("constraint pointer cycle through {0:?}")]
    PointerCycle(String),
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(String),
    #[error("duplicate constraint name {0:?}")]
    DuplicateConstraint(String),
    #[error("nested constraint {name:?} mixes {first:?} and {second:?} children")]
    InconsistentNestedConstraint {
        name: String,
        first: ConstraintType,
        second: ConstraintType,
    },
    #[error("portmanteau on node {node}: {reason}")]
    Portmanteau { node: NodeId, reason: String },
    #[error("portmanteau on node {node} cannot reach a morpheme node labelled {label}")]
    UnresolvedPortmanteau { node: NodeId, label: MorphemeLabel },
    #[error("unknown allomorph rule set {0:?}")]
    UnknownAllomorphRule(String),
    #[error("unknown stem list {0:?}")]
    UnknownStemList(String),
    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("model {0} has no nodes")]
    EmptyModel(NodeId),
    #[error("node {0} is not a model")]
    NotAModel(NodeId),
    #[error("unknown lexical stem {0}")]
    UnknownStem(StemId),
    #[error("stem list {list:?} is read-only")]
    ReadOnlyStemList { list: String },
}

/// Compile a regex, mapping failures to [`GrammarError::InvalidRegex`].
pub fn compile_regex(pattern: &str) -> Result<regex::Regex, GrammarError> {
    regex::Regex::new(pattern).map_err(|source| GrammarError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}
