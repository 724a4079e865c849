// Traversal diagnostics.
//
// The search calls these hooks at every decision point. Implementations must
// not influence results; the default `NullLog` does nothing.

use crate::allomorph::Allomorph;
use crate::node::Node;
use crate::parsing::Parsing;

pub trait ParsingLog: Send + Sync {
    /// Whether hooks that need formatted summaries should be called at all.
    fn enabled(&self) -> bool {
        false
    }

    fn enter_node(&self, _node: &Node, _parsing: &Parsing) {}

    fn exit_node(&self, _node: &Node, _results: usize) {}

    fn allomorph_matches(&self, _node: &Node, _allomorph: &Allomorph, _matched: bool) {}

    /// A constraint was evaluated; `summary` describes it.
    fn constraints_checked(&self, _node: &Node, _summary: &str, _satisfied: bool) {}

    fn completed(&self, _parsing: &Parsing) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl ParsingLog for NullLog {}

/// Forwards every hook to `tracing` at TRACE level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ParsingLog for TracingLog {
    fn enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::TRACE)
    }

    fn enter_node(&self, node: &Node, parsing: &Parsing) {
        tracing::trace!(
            node = %node.id(),
            kind = node.kind().name(),
            position = parsing.position(),
            so_far = %parsing.summary(),
            "enter"
        );
    }

    fn exit_node(&self, node: &Node, results: usize) {
        tracing::trace!(node = %node.id(), results, "exit");
    }

    fn allomorph_matches(&self, node: &Node, allomorph: &Allomorph, matched: bool) {
        tracing::trace!(node = %node.id(), allomorph = %allomorph.summary(), matched, "allomorph");
    }

    fn constraints_checked(&self, node: &Node, summary: &str, satisfied: bool) {
        tracing::trace!(node = %node.id(), constraint = summary, satisfied, "constraint");
    }

    fn completed(&self, parsing: &Parsing) {
        tracing::trace!(summary = %parsing.summary(), form = %parsing.form(), "completed");
    }
}
