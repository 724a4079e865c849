// Graph nodes.
//
// Every node has a `next` pointer; containers additionally own child nodes
// whose tails are wired to the container's `next`, so the search can always
// continue from any node by following `next` alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use morphgraph_core::{Form, MorphemeLabel, NodeId, WritingSystem};

use crate::allomorph::Allomorph;
use crate::index::{NodeIndex, RuleIndex, StemListIndex};

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A morpheme slot with its candidate allomorphs.
    Morpheme {
        allomorphs: Vec<Arc<Allomorph>>,
        /// Allomorph-generation rule sets applied when the grammar is linked.
        rules: Vec<RuleIndex>,
    },
    /// Any matching stem from a stem store.
    StemList { list: StemListIndex },
    /// Alternative paths, all tried.
    Fork { paths: Vec<NodeIndex> },
    /// A linear sub-graph. A non-sequence path may be skipped as a whole when
    /// optional; a sequence is skippable only through its children.
    Path {
        children: Vec<NodeIndex>,
        sequence: bool,
    },
    /// Non-consuming edge to another node, bounded per derivation.
    Jump {
        target_id: NodeId,
        target: Option<NodeIndex>,
        /// The jump target may not be skipped.
        target_required: bool,
    },
    /// Sibling morpheme nodes starting at the same position.
    MutuallyExclusive { morphemes: Vec<NodeIndex> },
    /// Graph root.
    Model {
        children: Vec<NodeIndex>,
        has_zero_length_forms: bool,
    },
    /// A clone of another node, materialized by the linker.
    Copy {
        source_id: NodeId,
        suffix: String,
        clone: Option<NodeIndex>,
    },
}

impl NodeKind {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Morpheme { .. } => "morpheme",
            NodeKind::StemList { .. } => "stem_list",
            NodeKind::Fork { .. } => "fork",
            NodeKind::Path { sequence: false, .. } => "path",
            NodeKind::Path { sequence: true, .. } => "sequence",
            NodeKind::Jump { .. } => "jump",
            NodeKind::MutuallyExclusive { .. } => "mutually_exclusive",
            NodeKind::Model { .. } => "model",
            NodeKind::Copy { .. } => "copy",
        }
    }

    /// Nodes owned by this one (not including `next` or jump targets).
    pub fn children(&self) -> Vec<NodeIndex> {
        match self {
            NodeKind::Fork { paths } => paths.clone(),
            NodeKind::Path { children, .. } | NodeKind::Model { children, .. } => children.clone(),
            NodeKind::MutuallyExclusive { morphemes } => morphemes.clone(),
            NodeKind::Copy {
                clone: Some(clone), ..
            } => vec![*clone],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    label: MorphemeLabel,
    optional: bool,
    next: Option<NodeIndex>,
    model: Option<NodeIndex>,
    has_path_to_end: bool,
    glosses: BTreeMap<WritingSystem, Form>,
    kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, label: MorphemeLabel, kind: NodeKind) -> Self {
        let optional = matches!(kind, NodeKind::Jump { .. });
        Self {
            id,
            label,
            optional,
            next: None,
            model: None,
            has_path_to_end: false,
            glosses: BTreeMap::new(),
            kind,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn label(&self) -> &MorphemeLabel {
        &self.label
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub(crate) fn set_optional(&mut self, optional: bool) {
        // Jumps are always optional; a sequence is a plain linear insert and
        // never is.
        self.optional = match self.kind {
            NodeKind::Jump { .. } => true,
            NodeKind::Path { sequence: true, .. } => false,
            _ => optional,
        };
    }

    /// Whether this node is a sequence, which splices its children in place.
    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Path { sequence: true, .. })
    }

    pub fn next(&self) -> Option<NodeIndex> {
        self.next
    }

    pub(crate) fn set_next_field(&mut self, next: Option<NodeIndex>) {
        self.next = next;
    }

    pub fn model(&self) -> Option<NodeIndex> {
        self.model
    }

    pub(crate) fn set_model(&mut self, model: NodeIndex) {
        self.model = Some(model);
    }

    /// Whether the end of the graph is reachable from here through optional
    /// nodes only. Computed by the linker.
    pub fn has_path_to_end(&self) -> bool {
        self.has_path_to_end
    }

    pub(crate) fn set_has_path_to_end(&mut self, value: bool) {
        self.has_path_to_end = value;
    }

    pub fn gloss(&self, ws: &WritingSystem) -> Option<&Form> {
        self.glosses.get(ws)
    }

    pub fn set_gloss(&mut self, gloss: Form) {
        self.glosses.insert(gloss.writing_system().clone(), gloss);
    }

    pub(crate) fn glosses(&self) -> &BTreeMap<WritingSystem, Form> {
        &self.glosses
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Allomorphs of a morpheme node; empty for every other kind.
    pub fn allomorphs(&self) -> &[Arc<Allomorph>] {
        match &self.kind {
            NodeKind::Morpheme { allomorphs, .. } => allomorphs,
            _ => &[],
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self.kind, NodeKind::Model { .. })
    }

    pub fn is_morpheme(&self) -> bool {
        matches!(self.kind, NodeKind::Morpheme { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumps_are_always_optional() {
        let mut jump = Node::new(
            NodeId::new("j"),
            MorphemeLabel::new("j"),
            NodeKind::Jump {
                target_id: NodeId::new("x"),
                target: None,
                target_required: false,
            },
        );
        assert!(jump.is_optional());
        jump.set_optional(false);
        assert!(jump.is_optional());
        assert_eq!(jump.kind().name(), "jump");
    }

    #[test]
    fn sequences_are_never_optional() {
        let mut seq = Node::new(
            NodeId::new("s"),
            MorphemeLabel::new("s"),
            NodeKind::Path {
                children: vec![NodeIndex(1)],
                sequence: true,
            },
        );
        seq.set_optional(true);
        assert!(seq.is_sequence());
        assert!(!seq.is_optional());
    }

    #[test]
    fn container_children() {
        let path = NodeKind::Path {
            children: vec![NodeIndex(1), NodeIndex(2)],
            sequence: true,
        };
        assert_eq!(path.children().len(), 2);
        assert_eq!(path.name(), "sequence");
        let copy = NodeKind::Copy {
            source_id: NodeId::new("s"),
            suffix: "2".into(),
            clone: None,
        };
        assert!(copy.children().is_empty());
    }
}
