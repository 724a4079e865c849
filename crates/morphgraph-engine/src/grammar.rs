// The grammar arena and its builder.
//
// A `Grammar` owns every node, constraint, rule set and stem store of a
// loaded morphology. It is assembled with `GrammarBuilder`, linked once by
// `GrammarBuilder::finish`, and read-only during traversal.

use std::sync::Arc;

use hashbrown::HashMap;
use morphgraph_core::{Form, MorphemeLabel, NodeId};

use crate::GrammarError;
use crate::allomorph::Allomorph;
use crate::constraint::Constraint;
use crate::index::{ConstraintIndex, NodeIndex, RuleIndex, StemListIndex};
use crate::link;
use crate::node::{Node, NodeKind};
use crate::rules::CreateAllomorphs;
use crate::stem::StemStore;

#[derive(Debug, Default)]
pub struct Grammar {
    pub(crate) nodes: Vec<Node>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) constraint_names: HashMap<String, ConstraintIndex>,
    pub(crate) rules: Vec<CreateAllomorphs>,
    pub(crate) rule_names: HashMap<String, RuleIndex>,
    pub(crate) stem_lists: Vec<Box<dyn StemStore>>,
    pub(crate) by_id: HashMap<NodeId, NodeIndex>,
    pub(crate) by_label: HashMap<MorphemeLabel, Vec<NodeIndex>>,
    pub(crate) models: Vec<NodeIndex>,
}

impl Grammar {
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex::from_usize(i), n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn nodes_by_label(&self, label: &str) -> &[NodeIndex] {
        self.by_label.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn constraint(&self, index: ConstraintIndex) -> &Constraint {
        &self.constraints[index.index()]
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintIndex> {
        self.constraint_names.get(name).copied()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn rule(&self, index: RuleIndex) -> &CreateAllomorphs {
        &self.rules[index.index()]
    }

    pub fn rule_by_name(&self, name: &str) -> Option<RuleIndex> {
        self.rule_names.get(name).copied()
    }

    pub fn stem_list(&self, index: StemListIndex) -> &dyn StemStore {
        self.stem_lists[index.index()].as_ref()
    }

    pub fn stem_list_mut(&mut self, index: StemListIndex) -> &mut dyn StemStore {
        self.stem_lists[index.index()].as_mut()
    }

    pub fn stem_lists(&self) -> impl Iterator<Item = (StemListIndex, &dyn StemStore)> {
        self.stem_lists
            .iter()
            .enumerate()
            .map(|(i, s)| (StemListIndex::from_usize(i), s.as_ref()))
    }

    pub fn stem_list_by_name(&self, name: &str) -> Option<StemListIndex> {
        self.stem_lists
            .iter()
            .position(|s| s.name() == name)
            .map(StemListIndex::from_usize)
    }

    /// Root nodes in declaration order.
    pub fn models(&self) -> &[NodeIndex] {
        &self.models
    }

    pub fn model_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.models
            .iter()
            .copied()
            .find(|&m| self.node(m).id().as_str() == name)
    }

    /// Whether a model contains any zero-length allomorph.
    pub fn model_has_zero_length_forms(&self, model: NodeIndex) -> bool {
        matches!(
            self.node(model).kind(),
            NodeKind::Model {
                has_zero_length_forms: true,
                ..
            }
        )
    }

    /// Re-derive the per-model zero-length flags after stems change.
    pub fn refresh_zero_length_forms(&mut self) {
        link::mark_zero_length_forms(self);
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeIndex {
        let index = NodeIndex::from_usize(self.nodes.len());
        self.nodes.push(node);
        index
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.index()]
    }

    pub(crate) fn register(&mut self, index: NodeIndex) -> Result<(), GrammarError> {
        let node = &self.nodes[index.index()];
        let (id, label) = (node.id().clone(), node.label().clone());
        if self.by_id.insert(id.clone(), index).is_some() {
            return Err(GrammarError::DuplicateNodeId(id));
        }
        self.by_label.entry(label).or_default().push(index);
        Ok(())
    }

    /// Point `index` at `next`, carrying the link through to the tails of
    /// whatever the node contains.
    pub(crate) fn set_next(&mut self, index: NodeIndex, next: Option<NodeIndex>) {
        self.node_mut(index).set_next_field(next);
        let tails: Vec<NodeIndex> = match self.node(index).kind() {
            NodeKind::Path { children, .. } => children.last().copied().into_iter().collect(),
            NodeKind::Fork { paths } => paths.clone(),
            NodeKind::MutuallyExclusive { morphemes } => morphemes.clone(),
            NodeKind::Copy {
                clone: Some(clone), ..
            } => vec![*clone],
            _ => Vec::new(),
        };
        for tail in tails {
            self.set_next(tail, next);
        }
    }

    /// Chain `children` one after another; the last one leads to `tail`.
    pub(crate) fn chain(&mut self, children: &[NodeIndex], tail: Option<NodeIndex>) {
        for pair in children.windows(2) {
            self.set_next(pair[0], Some(pair[1]));
        }
        if let Some(&last) = children.last() {
            self.set_next(last, tail);
        }
    }
}

/// Incremental construction of a [`Grammar`].
///
/// Node constructors return handles immediately; forward references (jump
/// targets, copy sources, constraint pointers, portmanteau chains) stay
/// unresolved until [`finish`](Self::finish) links the arena.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constraint. Named constraints must be unique.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintIndex, GrammarError> {
        if let Some(name) = constraint.name() {
            if self.grammar.constraint_names.contains_key(name) {
                return Err(GrammarError::DuplicateConstraint(name.to_string()));
            }
        }
        Ok(self.constraint(constraint))
    }

    /// Register a constraint without checking its name.
    pub fn constraint(&mut self, constraint: Constraint) -> ConstraintIndex {
        let index = ConstraintIndex::from_usize(self.grammar.constraints.len());
        if let Some(name) = constraint.name() {
            self.grammar.constraint_names.insert(name.to_string(), index);
        }
        self.grammar.constraints.push(constraint);
        index
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintIndex> {
        self.grammar.constraint_by_name(name)
    }

    pub fn add_rule_set(&mut self, rule: CreateAllomorphs) -> Result<RuleIndex, GrammarError> {
        if self.grammar.rule_names.contains_key(rule.name()) {
            return Err(GrammarError::UnknownAllomorphRule(format!(
                "{} (declared twice)",
                rule.name()
            )));
        }
        let index = RuleIndex::from_usize(self.grammar.rules.len());
        self.grammar.rule_names.insert(rule.name().to_string(), index);
        self.grammar.rules.push(rule);
        Ok(index)
    }

    pub fn rule_by_name(&self, name: &str) -> Option<RuleIndex> {
        self.grammar.rule_by_name(name)
    }

    pub fn add_stem_list(&mut self, list: Box<dyn StemStore>) -> StemListIndex {
        let index = StemListIndex::from_usize(self.grammar.stem_lists.len());
        self.grammar.stem_lists.push(list);
        index
    }

    pub fn stem_list_by_name(&self, name: &str) -> Option<StemListIndex> {
        self.grammar.stem_list_by_name(name)
    }

    fn add(&mut self, id: &str, label: &str, kind: NodeKind) -> NodeIndex {
        let children = kind.children();
        let chained = matches!(kind, NodeKind::Path { .. } | NodeKind::Model { .. });
        let index = self
            .grammar
            .push_node(Node::new(NodeId::new(id), MorphemeLabel::new(label), kind));
        if chained {
            self.grammar.chain(&children, None);
        } else {
            for child in children {
                self.grammar.set_next(child, None);
            }
        }
        index
    }

    pub fn morpheme(&mut self, id: &str, label: &str, allomorphs: Vec<Allomorph>) -> NodeIndex {
        let allomorphs = allomorphs.into_iter().map(Arc::new).collect();
        self.add(
            id,
            label,
            NodeKind::Morpheme {
                allomorphs,
                rules: Vec::new(),
            },
        )
    }

    pub fn stem_list(&mut self, id: &str, label: &str, list: StemListIndex) -> NodeIndex {
        self.add(id, label, NodeKind::StemList { list })
    }

    pub fn fork(&mut self, id: &str, paths: Vec<NodeIndex>) -> NodeIndex {
        self.add(id, id, NodeKind::Fork { paths })
    }

    pub fn path(&mut self, id: &str, children: Vec<NodeIndex>) -> NodeIndex {
        self.add(
            id,
            id,
            NodeKind::Path {
                children,
                sequence: false,
            },
        )
    }

    pub fn sequence(&mut self, id: &str, children: Vec<NodeIndex>) -> NodeIndex {
        self.add(
            id,
            id,
            NodeKind::Path {
                children,
                sequence: true,
            },
        )
    }

    pub fn jump(&mut self, id: &str, target: &str, target_required: bool) -> NodeIndex {
        self.add(
            id,
            id,
            NodeKind::Jump {
                target_id: NodeId::new(target),
                target: None,
                target_required,
            },
        )
    }

    pub fn mutually_exclusive(&mut self, id: &str, label: &str, morphemes: Vec<NodeIndex>) -> NodeIndex {
        self.add(id, label, NodeKind::MutuallyExclusive { morphemes })
    }

    /// A clone of the node with id `source`; clone ids get `suffix` appended.
    pub fn copy(&mut self, id: &str, source: &str, suffix: &str) -> NodeIndex {
        self.add(
            id,
            id,
            NodeKind::Copy {
                source_id: NodeId::new(source),
                suffix: suffix.to_string(),
                clone: None,
            },
        )
    }

    pub fn model(&mut self, id: &str, children: Vec<NodeIndex>) -> NodeIndex {
        let index = self.add(
            id,
            id,
            NodeKind::Model {
                children,
                has_zero_length_forms: false,
            },
        );
        self.grammar.models.push(index);
        index
    }

    pub fn set_optional(&mut self, node: NodeIndex, optional: bool) -> &mut Self {
        self.grammar.node_mut(node).set_optional(optional);
        self
    }

    pub fn set_rules(&mut self, node: NodeIndex, rule_sets: Vec<RuleIndex>) -> &mut Self {
        if let NodeKind::Morpheme { rules, .. } = self.grammar.node_mut(node).kind_mut() {
            *rules = rule_sets;
        }
        self
    }

    pub fn set_gloss(&mut self, node: NodeIndex, gloss: Form) -> &mut Self {
        self.grammar.node_mut(node).set_gloss(gloss);
        self
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        self.grammar.node(index)
    }

    /// Index every node and run the link passes.
    pub fn finish(self) -> Result<Grammar, GrammarError> {
        let mut grammar = self.grammar;
        for i in 0..grammar.nodes.len() {
            grammar.register(NodeIndex::from_usize(i))?;
        }
        link::link(&mut grammar)?;
        tracing::debug!(
            nodes = grammar.nodes.len(),
            constraints = grammar.constraints.len(),
            models = grammar.models.len(),
            "grammar linked"
        );
        Ok(grammar)
    }
}
