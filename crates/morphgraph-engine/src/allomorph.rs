// Allomorphs: concrete surface realizations of a morpheme.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use morphgraph_core::{Form, MorphemeSequence, Tag, WritingSystem};

use crate::index::{ConstraintIndex, NodeIndex};

/// Where an allomorph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllomorphKind {
    /// Lexical data as authored.
    Original,
    /// Produced by an allomorph-generation rule set.
    Derived,
    /// Guessed from the input while suggesting stems.
    Hypothetical,
    /// The "nothing appended" sentinel used when finalizing a parse.
    Null,
}

/// A single allomorph that realizes a contiguous run of two or more
/// morpheme nodes at once, starting with the node that owns it.
///
/// The node chain is resolved lazily by the linker; until then only the
/// label sequence is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portmanteau {
    sequence: MorphemeSequence,
    nodes: Vec<NodeIndex>,
}

impl Portmanteau {
    pub fn new(sequence: MorphemeSequence) -> Self {
        Self {
            sequence,
            nodes: Vec::new(),
        }
    }

    /// The morpheme labels this allomorph realizes, owner first.
    pub fn sequence(&self) -> &MorphemeSequence {
        &self.sequence
    }

    /// The nodes this allomorph realizes, owner first. Empty until linked.
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn is_initialized(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn last_node(&self) -> Option<NodeIndex> {
        self.nodes.last().copied()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub(crate) fn set_nodes(&mut self, nodes: Vec<NodeIndex>) {
        self.nodes = nodes;
    }
}

/// One concrete realization of a morpheme.
///
/// Carries a form per writing system, gating constraints, and tags that other
/// constraints test for. Equality and hashing cover forms, tags, constraints
/// and kind; the storage id, the portmanteau and the generation flag are
/// ignored.
#[derive(Clone)]
pub struct Allomorph {
    forms: BTreeMap<WritingSystem, Form>,
    constraints: BTreeSet<ConstraintIndex>,
    tags: BTreeSet<Tag>,
    kind: AllomorphKind,
    portmanteau: Option<Portmanteau>,
    id: Option<i64>,
    use_in_generations: bool,
}

impl Allomorph {
    pub fn new(kind: AllomorphKind) -> Self {
        Self {
            forms: BTreeMap::new(),
            constraints: BTreeSet::new(),
            tags: BTreeSet::new(),
            kind,
            portmanteau: None,
            id: None,
            use_in_generations: true,
        }
    }

    /// An `Original` allomorph with a single form.
    pub fn from_form(form: Form) -> Self {
        Self::new(AllomorphKind::Original).with_form(form)
    }

    /// The sentinel allomorph: no forms, no tags, no constraints.
    pub fn null() -> Self {
        Self::new(AllomorphKind::Null)
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.set_form(form);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintIndex) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn with_portmanteau(mut self, portmanteau: Portmanteau) -> Self {
        self.portmanteau = Some(portmanteau);
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_use_in_generations(mut self, use_in_generations: bool) -> Self {
        self.use_in_generations = use_in_generations;
        self
    }

    pub fn set_form(&mut self, form: Form) {
        self.forms.insert(form.writing_system().clone(), form);
    }

    pub fn remove_form(&mut self, ws: &WritingSystem) -> Option<Form> {
        self.forms.remove(ws)
    }

    pub fn form(&self, ws: &WritingSystem) -> Option<&Form> {
        self.forms.get(ws)
    }

    /// The text of this allomorph in `ws`, if it has a form there.
    pub fn text(&self, ws: &WritingSystem) -> Option<&str> {
        self.forms.get(ws).map(Form::text)
    }

    pub fn has_form(&self, ws: &WritingSystem) -> bool {
        self.forms.contains_key(ws)
    }

    pub fn forms(&self) -> impl Iterator<Item = &Form> {
        self.forms.values()
    }

    /// Whether any of the forms is the empty string.
    pub fn has_zero_length_form(&self) -> bool {
        self.kind != AllomorphKind::Null && self.forms.values().any(Form::is_empty)
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut BTreeSet<Tag> {
        &mut self.tags
    }

    /// Whether every tag in `tags` is carried by this allomorph.
    pub fn has_tags(&self, tags: &BTreeSet<Tag>) -> bool {
        tags.is_subset(&self.tags)
    }

    /// Whether any tag in `tags` is carried by this allomorph.
    pub fn has_any_tag(&self, tags: &BTreeSet<Tag>) -> bool {
        !tags.is_disjoint(&self.tags)
    }

    pub fn constraints(&self) -> &BTreeSet<ConstraintIndex> {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut BTreeSet<ConstraintIndex> {
        &mut self.constraints
    }

    pub fn kind(&self) -> AllomorphKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: AllomorphKind) {
        self.kind = kind;
    }

    pub fn is_null(&self) -> bool {
        self.kind == AllomorphKind::Null
    }

    pub fn portmanteau(&self) -> Option<&Portmanteau> {
        self.portmanteau.as_ref()
    }

    pub(crate) fn portmanteau_mut(&mut self) -> Option<&mut Portmanteau> {
        self.portmanteau.as_mut()
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn use_in_generations(&self) -> bool {
        self.use_in_generations
    }

    pub fn set_use_in_generations(&mut self, value: bool) {
        self.use_in_generations = value;
    }

    /// One-line description for diagnostics, e.g. `"-ing"/en {progressive}`.
    pub fn summary(&self) -> String {
        if self.is_null() {
            return "(null)".to_string();
        }
        let forms: Vec<String> = self
            .forms
            .values()
            .map(|f| format!("{:?}/{}", f.text(), f.writing_system()))
            .collect();
        let mut out = forms.join(" ");
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(Tag::as_str).collect();
            out.push_str(&format!(" {{{}}}", tags.join(", ")));
        }
        if let Some(p) = &self.portmanteau {
            out.push_str(&format!(" portmanteau {}", p.sequence()));
        }
        out
    }
}

impl PartialEq for Allomorph {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.forms == other.forms
            && self.tags == other.tags
            && self.constraints == other.constraints
    }
}

impl Eq for Allomorph {}

impl Hash for Allomorph {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.forms.hash(state);
        self.tags.hash(state);
        self.constraints.hash(state);
    }
}

impl fmt::Debug for Allomorph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allomorph({:?}: {})", self.kind, self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> WritingSystem {
        WritingSystem::new("en")
    }

    #[test]
    fn equality_ignores_id_and_portmanteau() {
        let a = Allomorph::from_form(Form::new(en(), "went")).with_id(1);
        let b = Allomorph::from_form(Form::new(en(), "went"))
            .with_id(2)
            .with_portmanteau(Portmanteau::new("[go][PAST]".parse().unwrap()));
        assert_eq!(a, b);
    }

    #[test]
    fn equality_covers_tags_and_kind() {
        let a = Allomorph::from_form(Form::new(en(), "s"));
        let b = a.clone().with_tag(Tag::new("plural"));
        assert_ne!(a, b);

        let mut c = a.clone();
        c.set_kind(AllomorphKind::Derived);
        assert_ne!(a, c);
    }

    #[test]
    fn tag_subset_checks() {
        let a = Allomorph::from_form(Form::new(en(), "s"))
            .with_tags([Tag::new("plural"), Tag::new("noun")]);
        let want: BTreeSet<Tag> = [Tag::new("plural")].into_iter().collect();
        let other: BTreeSet<Tag> = [Tag::new("verb")].into_iter().collect();
        assert!(a.has_tags(&want));
        assert!(!a.has_tags(&other));
        assert!(a.has_tags(&BTreeSet::new()));
        assert!(a.has_any_tag(&want));
        assert!(!a.has_any_tag(&other));
    }

    #[test]
    fn forms_per_writing_system() {
        let ipa = WritingSystem::new("ipa");
        let a = Allomorph::from_form(Form::new(en(), "cat")).with_form(Form::new(ipa.clone(), "kæt"));
        assert_eq!(a.text(&en()), Some("cat"));
        assert_eq!(a.text(&ipa), Some("kæt"));
        assert!(!a.has_form(&WritingSystem::new("ar")));
    }

    #[test]
    fn zero_length_detection() {
        assert!(Allomorph::from_form(Form::empty(en())).has_zero_length_form());
        assert!(!Allomorph::from_form(Form::new(en(), "x")).has_zero_length_form());
        assert!(!Allomorph::null().has_zero_length_form());
    }

    #[test]
    fn portmanteau_starts_uninitialized() {
        let p = Portmanteau::new("[a][b]".parse().unwrap());
        assert!(!p.is_initialized());
        assert_eq!(p.len(), 2);
        assert_eq!(p.last_node(), None);
    }
}
