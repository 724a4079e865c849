// Constraint algebra.
//
// Constraints live in the grammar arena and are referenced by index from
// allomorphs and pending parse state. Their evaluation timing follows from
// their resolved type:
//
//   Match         checked before an allomorph is appended
//   Local         attached on append, checked against the next allomorph
//                 (or the Null allomorph when the parse finishes)
//   LongDistance  attached on append, checked once against the whole parse

use std::collections::BTreeSet;
use std::fmt;

use morphgraph_core::{MorphemeLabel, NodeId, Tag, WritingSystem};
use regex::Regex;

use crate::allomorph::Allomorph;
use crate::config::Mode;
use crate::generation::MorphemeSequenceConstraint;
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex};
use crate::parsing::Parsing;
use crate::steps::ParsingStep;

/// When a constraint is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    Match,
    Local,
    LongDistance,
}

/// Structural category of a constraint, independent of its evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintCategory {
    Match,
    Local,
    LongDistance,
    Nested,
    Pointer,
}

/// Which steps a tag match inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagScope {
    /// The candidate allomorph itself.
    Current,
    ImmediatelyPreceding,
    AnyPreceding,
    ImmediatelyFollowing,
    AnyFollowing,
}

/// Which text a phonological pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhonologyScope {
    /// Everything parsed so far.
    Preceding,
    /// The candidate allomorph's form.
    Current,
    /// What follows the attaching allomorph.
    Following,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeScope {
    Immediate,
    Any,
}

/// Identifies a node by instance id or by morpheme label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTarget {
    Id(NodeId),
    Label(MorphemeLabel),
}

impl NodeTarget {
    fn matches(&self, grammar: &Grammar, node: NodeIndex) -> bool {
        let node = grammar.node(node);
        match self {
            NodeTarget::Id(id) => node.id() == id,
            NodeTarget::Label(label) => node.label() == label,
        }
    }

    fn matches_step(&self, grammar: &Grammar, step: &ParsingStep) -> bool {
        match self {
            NodeTarget::Id(_) => self.matches(grammar, step.node),
            NodeTarget::Label(label) => &step.label == label,
        }
    }
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTarget::Id(id) => write!(f, "id {id}"),
            NodeTarget::Label(label) => write!(f, "label {label}"),
        }
    }
}

/// The predicate a constraint evaluates.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// Always true. Used as a rule-case placeholder.
    Satisfied,
    TagMatch {
        tags: BTreeSet<Tag>,
        scope: TagScope,
        /// For the `Any*` scopes: meeting one of these tags before a match
        /// fails the constraint.
        interrupted_by: BTreeSet<Tag>,
    },
    Phonological {
        pattern: Regex,
        scope: PhonologyScope,
    },
    PrecedingNode {
        target: NodeTarget,
        scope: NodeScope,
    },
    FollowingNode {
        target: NodeTarget,
        scope: NodeScope,
    },
    /// The finished parse has more than one step.
    BoundMorpheme,
    /// Nothing but the end of the word may follow.
    WordFinal,
    And(Vec<ConstraintIndex>),
    Or(Vec<ConstraintIndex>),
    Not(ConstraintIndex),
    /// Named forward reference, resolved by the linker.
    Pointer {
        target_name: String,
        target: Option<ConstraintIndex>,
    },
}

impl ConstraintKind {
    pub fn category(&self) -> ConstraintCategory {
        match self {
            ConstraintKind::And(_) | ConstraintKind::Or(_) | ConstraintKind::Not(_) => {
                ConstraintCategory::Nested
            }
            ConstraintKind::Pointer { .. } => ConstraintCategory::Pointer,
            _ => match self.leaf_type() {
                Some(ConstraintType::Local) => ConstraintCategory::Local,
                Some(ConstraintType::LongDistance) => ConstraintCategory::LongDistance,
                _ => ConstraintCategory::Match,
            },
        }
    }

    /// Evaluation time of a leaf predicate; `None` for nested and pointer
    /// constraints, whose type comes from their children.
    pub fn leaf_type(&self) -> Option<ConstraintType> {
        let ty = match self {
            ConstraintKind::Satisfied => ConstraintType::Match,
            ConstraintKind::TagMatch { scope, .. } => match scope {
                TagScope::ImmediatelyFollowing => ConstraintType::Local,
                TagScope::AnyFollowing => ConstraintType::LongDistance,
                _ => ConstraintType::Match,
            },
            ConstraintKind::Phonological { scope, .. } => match scope {
                PhonologyScope::Following => ConstraintType::Local,
                _ => ConstraintType::Match,
            },
            ConstraintKind::PrecedingNode { .. } => ConstraintType::Match,
            ConstraintKind::FollowingNode { scope, .. } => match scope {
                NodeScope::Immediate => ConstraintType::Local,
                NodeScope::Any => ConstraintType::LongDistance,
            },
            ConstraintKind::BoundMorpheme => ConstraintType::LongDistance,
            ConstraintKind::WordFinal => ConstraintType::Local,
            ConstraintKind::And(_)
            | ConstraintKind::Or(_)
            | ConstraintKind::Not(_)
            | ConstraintKind::Pointer { .. } => return None,
        };
        Some(ty)
    }

    /// Child constraints of nested and resolved pointer constraints.
    pub fn children(&self) -> Vec<ConstraintIndex> {
        match self {
            ConstraintKind::And(c) | ConstraintKind::Or(c) => c.clone(),
            ConstraintKind::Not(c) => vec![*c],
            ConstraintKind::Pointer {
                target: Some(t), ..
            } => vec![*t],
            _ => Vec::new(),
        }
    }
}

/// Makes a constraint inert for a writing system, a mode, or both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IgnoreFlag {
    pub writing_system: Option<WritingSystem>,
    pub mode: Option<Mode>,
}

impl IgnoreFlag {
    pub fn applies(&self, ws: &WritingSystem, mode: Mode) -> bool {
        self.writing_system.as_ref().is_none_or(|w| w == ws)
            && self.mode.is_none_or(|m| m == mode)
    }
}

/// A constraint stored in the grammar arena.
#[derive(Debug, Clone)]
pub struct Constraint {
    name: Option<String>,
    kind: ConstraintKind,
    ignore: Vec<IgnoreFlag>,
    resolved_type: Option<ConstraintType>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind) -> Self {
        let resolved_type = kind.leaf_type();
        Self {
            name: None,
            kind,
            ignore: Vec::new(),
            resolved_type,
        }
    }

    pub fn named(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(kind)
        }
    }

    pub fn with_ignore(mut self, flag: IgnoreFlag) -> Self {
        self.ignore.push(flag);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ConstraintKind {
        &mut self.kind
    }

    pub fn category(&self) -> ConstraintCategory {
        self.kind.category()
    }

    pub fn ignore_flags(&self) -> &[IgnoreFlag] {
        &self.ignore
    }

    /// Evaluation time. Nested constraints are only typed once validated;
    /// unvalidated or childless ones behave as match conditions.
    pub fn constraint_type(&self) -> ConstraintType {
        self.resolved_type.unwrap_or(ConstraintType::Match)
    }

    pub(crate) fn resolved_type(&self) -> Option<ConstraintType> {
        self.resolved_type
    }

    pub(crate) fn set_resolved_type(&mut self, ty: ConstraintType) {
        self.resolved_type = Some(ty);
    }

    pub fn is_ignored(&self, ws: &WritingSystem, mode: Mode) -> bool {
        self.ignore.iter().any(|f| f.applies(ws, mode))
    }

    /// Evaluate against a parse in progress.
    pub fn matches(&self, ev: &Evaluation<'_>) -> bool {
        if self.is_ignored(ev.parsing.writing_system(), ev.parsing.mode()) {
            return true;
        }
        let grammar = ev.grammar;
        match &self.kind {
            ConstraintKind::Satisfied => true,
            ConstraintKind::TagMatch {
                tags,
                scope,
                interrupted_by,
            } => tag_match(ev, tags, *scope, interrupted_by),
            ConstraintKind::Phonological { pattern, scope } => {
                let ws = ev.parsing.writing_system();
                match scope {
                    PhonologyScope::Preceding => pattern.is_match(&ev.parsing.preceding_text()),
                    PhonologyScope::Current => pattern.is_match(ev.allomorph.text(ws).unwrap_or("")),
                    PhonologyScope::Following => match ev.parsing.mode() {
                        Mode::Parsing => pattern.is_match(ev.parsing.remainder()),
                        Mode::Generation => {
                            pattern.is_match(ev.allomorph.text(ws).unwrap_or(""))
                        }
                    },
                }
            }
            ConstraintKind::PrecedingNode { target, scope } => {
                let steps = ev.parsing.steps();
                match scope {
                    NodeScope::Immediate => steps
                        .last()
                        .is_some_and(|s| target.matches_step(grammar, s)),
                    NodeScope::Any => steps.iter_rev().any(|s| target.matches_step(grammar, s)),
                }
            }
            ConstraintKind::FollowingNode { target, scope } => match scope {
                NodeScope::Immediate => ev.node.is_some_and(|n| target.matches(grammar, n)),
                NodeScope::Any => ev
                    .following_steps()
                    .any(|s| target.matches_step(grammar, s)),
            },
            // Portmanteau continuations consume nothing and do not count.
            ConstraintKind::BoundMorpheme => ev
                .parsing
                .steps()
                .iter_rev()
                .filter(|s| !s.continuation)
                .nth(1)
                .is_some(),
            ConstraintKind::WordFinal => match ev.parsing.mode() {
                Mode::Parsing => ev.allomorph.is_null(),
                Mode::Generation => ev.morphemes.is_none_or(|m| m.is_empty()),
            },
            ConstraintKind::And(children) => children
                .iter()
                .all(|&c| grammar.constraint(c).matches(ev)),
            ConstraintKind::Or(children) => children
                .iter()
                .any(|&c| grammar.constraint(c).matches(ev)),
            ConstraintKind::Not(child) => !grammar.constraint(*child).matches(ev),
            ConstraintKind::Pointer { target, .. } => {
                target.is_some_and(|t| grammar.constraint(t).matches(ev))
            }
        }
    }

    /// Human-readable description, recursing into children.
    pub fn summary(&self, grammar: &Grammar) -> String {
        let body = match &self.kind {
            ConstraintKind::Satisfied => "satisfied".to_string(),
            ConstraintKind::TagMatch {
                tags,
                scope,
                interrupted_by,
            } => {
                let mut s = format!("tags {} {:?}", join_tags(tags), scope);
                if !interrupted_by.is_empty() {
                    s.push_str(&format!(" unless {}", join_tags(interrupted_by)));
                }
                s
            }
            ConstraintKind::Phonological { pattern, scope } => {
                format!("{scope:?} text ~ /{}/", pattern.as_str())
            }
            ConstraintKind::PrecedingNode { target, scope } => {
                format!("{scope:?} preceding {target}")
            }
            ConstraintKind::FollowingNode { target, scope } => {
                format!("{scope:?} following {target}")
            }
            ConstraintKind::BoundMorpheme => "bound morpheme".to_string(),
            ConstraintKind::WordFinal => "word final".to_string(),
            ConstraintKind::And(c) => join_children("and", c, grammar),
            ConstraintKind::Or(c) => join_children("or", c, grammar),
            ConstraintKind::Not(c) => format!("not({})", grammar.constraint(*c).summary(grammar)),
            ConstraintKind::Pointer { target_name, .. } => format!("-> {target_name}"),
        };
        match &self.name {
            Some(name) => format!("{name}: {body}"),
            None => body,
        }
    }
}

fn join_tags(tags: &BTreeSet<Tag>) -> String {
    let tags: Vec<&str> = tags.iter().map(Tag::as_str).collect();
    format!("{{{}}}", tags.join(", "))
}

fn join_children(op: &str, children: &[ConstraintIndex], grammar: &Grammar) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|&c| grammar.constraint(c).summary(grammar))
        .collect();
    format!("{op}({})", parts.join(", "))
}

fn tag_match(
    ev: &Evaluation<'_>,
    tags: &BTreeSet<Tag>,
    scope: TagScope,
    interrupted_by: &BTreeSet<Tag>,
) -> bool {
    let hit = |a: &Allomorph| a.has_tags(tags);
    let interrupts = |a: &Allomorph| a.has_any_tag(interrupted_by);
    // Both scans take steps newest first. Looking back, the nearest decisive
    // step wins; looking forward, the oldest one does, so the last decisive
    // step seen is kept.
    let backward = |steps: &mut dyn Iterator<Item = &ParsingStep>| {
        for step in steps {
            if hit(&step.allomorph) {
                return true;
            }
            if interrupts(&step.allomorph) {
                return false;
            }
        }
        false
    };
    let forward = |steps: &mut dyn Iterator<Item = &ParsingStep>| {
        let mut decided = false;
        for step in steps {
            if hit(&step.allomorph) {
                decided = true;
            } else if interrupts(&step.allomorph) {
                decided = false;
            }
        }
        decided
    };
    match scope {
        TagScope::Current | TagScope::ImmediatelyFollowing => hit(ev.allomorph),
        TagScope::ImmediatelyPreceding => ev.parsing.steps().last().is_some_and(|s| hit(&s.allomorph)),
        TagScope::AnyPreceding => backward(&mut ev.parsing.steps().iter_rev()),
        TagScope::AnyFollowing => forward(&mut ev.following_steps()),
    }
}

/// Everything a constraint may look at.
pub struct Evaluation<'a> {
    pub grammar: &'a Grammar,
    pub parsing: &'a Parsing,
    /// Remaining target labels, when generating.
    pub morphemes: Option<&'a MorphemeSequenceConstraint>,
    /// The node about to be appended; `None` when finishing.
    pub node: Option<NodeIndex>,
    /// The allomorph about to be appended, or the Null allomorph.
    pub allomorph: &'a Allomorph,
    /// Index of the step that attached a pending constraint.
    pub origin: Option<usize>,
}

impl<'a> Evaluation<'a> {
    /// Steps appended after the attaching step, newest first.
    fn following_steps(&self) -> impl Iterator<Item = &'a ParsingStep> + 'a {
        let start = self.origin.map_or(0, |o| o + 1);
        self.parsing.steps().since(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;
    use morphgraph_core::Form;
    use std::sync::Arc;

    fn en() -> WritingSystem {
        WritingSystem::new("en")
    }

    fn tags(names: &[&str]) -> BTreeSet<Tag> {
        names.iter().map(|t| Tag::new(*t)).collect()
    }

    fn tagged(text: &str, tag: &[&str]) -> Arc<Allomorph> {
        Arc::new(Allomorph::from_form(Form::new(en(), text)).with_tags(tags(tag).into_iter()))
    }

    struct Fixture {
        grammar: Grammar,
        node: NodeIndex,
    }

    fn fixture() -> Fixture {
        let mut b = GrammarBuilder::new();
        let node = b.morpheme("m", "M", vec![]);
        b.model("word", vec![node]);
        Fixture {
            grammar: b.finish().unwrap(),
            node,
        }
    }

    fn parsing_with(f: &Fixture, steps: &[Arc<Allomorph>], input: &str) -> Parsing {
        let mut p = Parsing::new(Form::new(en(), input));
        for a in steps {
            p.push_step(&f.grammar, f.node, Arc::clone(a), None);
        }
        p
    }

    fn eval<'a>(
        f: &'a Fixture,
        p: &'a Parsing,
        allomorph: &'a Allomorph,
        origin: Option<usize>,
    ) -> Evaluation<'a> {
        Evaluation {
            grammar: &f.grammar,
            parsing: p,
            morphemes: None,
            node: Some(f.node),
            allomorph,
            origin,
        }
    }

    fn any_preceding(want: &[&str], stop: &[&str]) -> Constraint {
        Constraint::new(ConstraintKind::TagMatch {
            tags: tags(want),
            scope: TagScope::AnyPreceding,
            interrupted_by: tags(stop),
        })
    }

    #[test]
    fn types_follow_scope() {
        let following = ConstraintKind::TagMatch {
            tags: tags(&["x"]),
            scope: TagScope::ImmediatelyFollowing,
            interrupted_by: BTreeSet::new(),
        };
        assert_eq!(following.leaf_type(), Some(ConstraintType::Local));
        assert_eq!(following.category(), ConstraintCategory::Local);
        assert_eq!(ConstraintKind::BoundMorpheme.leaf_type(), Some(ConstraintType::LongDistance));
        assert_eq!(ConstraintKind::WordFinal.leaf_type(), Some(ConstraintType::Local));
        assert_eq!(ConstraintKind::And(vec![]).leaf_type(), None);
        assert_eq!(ConstraintKind::Not(ConstraintIndex(0)).category(), ConstraintCategory::Nested);
    }

    #[test]
    fn any_preceding_stops_at_interrupter() {
        let f = fixture();
        let c = any_preceding(&["plural"], &["case"]);
        let candidate = Allomorph::from_form(Form::new(en(), "x"));

        let clean = parsing_with(&f, &[tagged("s", &["plural"]), tagged("a", &[])], "sax");
        assert!(c.matches(&eval(&f, &clean, &candidate, None)));

        let interrupted = parsing_with(&f, &[tagged("s", &["plural"]), tagged("n", &["case"])], "snx");
        assert!(!c.matches(&eval(&f, &interrupted, &candidate, None)));

        let empty = parsing_with(&f, &[], "x");
        assert!(!c.matches(&eval(&f, &empty, &candidate, None)));
    }

    #[test]
    fn any_following_scans_after_origin() {
        let f = fixture();
        let c = Constraint::new(ConstraintKind::TagMatch {
            tags: tags(&["plural"]),
            scope: TagScope::AnyFollowing,
            interrupted_by: BTreeSet::new(),
        });
        let p = parsing_with(&f, &[tagged("s", &["plural"]), tagged("a", &[])], "sa");
        let null = Allomorph::null();
        assert!(c.matches(&eval(&f, &p, &null, None)));
        assert!(!c.matches(&eval(&f, &p, &null, Some(0))));
    }

    #[test]
    fn any_following_takes_the_earliest_decisive_step() {
        let f = fixture();
        let c = Constraint::new(ConstraintKind::TagMatch {
            tags: tags(&["plural"]),
            scope: TagScope::AnyFollowing,
            interrupted_by: tags(&["case"]),
        });
        let null = Allomorph::null();
        let blocked = parsing_with(
            &f,
            &[tagged("k", &[]), tagged("n", &["case"]), tagged("s", &["plural"])],
            "kns",
        );
        assert!(!c.matches(&eval(&f, &blocked, &null, Some(0))));
        let clean = parsing_with(
            &f,
            &[tagged("k", &[]), tagged("s", &["plural"]), tagged("n", &["case"])],
            "ksn",
        );
        assert!(c.matches(&eval(&f, &clean, &null, Some(0))));
    }

    #[test]
    fn bound_morpheme_ignores_portmanteau_continuations() {
        let f = fixture();
        let c = Constraint::new(ConstraintKind::BoundMorpheme);
        let went = tagged("went", &[]);
        let mut fused = parsing_with(&f, &[Arc::clone(&went)], "went");
        fused.append_continuation(&f.grammar, f.node, went);
        assert_eq!(fused.steps().len(), 2);
        assert!(!c.matches(&eval(&f, &fused, &Allomorph::null(), None)));

        let two = parsing_with(&f, &[tagged("go", &[]), tagged("ed", &[])], "goed");
        assert!(c.matches(&eval(&f, &two, &Allomorph::null(), None)));
    }

    #[test]
    fn phonological_scopes() {
        let f = fixture();
        let p = parsing_with(&f, &[tagged("kat", &[])], "katit");
        let preceding = Constraint::new(ConstraintKind::Phonological {
            pattern: Regex::new("t$").unwrap(),
            scope: PhonologyScope::Preceding,
        });
        let following = Constraint::new(ConstraintKind::Phonological {
            pattern: Regex::new("^i").unwrap(),
            scope: PhonologyScope::Following,
        });
        let candidate = Allomorph::from_form(Form::new(en(), "it"));
        assert!(preceding.matches(&eval(&f, &p, &candidate, None)));
        assert!(following.matches(&eval(&f, &p, &candidate, None)));
    }

    #[test]
    fn word_final_in_parsing_needs_null() {
        let f = fixture();
        let p = parsing_with(&f, &[tagged("a", &[])], "ab");
        let c = Constraint::new(ConstraintKind::WordFinal);
        assert!(c.matches(&eval(&f, &p, &Allomorph::null(), None)));
        let next = Allomorph::from_form(Form::new(en(), "b"));
        assert!(!c.matches(&eval(&f, &p, &next, None)));
    }

    #[test]
    fn ignore_flags_make_constraint_inert() {
        let f = fixture();
        let p = parsing_with(&f, &[], "a");
        let never = Constraint::new(ConstraintKind::BoundMorpheme).with_ignore(IgnoreFlag {
            writing_system: Some(en()),
            mode: Some(Mode::Parsing),
        });
        assert!(never.matches(&eval(&f, &p, &Allomorph::null(), None)));
        let other = Constraint::new(ConstraintKind::BoundMorpheme).with_ignore(IgnoreFlag {
            writing_system: Some(WritingSystem::new("ipa")),
            mode: None,
        });
        assert!(!other.matches(&eval(&f, &p, &Allomorph::null(), None)));
    }

    #[test]
    fn preceding_node_by_label() {
        let f = fixture();
        let p = parsing_with(&f, &[tagged("a", &[])], "ab");
        let c = Constraint::new(ConstraintKind::PrecedingNode {
            target: NodeTarget::Label(MorphemeLabel::new("M")),
            scope: NodeScope::Immediate,
        });
        let d = Constraint::new(ConstraintKind::PrecedingNode {
            target: NodeTarget::Id(NodeId::new("other")),
            scope: NodeScope::Any,
        });
        let candidate = Allomorph::from_form(Form::new(en(), "b"));
        assert!(c.matches(&eval(&f, &p, &candidate, None)));
        assert!(!d.matches(&eval(&f, &p, &candidate, None)));
    }
}
