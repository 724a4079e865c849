// Parse state.
//
// A `Parsing` is copied at every branch of the search. Everything in it is
// either `Copy`, a small vector, or shared through `Arc`, so a copy never
// duplicates the step history.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use morphgraph_core::{Form, MorphemeLabel, MorphemeSequence, WritingSystem};

use crate::allomorph::Allomorph;
use crate::config::Mode;
use crate::constraint::{ConstraintType, Evaluation};
use crate::generation::MorphemeSequenceConstraint;
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex};
use crate::stem::{LexicalStem, StemId};
use crate::steps::{ParsingStep, StepList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Nothing appended yet.
    #[default]
    Null,
    Ongoing,
    Failed,
    Completed,
}

/// A local or long-distance constraint waiting to be checked, with the index
/// of the step whose allomorph attached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingConstraint {
    pub constraint: ConstraintIndex,
    pub origin: usize,
}

/// An in-progress or finished derivation.
///
/// In parsing mode `form` is the input; in generation mode it is an empty form
/// in the output writing system and the surface text is read off the steps.
#[derive(Clone)]
pub struct Parsing {
    form: Form,
    mode: Mode,
    position: usize,
    steps: StepList,
    local: Vec<PendingConstraint>,
    long_distance: Vec<PendingConstraint>,
    status: Status,
    model: Option<NodeIndex>,
    jumps: Vec<(NodeIndex, u32)>,
    hypothetical_stem: bool,
}

impl Parsing {
    pub fn new(form: Form) -> Self {
        Self::with_mode(form, Mode::Parsing)
    }

    pub(crate) fn with_mode(form: Form, mode: Mode) -> Self {
        Self {
            form,
            mode,
            position: 0,
            steps: StepList::new(),
            local: Vec::new(),
            long_distance: Vec::new(),
            status: Status::Null,
            model: None,
            jumps: Vec::new(),
            hypothetical_stem: false,
        }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn writing_system(&self) -> &WritingSystem {
        self.form.writing_system()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Bytes of the input consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// The model this derivation runs in.
    pub fn model(&self) -> Option<NodeIndex> {
        self.model
    }

    pub(crate) fn set_model(&mut self, model: NodeIndex) {
        self.model = Some(model);
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    pub fn pending_local(&self) -> &[PendingConstraint] {
        &self.local
    }

    pub fn pending_long_distance(&self) -> &[PendingConstraint] {
        &self.long_distance
    }

    /// Unconsumed input. Always empty when generating.
    pub fn remainder(&self) -> &str {
        match self.mode {
            Mode::Parsing => self.form.text().get(self.position..).unwrap_or(""),
            Mode::Generation => "",
        }
    }

    /// Surface text produced so far.
    pub fn preceding_text(&self) -> Cow<'_, str> {
        match self.mode {
            Mode::Parsing => Cow::Borrowed(self.form.text().get(..self.position).unwrap_or("")),
            Mode::Generation => Cow::Owned(self.surface()),
        }
    }

    /// Concatenated allomorph texts in this derivation's writing system.
    pub fn surface(&self) -> String {
        let ws = self.writing_system();
        self.steps
            .iter()
            .filter(|s| !s.continuation)
            .filter_map(|s| s.allomorph.text(ws))
            .collect()
    }

    /// Times `jump` has been taken along this branch.
    pub fn jump_count(&self, jump: NodeIndex) -> u32 {
        self.jumps
            .iter()
            .find(|(n, _)| *n == jump)
            .map_or(0, |(_, c)| *c)
    }

    pub(crate) fn record_jump(&mut self, jump: NodeIndex) {
        match self.jumps.iter_mut().find(|(n, _)| *n == jump) {
            Some((_, count)) => *count += 1,
            None => self.jumps.push((jump, 1)),
        }
    }

    pub fn uses_hypothetical_stem(&self) -> bool {
        self.hypothetical_stem
    }

    /// Achieved morpheme labels, including those a portmanteau fills in.
    pub fn morpheme_sequence(&self) -> MorphemeSequence {
        self.steps.iter().map(|s| s.label.clone()).collect()
    }

    pub fn stems(&self) -> Vec<Arc<LexicalStem>> {
        self.steps.iter().filter_map(|s| s.stem.clone()).collect()
    }

    /// Bracketed label summary, e.g. `[Stem][-ing]`.
    pub fn summary(&self) -> String {
        self.morpheme_sequence().to_string()
    }

    /// Whether every match-type constraint on `allomorph` holds at `node`.
    pub fn allomorph_matches(
        &self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: &Allomorph,
        morphemes: Option<&MorphemeSequenceConstraint>,
    ) -> bool {
        self.failing_match_condition(grammar, node, allomorph, morphemes)
            .is_none()
    }

    pub(crate) fn failing_match_condition(
        &self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: &Allomorph,
        morphemes: Option<&MorphemeSequenceConstraint>,
    ) -> Option<ConstraintIndex> {
        let ev = Evaluation {
            grammar,
            parsing: self,
            morphemes,
            node: Some(node),
            allomorph,
            origin: None,
        };
        allomorph.constraints().iter().copied().find(|&c| {
            let constraint = grammar.constraint(c);
            constraint.constraint_type() == ConstraintType::Match && !constraint.matches(&ev)
        })
    }

    /// Append `allomorph` at `node`.
    ///
    /// Pending local constraints are checked against the new allomorph first;
    /// on failure the parsing is marked failed and the offending constraint is
    /// returned. The allomorph's own local and long-distance constraints are
    /// then attached.
    pub(crate) fn append(
        &mut self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: Arc<Allomorph>,
        stem: Option<Arc<LexicalStem>>,
        morphemes: Option<&MorphemeSequenceConstraint>,
    ) -> Result<(), ConstraintIndex> {
        if let Some(failed) = self.check_local(grammar, Some(node), &allomorph, morphemes) {
            self.status = Status::Failed;
            return Err(failed);
        }
        self.local.clear();
        let origin = self.steps.len();
        for &c in allomorph.constraints() {
            let pending = PendingConstraint {
                constraint: c,
                origin,
            };
            match grammar.constraint(c).constraint_type() {
                ConstraintType::Match => {}
                ConstraintType::Local => self.local.push(pending),
                ConstraintType::LongDistance => self.long_distance.push(pending),
            }
        }
        self.push_step(grammar, node, allomorph, stem);
        Ok(())
    }

    /// Record the extra node a portmanteau allomorph realizes.
    pub(crate) fn append_continuation(
        &mut self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: Arc<Allomorph>,
    ) {
        self.steps.push(ParsingStep {
            node,
            label: grammar.node(node).label().clone(),
            allomorph,
            stem: None,
            is_stem: false,
            continuation: true,
        });
    }

    pub(crate) fn push_step(
        &mut self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: Arc<Allomorph>,
        stem: Option<Arc<LexicalStem>>,
    ) {
        self.position += allomorph.text(self.writing_system()).map_or(0, str::len);
        if stem.as_ref().is_some_and(|s| s.is_hypothetical()) {
            self.hypothetical_stem = true;
        }
        self.steps.push(ParsingStep {
            node,
            label: grammar.node(node).label().clone(),
            is_stem: stem.is_some(),
            allomorph,
            stem,
            continuation: false,
        });
        self.status = Status::Ongoing;
    }

    /// Settle every pending constraint and mark the parsing completed or
    /// failed. Local constraints see the Null allomorph.
    pub(crate) fn finish(
        &mut self,
        grammar: &Grammar,
        morphemes: Option<&MorphemeSequenceConstraint>,
    ) -> Result<(), ConstraintIndex> {
        let null = Allomorph::null();
        let failed = self
            .check_local(grammar, None, &null, morphemes)
            .or_else(|| {
                self.long_distance.iter().find_map(|p| {
                    let ev = Evaluation {
                        grammar,
                        parsing: self,
                        morphemes,
                        node: None,
                        allomorph: &null,
                        origin: Some(p.origin),
                    };
                    (!grammar.constraint(p.constraint).matches(&ev)).then_some(p.constraint)
                })
            });
        match failed {
            Some(c) => {
                self.status = Status::Failed;
                Err(c)
            }
            None => {
                self.local.clear();
                self.status = Status::Completed;
                Ok(())
            }
        }
    }

    fn check_local(
        &self,
        grammar: &Grammar,
        node: Option<NodeIndex>,
        allomorph: &Allomorph,
        morphemes: Option<&MorphemeSequenceConstraint>,
    ) -> Option<ConstraintIndex> {
        self.local.iter().find_map(|p| {
            let ev = Evaluation {
                grammar,
                parsing: self,
                morphemes,
                node,
                allomorph,
                origin: Some(p.origin),
            };
            (!grammar.constraint(p.constraint).matches(&ev)).then_some(p.constraint)
        })
    }

    pub(crate) fn mark_failed(&mut self) {
        self.status = Status::Failed;
    }

    /// Whether the steps starting at `start` spell out `labels` one node at a
    /// time, rather than through a portmanteau allomorph.
    pub(crate) fn has_unfused_run_at(&self, start: usize, labels: &[MorphemeLabel]) -> bool {
        let end = start + labels.len();
        if labels.is_empty() || end > self.steps.len() {
            return false;
        }
        let mut first = None;
        let run = self.steps.since(start).skip(self.steps.len() - end);
        for (step, label) in run.zip(labels.iter().rev()) {
            if &step.label != label {
                return false;
            }
            first = Some(step);
        }
        first.is_some_and(|s| s.allomorph.portmanteau().is_none() && !s.continuation)
    }

    /// Key identifying the exact derivation: nodes, allomorphs and stems.
    pub(crate) fn derivation_key(&self) -> Vec<(NodeIndex, Arc<Allomorph>, Option<StemId>)> {
        self.steps
            .iter_rev()
            .map(|s| (s.node, Arc::clone(&s.allomorph), s.stem.as_ref().and_then(|st| st.id())))
            .collect()
    }
}

/// Parsings are equal when they achieve the same morpheme sequence with the
/// same stems.
impl PartialEq for Parsing {
    fn eq(&self, other: &Self) -> bool {
        self.steps.len() == other.steps.len()
            && self
                .steps
                .iter_rev()
                .zip(other.steps.iter_rev())
                .all(|(a, b)| a.label == b.label && a.stem == b.stem)
    }
}

impl Eq for Parsing {}

impl Hash for Parsing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for step in self.steps.iter_rev() {
            step.label.hash(state);
            step.stem.hash(state);
        }
    }
}

impl fmt::Debug for Parsing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsing")
            .field("form", &self.form)
            .field("summary", &self.summary())
            .field("position", &self.position)
            .field("status", &self.status)
            .finish()
    }
}
