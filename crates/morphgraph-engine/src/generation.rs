// Generation state: a parse whose progress is driven by two goal queues
// instead of an input string.

use std::ops::Deref;
use std::sync::Arc;

use morphgraph_core::{Form, MorphemeLabel, MorphemeSequence, WritingSystem};

use crate::allomorph::Allomorph;
use crate::config::Mode;
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex};
use crate::parsing::Parsing;
use crate::stem::LexicalStem;

/// Ordered queue of lexical stems still to be inserted.
#[derive(Debug, Clone, Default)]
pub struct StemIdentityConstraint {
    stems: Arc<[Arc<LexicalStem>]>,
    consumed: usize,
}

impl StemIdentityConstraint {
    pub fn new(stems: Vec<Arc<LexicalStem>>) -> Self {
        Self {
            stems: stems.into(),
            consumed: 0,
        }
    }

    /// The next required stem.
    pub fn peek(&self) -> Option<&Arc<LexicalStem>> {
        self.stems.get(self.consumed)
    }

    pub fn remaining(&self) -> &[Arc<LexicalStem>] {
        &self.stems[self.consumed.min(self.stems.len())..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    pub(crate) fn pop(&mut self) {
        if self.consumed < self.stems.len() {
            self.consumed += 1;
        }
    }
}

/// Ordered queue of morpheme labels still to be produced.
#[derive(Debug, Clone, Default)]
pub struct MorphemeSequenceConstraint {
    labels: Arc<[MorphemeLabel]>,
    consumed: usize,
}

impl MorphemeSequenceConstraint {
    pub fn new(sequence: &MorphemeSequence) -> Self {
        Self {
            labels: sequence.labels().into(),
            consumed: 0,
        }
    }

    pub fn peek(&self) -> Option<&MorphemeLabel> {
        self.labels.get(self.consumed)
    }

    pub fn remaining(&self) -> &[MorphemeLabel] {
        &self.labels[self.consumed.min(self.labels.len())..]
    }

    pub fn len(&self) -> usize {
        self.remaining().len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Whether the remaining labels begin with `sequence`.
    pub fn starts_with(&self, sequence: &MorphemeSequence) -> bool {
        self.remaining().starts_with(sequence.labels())
    }

    pub(crate) fn advance(&mut self, count: usize) {
        self.consumed = (self.consumed + count).min(self.labels.len());
    }
}

/// A derivation being generated in an output writing system.
#[derive(Debug, Clone)]
pub struct Generation {
    parsing: Parsing,
    stems: StemIdentityConstraint,
    morphemes: MorphemeSequenceConstraint,
}

impl Generation {
    pub fn new(
        writing_system: WritingSystem,
        stems: StemIdentityConstraint,
        morphemes: MorphemeSequenceConstraint,
    ) -> Self {
        Self {
            parsing: Parsing::with_mode(Form::empty(writing_system), Mode::Generation),
            stems,
            morphemes,
        }
    }

    pub fn parsing(&self) -> &Parsing {
        &self.parsing
    }

    pub(crate) fn parsing_mut(&mut self) -> &mut Parsing {
        &mut self.parsing
    }

    pub fn stems_remaining(&self) -> &StemIdentityConstraint {
        &self.stems
    }

    pub fn morphemes_remaining(&self) -> &MorphemeSequenceConstraint {
        &self.morphemes
    }

    /// The generated surface form.
    pub fn output(&self) -> Form {
        Form::new(self.parsing.writing_system().clone(), self.parsing.surface())
    }

    /// Append and consume `labels` goal labels, plus the stem goal if `stem`
    /// is given. Pending local constraints see the goals before consumption.
    pub(crate) fn append(
        &mut self,
        grammar: &Grammar,
        node: NodeIndex,
        allomorph: Arc<Allomorph>,
        stem: Option<Arc<LexicalStem>>,
        labels: usize,
    ) -> Result<(), ConstraintIndex> {
        let is_stem = stem.is_some();
        self.parsing
            .append(grammar, node, allomorph, stem, Some(&self.morphemes))?;
        self.morphemes.advance(labels);
        if is_stem {
            self.stems.pop();
        }
        Ok(())
    }

    pub(crate) fn goals_met(&self) -> bool {
        self.stems.is_empty() && self.morphemes.is_empty()
    }

    pub(crate) fn finish(&mut self, grammar: &Grammar) -> Result<(), Option<ConstraintIndex>> {
        if !self.goals_met() {
            self.parsing.mark_failed();
            return Err(None);
        }
        self.parsing
            .finish(grammar, Some(&self.morphemes))
            .map_err(Some)
    }
}

impl Deref for Generation {
    type Target = Parsing;

    fn deref(&self) -> &Parsing {
        &self.parsing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintKind};
    use crate::grammar::GrammarBuilder;

    fn en() -> WritingSystem {
        WritingSystem::new("en")
    }

    #[test]
    fn queues_consume_in_order() {
        let seq: MorphemeSequence = "[Stem][PL][CASE]".parse().unwrap();
        let mut m = MorphemeSequenceConstraint::new(&seq);
        assert_eq!(m.peek().map(MorphemeLabel::as_str), Some("Stem"));
        m.advance(1);
        assert!(m.starts_with(&"[PL][CASE]".parse().unwrap()));
        m.advance(5);
        assert!(m.is_empty());
        assert_eq!(m.peek(), None);

        let stem = Arc::new(LexicalStem::from_form(Form::new(en(), "cat")));
        let mut s = StemIdentityConstraint::new(vec![stem]);
        assert!(s.peek().is_some());
        s.pop();
        s.pop();
        assert!(s.is_empty());
    }

    #[test]
    fn word_final_sees_goals_before_consumption() {
        let mut b = GrammarBuilder::new();
        let wf = b.constraint(Constraint::new(ConstraintKind::WordFinal));
        let a = b.morpheme("a", "A", vec![]);
        let c = b.morpheme("b", "B", vec![]);
        b.model("word", vec![a, c]);
        let grammar = b.finish().unwrap();

        let seq: MorphemeSequence = "[A][B]".parse().unwrap();
        let mut g = Generation::new(
            en(),
            StemIdentityConstraint::default(),
            MorphemeSequenceConstraint::new(&seq),
        );
        let final_a = Arc::new(Allomorph::from_form(Form::new(en(), "a")).with_constraint(wf));
        g.append(&grammar, a, final_a, None, 1).unwrap();
        let b_allo = Arc::new(Allomorph::from_form(Form::new(en(), "b")));
        assert_eq!(g.clone().append(&grammar, c, b_allo, None, 1), Err(wf));
        assert_eq!(g.finish(&grammar), Err(None));
    }

    #[test]
    fn output_concatenates_steps() {
        let mut b = GrammarBuilder::new();
        let a = b.morpheme("a", "A", vec![]);
        b.model("word", vec![a]);
        let grammar = b.finish().unwrap();
        let seq: MorphemeSequence = "[A]".parse().unwrap();
        let mut g = Generation::new(
            en(),
            StemIdentityConstraint::default(),
            MorphemeSequenceConstraint::new(&seq),
        );
        g.append(&grammar, a, Arc::new(Allomorph::from_form(Form::new(en(), "ka"))), None, 1)
            .unwrap();
        assert!(g.finish(&grammar).is_ok());
        assert_eq!(g.output(), Form::new(en(), "ka"));
        assert!(g.is_completed());
    }
}
