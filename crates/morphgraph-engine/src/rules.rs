// Allomorph-generation rule sets (CreateAllomorphs).
//
// Applied once while linking: every morpheme-node allomorph and every stem
// allomorph is run through its rule sets, and the output replaces the
// original working set.

use std::collections::BTreeSet;

use morphgraph_core::{Form, Tag, WritingSystem};
use regex::Regex;

use crate::allomorph::{Allomorph, AllomorphKind};
use crate::constraint::Evaluation;
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex, RuleIndex};
use crate::parsing::Parsing;

/// A regex rewrite of the form in one writing system.
#[derive(Debug, Clone)]
pub struct FormReplacement {
    pub writing_system: WritingSystem,
    pub pattern: Regex,
    pub replacement: String,
}

/// How one derived allomorph is built from its source.
#[derive(Debug, Clone, Default)]
pub struct AllomorphResult {
    pub replacements: Vec<FormReplacement>,
    pub add_tags: BTreeSet<Tag>,
    pub remove_tags: BTreeSet<Tag>,
    pub add_constraints: Vec<ConstraintIndex>,
    pub use_in_generations: Option<bool>,
}

impl AllomorphResult {
    pub fn apply(&self, source: &Allomorph) -> Allomorph {
        let mut derived = source.clone();
        derived.set_kind(AllomorphKind::Derived);
        for r in &self.replacements {
            if let Some(form) = source.form(&r.writing_system) {
                let text = r.pattern.replace_all(form.text(), r.replacement.as_str());
                derived.set_form(form.with_text(text));
            }
        }
        let tags = derived.tags_mut();
        tags.extend(self.add_tags.iter().cloned());
        tags.retain(|t| !self.remove_tags.contains(t));
        derived
            .constraints_mut()
            .extend(self.add_constraints.iter().copied());
        if let Some(flag) = self.use_in_generations {
            derived.set_use_in_generations(flag);
        }
        derived
    }
}

/// One case of a rule set: conditions and the allomorphs produced when they
/// hold.
#[derive(Debug, Clone, Default)]
pub struct AllomorphCase {
    pub conditions: Vec<ConstraintIndex>,
    /// Writing system the conditions are evaluated in. Defaults to the
    /// source allomorph's first form.
    pub condition_writing_system: Option<WritingSystem>,
    pub results: Vec<AllomorphResult>,
    /// Keep the source allomorph alongside the results.
    pub keep_original: bool,
}

impl AllomorphCase {
    fn matches(&self, grammar: &Grammar, source: &Allomorph) -> bool {
        let ws = self
            .condition_writing_system
            .clone()
            .or_else(|| source.forms().next().map(|f| f.writing_system().clone()))
            .unwrap_or_else(WritingSystem::null);
        let parsing = Parsing::new(Form::empty(ws));
        let ev = Evaluation {
            grammar,
            parsing: &parsing,
            morphemes: None,
            node: None::<NodeIndex>,
            allomorph: source,
            origin: None,
        };
        self.conditions
            .iter()
            .all(|&c| grammar.constraint(c).matches(&ev))
    }
}

/// A named, ordered list of cases.
#[derive(Debug, Clone)]
pub struct CreateAllomorphs {
    name: String,
    cases: Vec<AllomorphCase>,
}

impl CreateAllomorphs {
    pub fn new(name: impl Into<String>, cases: Vec<AllomorphCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[AllomorphCase] {
        &self.cases
    }

    /// Output of the first matching case, or the source unchanged.
    pub fn apply(&self, grammar: &Grammar, source: &Allomorph) -> Vec<Allomorph> {
        let Some(case) = self.cases.iter().find(|c| c.matches(grammar, source)) else {
            return vec![source.clone()];
        };
        let mut out = Vec::with_capacity(case.results.len() + 1);
        if case.keep_original {
            out.push(source.clone());
        }
        out.extend(case.results.iter().map(|r| r.apply(source)));
        out
    }
}

/// Run `source` through each rule set in turn, deduplicating the working set.
pub fn apply_rule_sets(grammar: &Grammar, rule_sets: &[RuleIndex], source: &Allomorph) -> Vec<Allomorph> {
    let mut working = vec![source.clone()];
    for &rule in rule_sets {
        let rule = grammar.rule(rule);
        let mut next: Vec<Allomorph> = Vec::new();
        for a in &working {
            for derived in rule.apply(grammar, a) {
                if !next.contains(&derived) {
                    next.push(derived);
                }
            }
        }
        working = next;
    }
    working
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, ConstraintKind, PhonologyScope};
    use crate::grammar::GrammarBuilder;

    fn en() -> WritingSystem {
        WritingSystem::new("en")
    }

    fn final_t(b: &mut GrammarBuilder) -> ConstraintIndex {
        b.constraint(Constraint::new(ConstraintKind::Phonological {
            pattern: Regex::new("t$").unwrap(),
            scope: PhonologyScope::Current,
        }))
    }

    fn gemination(cond: ConstraintIndex, keep_original: bool) -> CreateAllomorphs {
        CreateAllomorphs::new(
            "geminate",
            vec![AllomorphCase {
                conditions: vec![cond],
                condition_writing_system: None,
                results: vec![AllomorphResult {
                    replacements: vec![FormReplacement {
                        writing_system: en(),
                        pattern: Regex::new("t$").unwrap(),
                        replacement: "tt".into(),
                    }],
                    add_tags: [Tag::new("strong")].into_iter().collect(),
                    ..Default::default()
                }],
                keep_original,
            }],
        )
    }

    #[test]
    fn first_matching_case_fires() {
        let mut b = GrammarBuilder::new();
        let cond = final_t(&mut b);
        let rule = b.add_rule_set(gemination(cond, true)).unwrap();
        let grammar = b.finish().unwrap();

        let source = Allomorph::from_form(Form::new(en(), "katit"));
        let out = apply_rule_sets(&grammar, &[rule], &source);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], source);
        assert_eq!(out[1].text(&en()), Some("katitt"));
        assert_eq!(out[1].kind(), AllomorphKind::Derived);
        assert!(out[1].tags().contains(&Tag::new("strong")));
    }

    #[test]
    fn unmatched_allomorph_is_kept() {
        let mut b = GrammarBuilder::new();
        let cond = final_t(&mut b);
        let rule = b.add_rule_set(gemination(cond, false)).unwrap();
        let grammar = b.finish().unwrap();

        let source = Allomorph::from_form(Form::new(en(), "kalu"));
        assert_eq!(apply_rule_sets(&grammar, &[rule], &source), vec![source]);
    }

    #[test]
    fn results_can_hide_allomorphs_from_generation() {
        let result = AllomorphResult {
            use_in_generations: Some(false),
            remove_tags: [Tag::new("x")].into_iter().collect(),
            ..Default::default()
        };
        let source = Allomorph::from_form(Form::new(en(), "a")).with_tag(Tag::new("x"));
        let derived = result.apply(&source);
        assert!(!derived.use_in_generations());
        assert!(derived.tags().is_empty());
    }
}
