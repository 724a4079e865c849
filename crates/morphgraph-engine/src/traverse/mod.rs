// The search.
//
// Parsing and generation share one depth-first walk over the node graph.
// Each node kind knows how to extend a derivation; the two modes differ only
// in how a morpheme or stem-list node picks allomorphs and in what "finished"
// means, which is what `Derivation` abstracts.

mod generate;
mod parse;

use std::sync::Arc;

use hashbrown::HashSet;
use morphgraph_core::{Form, WritingSystem};

use crate::GrammarError;
use crate::allomorph::Allomorph;
use crate::config::TraversalConfig;
use crate::generation::{Generation, MorphemeSequenceConstraint, StemIdentityConstraint};
use crate::grammar::Grammar;
use crate::index::{ConstraintIndex, NodeIndex, StemListIndex};
use crate::log::ParsingLog;
use crate::node::NodeKind;
use crate::parsing::{Parsing, Status};

/// A derivation the search can extend: a [`Parsing`] or a [`Generation`].
pub(crate) trait Derivation: Clone {
    fn parsing(&self) -> &Parsing;

    fn parsing_mut(&mut self) -> &mut Parsing;

    /// Whether the derivation may stop right after appending at `last`.
    fn at_end(&self, t: &Traversal<'_>, last: NodeIndex) -> bool;

    /// Nothing appended and nothing left to do.
    fn is_empty_derivation(&self) -> bool;

    /// Settle pending constraints; true if the derivation completed.
    fn settle(&mut self, t: &Traversal<'_>) -> bool;

    fn using_morpheme(
        t: &Traversal<'_>,
        node: NodeIndex,
        allomorphs: &[Arc<Allomorph>],
        d: &Self,
    ) -> Vec<Self>;

    fn using_stem_list(t: &Traversal<'_>, node: NodeIndex, list: StemListIndex, d: &Self) -> Vec<Self>;

    /// Combine the results of the members of a mutually exclusive group.
    fn merge_alternatives(alternatives: Vec<Self>) -> Vec<Self>;
}

/// One search over one model.
pub struct Traversal<'g> {
    grammar: &'g Grammar,
    model: NodeIndex,
    config: TraversalConfig,
    log: &'g dyn ParsingLog,
    zero_length: bool,
}

impl<'g> Traversal<'g> {
    pub fn new(
        grammar: &'g Grammar,
        model: NodeIndex,
        config: TraversalConfig,
        log: &'g dyn ParsingLog,
    ) -> Result<Self, GrammarError> {
        let node = grammar.node(model);
        if !node.is_model() {
            return Err(GrammarError::NotAModel(node.id().clone()));
        }
        Ok(Self {
            grammar,
            model,
            config,
            log,
            zero_length: grammar.model_has_zero_length_forms(model),
        })
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn model(&self) -> NodeIndex {
        self.model
    }

    pub(crate) fn log(&self) -> &dyn ParsingLog {
        self.log
    }

    /// Every completed parse of `form` in this model.
    pub fn parse(&self, form: &Form) -> Vec<Parsing> {
        let mut start = Parsing::new(form.clone());
        start.set_model(self.model);
        let found = self.possible(self.model, &start, false);
        self.finalize_results(found)
    }

    /// Every completed generation of `morphemes` over `stems` in `ws`.
    pub fn generate(
        &self,
        ws: &WritingSystem,
        stems: StemIdentityConstraint,
        morphemes: MorphemeSequenceConstraint,
    ) -> Vec<Generation> {
        let mut start = Generation::new(ws.clone(), stems, morphemes);
        start.parsing_mut().set_model(self.model);
        let found = self.possible(self.model, &start, false);
        self.finalize_results(found)
    }

    fn finalize_results<D: Derivation>(&self, found: Vec<D>) -> Vec<D> {
        let mut out = remove_duplicates(found);
        if self.config.only_one_result {
            out.truncate(1);
        }
        out
    }

    /// Whether the search may stop early.
    pub(crate) fn done<D>(&self, found: &[D]) -> bool {
        self.config.only_one_result && !found.is_empty()
    }

    /// Extend `d` at `index`, and also skip `index` when it is optional.
    pub(crate) fn possible<D: Derivation>(&self, index: NodeIndex, d: &D, next_required: bool) -> Vec<D> {
        let node = self.grammar.node(index);
        self.log.enter_node(node, d.parsing());
        let mut found = self.using_node(index, d);
        if node.is_optional() && !next_required && self.may_skip(d, &found) {
            found.extend(self.advance(index, d));
        }
        self.log.exit_node(node, found.len());
        found
    }

    fn may_skip<D: Derivation>(&self, d: &D, found: &[D]) -> bool {
        let status = d.parsing().status();
        let unfinished = status != Status::Completed
            && (matches!(status, Status::Null | Status::Ongoing) || self.zero_length);
        // Zero-length allomorphs can make a skipped and a consumed node
        // indistinguishable in the surface, so both are always explored.
        unfinished && (!self.done(found) || self.zero_length)
    }

    fn using_node<D: Derivation>(&self, index: NodeIndex, d: &D) -> Vec<D> {
        match self.grammar.node(index).kind() {
            NodeKind::Morpheme { allomorphs, .. } => D::using_morpheme(self, index, allomorphs, d),
            NodeKind::StemList { list } => D::using_stem_list(self, index, *list, d),
            NodeKind::Fork { paths } => {
                let mut found = Vec::new();
                for &path in paths {
                    found.extend(self.possible(path, d, false));
                    if self.done(&found) {
                        break;
                    }
                }
                found
            }
            NodeKind::Path { children, .. } | NodeKind::Model { children, .. } => {
                match children.first() {
                    Some(&first) => self.possible(first, d, false),
                    None => self.advance(index, d),
                }
            }
            NodeKind::Jump {
                target,
                target_required,
                ..
            } => {
                let Some(target) = *target else {
                    return Vec::new();
                };
                if d.parsing().jump_count(index) >= self.config.max_jumps {
                    return Vec::new();
                }
                let mut jumped = d.clone();
                jumped.parsing_mut().record_jump(index);
                self.possible(target, &jumped, *target_required)
            }
            NodeKind::MutuallyExclusive { morphemes } => {
                let mut found = Vec::new();
                for &member in morphemes {
                    found.extend(self.possible(member, d, false));
                    if self.done(&found) {
                        break;
                    }
                }
                D::merge_alternatives(found)
            }
            NodeKind::Copy { clone, .. } => match *clone {
                Some(clone) => self.possible(clone, d, false),
                None => Vec::new(),
            },
        }
    }

    /// Continue after `index` without appending anything there.
    fn advance<D: Derivation>(&self, index: NodeIndex, d: &D) -> Vec<D> {
        match self.grammar.node(index).next() {
            Some(next) => self.possible(next, d, false),
            None if d.is_empty_derivation() => self.complete(d),
            None => Vec::new(),
        }
    }

    /// After appending at `last`: complete here if possible, then keep
    /// looking for longer derivations.
    pub(crate) fn proceed<D: Derivation>(&self, last: NodeIndex, d: &D) -> Vec<D> {
        let mut found = Vec::new();
        if d.at_end(self, last) {
            found = self.complete(d);
            if !self.zero_length || self.done(&found) {
                return found;
            }
        }
        found.extend(self.advance(last, d));
        found
    }

    fn complete<D: Derivation>(&self, d: &D) -> Vec<D> {
        let mut finished = d.clone();
        if finished.settle(self) {
            self.log.completed(finished.parsing());
            vec![finished]
        } else {
            Vec::new()
        }
    }

    /// Report a failed constraint to the log.
    pub(crate) fn report(&self, node: NodeIndex, constraint: ConstraintIndex) {
        if self.log.enabled() {
            let summary = self.grammar.constraint(constraint).summary(self.grammar);
            self.log
                .constraints_checked(self.grammar.node(node), &summary, false);
        }
    }
}

/// Drop derivations identical step for step, keeping the first.
pub(crate) fn remove_duplicates<D: Derivation>(found: Vec<D>) -> Vec<D> {
    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|d| seen.insert(d.parsing().derivation_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allomorph::Portmanteau;
    use crate::config::ParseFlags;
    use crate::constraint::{Constraint, ConstraintKind, TagScope};
    use crate::grammar::GrammarBuilder;
    use crate::log::NullLog;
    use crate::stem::{LexicalStem, MemoryStemList, StemStore};
    use morphgraph_core::{MorphemeSequence, Tag};
    use std::collections::BTreeSet;

    fn en() -> WritingSystem {
        WritingSystem::new("en")
    }

    fn a(text: &str) -> Allomorph {
        Allomorph::from_form(Form::new(en(), text))
    }

    fn summaries(parsings: &[Parsing]) -> Vec<String> {
        let mut out: Vec<String> = parsings.iter().map(Parsing::summary).collect();
        out.sort();
        out
    }

    fn parse(g: &Grammar, model: NodeIndex, text: &str) -> Vec<Parsing> {
        Traversal::new(g, model, TraversalConfig::default(), &NullLog)
            .unwrap()
            .parse(&Form::new(en(), text))
    }

    /// Stem list with "katit", optional "-ing" suffix.
    fn katit() -> (Grammar, NodeIndex) {
        let mut b = GrammarBuilder::new();
        let mut list = MemoryStemList::new("stems");
        list.read_stems(vec![LexicalStem::from_form(Form::new(en(), "katit"))])
            .unwrap();
        let list = b.add_stem_list(Box::new(list));
        let stem = b.stem_list("stem", "Stem", list);
        let ing = b.morpheme("ing", "-ing", vec![a("ing").with_tag(Tag::new("progressive"))]);
        b.set_optional(ing, true);
        let model = b.model("word", vec![stem, ing]);
        (b.finish().unwrap(), model)
    }

    #[test]
    fn katit_scenario() {
        let (g, model) = katit();
        assert_eq!(summaries(&parse(&g, model, "katiting")), ["[Stem][-ing]"]);
        assert_eq!(summaries(&parse(&g, model, "katit")), ["[Stem]"]);
        assert!(parse(&g, model, "xyz").is_empty());
        assert!(parse(&g, model, "katitin").is_empty());
    }

    #[test]
    fn completed_parses_consume_everything() {
        let (g, model) = katit();
        for p in parse(&g, model, "katiting") {
            assert!(p.is_completed());
            assert_eq!(p.position(), "katiting".len());
            let last = p.steps().last().unwrap();
            assert!(g.node(last.node).has_path_to_end());
        }
    }

    #[test]
    fn guessing_proposes_hypothetical_stems() {
        let (g, model) = katit();
        let config = TraversalConfig::default().with_flags(ParseFlags::guessing());
        let t = Traversal::new(&g, model, config, &NullLog).unwrap();
        let found = t.parse(&Form::new(en(), "kotoing"));
        let stems: Vec<String> = found
            .iter()
            .flat_map(|p| p.stems())
            .filter(|s| s.is_hypothetical())
            .filter_map(|s| s.display_text(&en()).map(str::to_string))
            .collect();
        assert!(stems.contains(&"koto".to_string()));
        assert!(stems.contains(&"kotoing".to_string()));
    }

    #[test]
    fn fork_unions_paths() {
        let mut b = GrammarBuilder::new();
        let x = b.morpheme("x", "X", vec![a("ab")]);
        let y = b.morpheme("y", "Y", vec![a("a")]);
        let z = b.morpheme("z", "Z", vec![a("b")]);
        let p1 = b.path("p1", vec![x]);
        let p2 = b.path("p2", vec![y, z]);
        let fork = b.fork("f", vec![p1, p2]);
        let model = b.model("word", vec![fork]);
        let g = b.finish().unwrap();
        assert_eq!(summaries(&parse(&g, model, "ab")), ["[X]", "[Y][Z]"]);
    }

    fn reduplication() -> (Grammar, NodeIndex) {
        let mut b = GrammarBuilder::new();
        let root = b.morpheme("root", "R", vec![a("ka")]);
        let again = b.jump("again", "root", false);
        let model = b.model("word", vec![root, again]);
        (b.finish().unwrap(), model)
    }

    #[test]
    fn jumps_are_bounded() {
        let (g, model) = reduplication();
        assert_eq!(summaries(&parse(&g, model, "kaka")), ["[R][R]"]);
        assert!(parse(&g, model, "kakaka").is_empty());

        let config = TraversalConfig::default().with_max_jumps(3);
        let t = Traversal::new(&g, model, config, &NullLog).unwrap();
        assert_eq!(t.parse(&Form::new(en(), "kakakaka")).len(), 1);
        assert!(t.parse(&Form::new(en(), "kakakakaka")).is_empty());
    }

    #[test]
    fn optional_zero_length_node_offers_both_paths() {
        let mut b = GrammarBuilder::new();
        let null = b.morpheme("null", "NULL", vec![a("")]);
        b.set_optional(null, true);
        let root = b.morpheme("root", "R", vec![a("ka")]);
        let model = b.model("word", vec![null, root]);
        let g = b.finish().unwrap();
        assert_eq!(summaries(&parse(&g, model, "ka")), ["[NULL][R]", "[R]"]);
    }

    #[test]
    fn interrupted_tag_match() {
        let mut b = GrammarBuilder::new();
        let needs_plural = b.constraint(Constraint::new(ConstraintKind::TagMatch {
            tags: BTreeSet::from([Tag::new("plural")]),
            scope: TagScope::AnyPreceding,
            interrupted_by: BTreeSet::from([Tag::new("case")]),
        }));
        let root = b.morpheme("root", "R", vec![a("ka")]);
        let pl = b.morpheme("pl", "PL", vec![a("s").with_tag(Tag::new("plural"))]);
        let case = b.morpheme("case", "CASE", vec![a("n").with_tag(Tag::new("case"))]);
        b.set_optional(case, true);
        let agr = b.morpheme("agr", "AGR", vec![a("i").with_constraint(needs_plural)]);
        let model = b.model("word", vec![root, pl, case, agr]);
        let g = b.finish().unwrap();
        assert_eq!(summaries(&parse(&g, model, "kasi")), ["[R][PL][AGR]"]);
        assert!(parse(&g, model, "kasni").is_empty());
    }

    fn go_past() -> (Grammar, NodeIndex, NodeIndex) {
        let mut b = GrammarBuilder::new();
        let go = b.morpheme(
            "go",
            "go",
            vec![a("go"), a("went").with_portmanteau(Portmanteau::new("[go][PAST]".parse().unwrap()))],
        );
        let past = b.morpheme("past", "PAST", vec![a("ed")]);
        b.set_optional(past, true);
        let model = b.model("word", vec![go, past]);
        (b.finish().unwrap(), model, go)
    }

    #[test]
    fn portmanteau_blocks_regular_form() {
        let (g, model, _) = go_past();
        assert_eq!(summaries(&parse(&g, model, "went")), ["[go][PAST]"]);
        assert!(parse(&g, model, "goed").is_empty());
        assert_eq!(summaries(&parse(&g, model, "go")), ["[go]"]);
    }

    #[test]
    fn generation_prefers_portmanteau() {
        let (g, model, _) = go_past();
        let t = Traversal::new(&g, model, TraversalConfig::default(), &NullLog).unwrap();
        let seq: MorphemeSequence = "[go][PAST]".parse().unwrap();
        let found = t.generate(
            &en(),
            StemIdentityConstraint::default(),
            MorphemeSequenceConstraint::new(&seq),
        );
        let outputs: Vec<String> = found.iter().map(|g| g.output().text().to_string()).collect();
        assert_eq!(outputs, ["went"]);
    }

    #[test]
    fn portmanteau_pruning_starts_at_the_owner() {
        let mut b = GrammarBuilder::new();
        let go = b.morpheme("go", "go", vec![a("go")]);
        let past = b.morpheme("past", "PAST", vec![a("ed")]);
        let again = b.morpheme(
            "again",
            "go",
            vec![a("ga"), a("went").with_portmanteau(Portmanteau::new("[go][PAST]".parse().unwrap()))],
        );
        let tail = b.morpheme("tail", "PAST", vec![a("d")]);
        b.set_optional(tail, true);
        let model = b.model("word", vec![go, past, again, tail]);
        let g = b.finish().unwrap();
        assert_eq!(summaries(&parse(&g, model, "goedga")), ["[go][PAST][go]"]);
        assert_eq!(summaries(&parse(&g, model, "goedwent")), ["[go][PAST][go][PAST]"]);
        assert!(parse(&g, model, "goedgad").is_empty());
    }

    fn generate(g: &Grammar, model: NodeIndex, sequence: &str) -> Vec<String> {
        let t = Traversal::new(g, model, TraversalConfig::default(), &NullLog).unwrap();
        let seq: MorphemeSequence = sequence.parse().unwrap();
        let mut out: Vec<String> = t
            .generate(
                &en(),
                StemIdentityConstraint::default(),
                MorphemeSequenceConstraint::new(&seq),
            )
            .iter()
            .map(|g| g.output().text().to_string())
            .collect();
        out.sort();
        out
    }

    /// Root "kat", suffix "a", then `tail` holding an "x" morpheme.
    fn with_tail(sequence: bool, optional: bool) -> (Grammar, NodeIndex) {
        let mut b = GrammarBuilder::new();
        let stem = b.morpheme("stem", "Stem", vec![a("kat")]);
        let suffix = b.morpheme("a", "A", vec![a("a")]);
        let x = b.morpheme("x", "X", vec![a("x")]);
        let tail = if sequence {
            b.sequence("tail", vec![x])
        } else {
            b.path("tail", vec![x])
        };
        b.set_optional(tail, optional);
        let model = b.model("word", vec![stem, suffix, tail]);
        (b.finish().unwrap(), model)
    }

    #[test]
    fn sequence_splices_its_children_in_place() {
        let (g, model) = with_tail(true, false);
        assert_eq!(summaries(&parse(&g, model, "katax")), ["[Stem][A][X]"]);
        assert!(parse(&g, model, "kata").is_empty());
        assert_eq!(generate(&g, model, "[Stem][A][X]"), ["katax"]);
    }

    #[test]
    fn trailing_sequence_stays_required_when_flagged_optional() {
        let (g, model) = with_tail(true, true);
        assert!(parse(&g, model, "kata").is_empty());
        assert_eq!(summaries(&parse(&g, model, "katax")), ["[Stem][A][X]"]);

        let (g, model) = with_tail(false, true);
        assert_eq!(summaries(&parse(&g, model, "kata")), ["[Stem][A]"]);
        assert_eq!(summaries(&parse(&g, model, "katax")), ["[Stem][A][X]"]);
    }

    #[test]
    fn inner_sequence_stays_required_when_flagged_optional() {
        let mut b = GrammarBuilder::new();
        let stem = b.morpheme("stem", "Stem", vec![a("kat")]);
        let x = b.morpheme("x", "X", vec![a("x")]);
        let inner = b.sequence("inner", vec![x]);
        b.set_optional(inner, true);
        let end = b.morpheme("end", "END", vec![a("z")]);
        let model = b.model("word", vec![stem, inner, end]);
        let g = b.finish().unwrap();
        assert!(parse(&g, model, "katz").is_empty());
        assert_eq!(summaries(&parse(&g, model, "katxz")), ["[Stem][X][END]"]);
    }

    /// Root "ka" followed by a plural slot filled by either "s" or "es".
    fn plural_group(optional_members: bool) -> (Grammar, NodeIndex) {
        let mut b = GrammarBuilder::new();
        let root = b.morpheme("root", "R", vec![a("ka")]);
        let s = b.morpheme("s", "PL", vec![a("s")]);
        let es = b.morpheme("es", "PL", vec![a("es")]);
        b.set_optional(s, optional_members);
        b.set_optional(es, optional_members);
        let group = b.mutually_exclusive("pl", "PL", vec![s, es]);
        let end = b.morpheme("end", "END", vec![a("n")]);
        b.set_optional(end, true);
        let model = b.model("word", vec![root, group, end]);
        (b.finish().unwrap(), model)
    }

    #[test]
    fn mutually_exclusive_members_are_alternatives() {
        let (g, model) = plural_group(false);
        assert_eq!(summaries(&parse(&g, model, "kas")), ["[R][PL]"]);
        assert_eq!(summaries(&parse(&g, model, "kaesn")), ["[R][PL][END]"]);
        assert!(parse(&g, model, "kasesn").is_empty());
        assert!(parse(&g, model, "ka").is_empty());
    }

    #[test]
    fn mutually_exclusive_skips_collapse_to_one_parse() {
        let (g, model) = plural_group(true);
        let found = parse(&g, model, "kan");
        assert_eq!(summaries(&found), ["[R][END]"]);
        let members = g.node(g.node_by_id("pl").unwrap()).kind().children();
        let alternatives: Vec<Parsing> = members
            .iter()
            .flat_map(|&m| {
                let t = Traversal::new(&g, model, TraversalConfig::default(), &NullLog).unwrap();
                let mut start = Parsing::new(Form::new(en(), "kan"));
                start.set_model(model);
                start
                    .append(&g, g.node_by_id("root").unwrap(), Arc::new(a("ka")), None, None)
                    .unwrap();
                t.possible(m, &start, false)
            })
            .collect();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(Parsing::merge_alternatives(alternatives).len(), 1);
    }

    #[test]
    fn mutually_exclusive_generation_offers_every_member() {
        let (g, model) = plural_group(false);
        assert_eq!(generate(&g, model, "[R][PL]"), ["kaes", "kas"]);
    }

    #[test]
    fn copies_parse_through_their_clone() {
        let mut b = GrammarBuilder::new();
        let stem = b.morpheme("stem", "Stem", vec![a("kat")]);
        let suffix = b.morpheme("a", "A", vec![a("a")]);
        let x = b.morpheme("b", "B", vec![a("b")]);
        let again = b.copy("b-again", "b", "-2");
        b.set_optional(again, true);
        let model = b.model("word", vec![stem, suffix, x, again]);
        let g = b.finish().unwrap();

        assert_eq!(summaries(&parse(&g, model, "katab")), ["[Stem][A][B]"]);
        let found = parse(&g, model, "katabb");
        assert_eq!(summaries(&found), ["[Stem][A][B][B]"]);
        let ids: Vec<&str> = found[0]
            .steps()
            .iter()
            .map(|s| g.node(s.node).id().as_str())
            .collect();
        assert_eq!(ids, ["stem", "a", "b", "b-2"]);
        assert!(parse(&g, model, "katabbb").is_empty());
        assert_eq!(generate(&g, model, "[Stem][A][B][B]"), ["katabb"]);
    }

    #[test]
    fn generation_through_stem_list() {
        let (g, model) = katit();
        let t = Traversal::new(&g, model, TraversalConfig::default(), &NullLog).unwrap();
        let (list, _) = g.stem_lists().next().unwrap();
        let stem = g.stem_list(list).stems().next().cloned().unwrap();
        let seq: MorphemeSequence = "[Stem][-ing]".parse().unwrap();
        let found = t.generate(
            &en(),
            StemIdentityConstraint::new(vec![stem]),
            MorphemeSequenceConstraint::new(&seq),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].output().text(), "katiting");
    }

    #[test]
    fn only_one_result_stops_early() {
        let mut b = GrammarBuilder::new();
        let x = b.morpheme("x", "X", vec![a("a"), a("a").with_tag(Tag::new("other"))]);
        let model = b.model("word", vec![x]);
        let g = b.finish().unwrap();
        assert_eq!(parse(&g, model, "a").len(), 2);
        let config = TraversalConfig::default().with_flags(ParseFlags::only_one());
        let t = Traversal::new(&g, model, config, &NullLog).unwrap();
        assert_eq!(t.parse(&Form::new(en(), "a")).len(), 1);
    }

    #[test]
    fn traversal_requires_a_model() {
        let (g, _) = katit();
        let stem = g.node_by_id("stem").unwrap();
        assert!(matches!(
            Traversal::new(&g, stem, TraversalConfig::default(), &NullLog),
            Err(GrammarError::NotAModel(_))
        ));
    }
}
