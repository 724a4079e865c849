// Parsing: morpheme and stem nodes consume the input.

use std::sync::Arc;

use hashbrown::HashSet;
use morphgraph_core::{Form, MorphemeLabel};

use super::{Derivation, Traversal};
use crate::allomorph::Allomorph;
use crate::index::{NodeIndex, StemListIndex};
use crate::parsing::Parsing;
use crate::stem::LexicalStem;

impl Derivation for Parsing {
    fn parsing(&self) -> &Parsing {
        self
    }

    fn parsing_mut(&mut self) -> &mut Parsing {
        self
    }

    fn at_end(&self, t: &Traversal<'_>, last: NodeIndex) -> bool {
        self.position() == self.form().len() && t.grammar().node(last).has_path_to_end()
    }

    fn is_empty_derivation(&self) -> bool {
        self.steps().is_empty() && self.position() == self.form().len()
    }

    fn settle(&mut self, t: &Traversal<'_>) -> bool {
        match self.finish(t.grammar(), None) {
            Ok(()) => true,
            Err(c) => {
                t.report(t.model(), c);
                false
            }
        }
    }

    fn using_morpheme(
        t: &Traversal<'_>,
        index: NodeIndex,
        allomorphs: &[Arc<Allomorph>],
        d: &Self,
    ) -> Vec<Self> {
        let grammar = t.grammar();
        let node = grammar.node(index);
        let ws = d.writing_system();
        let remainder = d.remainder();
        let mut fused = Vec::new();
        let mut plain = Vec::new();

        for allomorph in allomorphs {
            if t.done(&fused) || t.done(&plain) {
                break;
            }
            let Some(text) = allomorph.text(ws) else {
                continue;
            };
            if !remainder.starts_with(text) {
                continue;
            }
            if let Some(c) = d.failing_match_condition(grammar, index, allomorph, None) {
                t.log().allomorph_matches(node, allomorph, false);
                t.report(index, c);
                continue;
            }
            t.log().allomorph_matches(node, allomorph, true);

            let mut next = d.clone();
            if let Err(c) = next.append(grammar, index, Arc::clone(allomorph), None, None) {
                t.report(index, c);
                continue;
            }
            match allomorph.portmanteau().filter(|p| p.is_initialized()) {
                Some(pm) => {
                    for &covered in &pm.nodes()[1..] {
                        next.append_continuation(grammar, covered, Arc::clone(allomorph));
                    }
                    let last = pm.last_node().unwrap_or(index);
                    fused.extend(t.proceed(last, &next));
                }
                None => plain.extend(t.proceed(index, &next)),
            }
        }

        // A run this node's portmanteau realizes may not also be parsed piece
        // by piece from this node on.
        let runs: Vec<&[MorphemeLabel]> = allomorphs
            .iter()
            .filter_map(|a| a.portmanteau())
            .map(|p| p.sequence().labels())
            .collect();
        if !runs.is_empty() {
            let anchor = d.steps().len();
            plain.retain(|p| !runs.iter().any(|run| p.has_unfused_run_at(anchor, run)));
        }
        fused.extend(plain);
        fused
    }

    fn using_stem_list(t: &Traversal<'_>, index: NodeIndex, list: StemListIndex, d: &Self) -> Vec<Self> {
        let grammar = t.grammar();
        let node = grammar.node(index);
        let ws = d.writing_system();
        let remainder = d.remainder();
        let mut found = Vec::new();

        for (stem, allomorph) in grammar.stem_list(list).matching_allomorphs(ws, remainder) {
            if t.done(&found) {
                break;
            }
            if let Some(c) = d.failing_match_condition(grammar, index, &allomorph, None) {
                t.log().allomorph_matches(node, &allomorph, false);
                t.report(index, c);
                continue;
            }
            t.log().allomorph_matches(node, &allomorph, true);
            let mut next = d.clone();
            match next.append(grammar, index, allomorph, Some(stem), None) {
                Ok(()) => found.extend(t.proceed(index, &next)),
                Err(c) => t.report(index, c),
            }
        }

        if t.config().guess_stem && !d.uses_hypothetical_stem() {
            let ends = remainder
                .char_indices()
                .map(|(i, _)| i)
                .skip(1)
                .chain(std::iter::once(remainder.len()))
                .filter(|&end| end > 0);
            for end in ends {
                if t.done(&found) {
                    break;
                }
                let stem = Arc::new(LexicalStem::hypothetical(Form::new(
                    ws.clone(),
                    &remainder[..end],
                )));
                let Some(allomorph) = stem.allomorphs().first().cloned() else {
                    continue;
                };
                let mut next = d.clone();
                if next.append(grammar, index, allomorph, Some(stem), None).is_ok() {
                    found.extend(t.proceed(index, &next));
                }
            }
        }
        found
    }

    /// Members of a group can reach the same derivation; keep one copy.
    fn merge_alternatives(alternatives: Vec<Self>) -> Vec<Self> {
        let mut seen = HashSet::new();
        alternatives
            .into_iter()
            .filter(|p| seen.insert(p.derivation_key()))
            .collect()
    }
}
