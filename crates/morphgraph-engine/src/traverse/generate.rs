// Generation: morpheme and stem nodes consume the goal queues.

use std::sync::Arc;

use super::{Derivation, Traversal};
use crate::allomorph::Allomorph;
use crate::generation::Generation;
use crate::index::{NodeIndex, StemListIndex};
use crate::parsing::Parsing;
use crate::stem::LexicalStem;

impl Derivation for Generation {
    fn parsing(&self) -> &Parsing {
        Generation::parsing(self)
    }

    fn parsing_mut(&mut self) -> &mut Parsing {
        Generation::parsing_mut(self)
    }

    fn at_end(&self, t: &Traversal<'_>, last: NodeIndex) -> bool {
        self.goals_met() && t.grammar().node(last).has_path_to_end()
    }

    fn is_empty_derivation(&self) -> bool {
        self.steps().is_empty() && self.goals_met()
    }

    fn settle(&mut self, t: &Traversal<'_>) -> bool {
        match self.finish(t.grammar()) {
            Ok(()) => true,
            Err(Some(c)) => {
                t.report(t.model(), c);
                false
            }
            Err(None) => false,
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
        if d.morphemes_remaining().peek() != Some(node.label()) {
            return Vec::new();
        }
        let ws = d.writing_system();
        let mut fused = Vec::new();
        let mut plain = Vec::new();

        for allomorph in allomorphs {
            if t.done(&fused) {
                break;
            }
            if !allomorph.use_in_generations() || !allomorph.has_form(ws) {
                continue;
            }
            if let Some(c) =
                d.failing_match_condition(grammar, index, allomorph, Some(d.morphemes_remaining()))
            {
                t.log().allomorph_matches(node, allomorph, false);
                t.report(index, c);
                continue;
            }
            let pm = allomorph.portmanteau().filter(|p| p.is_initialized());
            if pm.is_some_and(|p| !d.morphemes_remaining().starts_with(p.sequence())) {
                continue;
            }
            t.log().allomorph_matches(node, allomorph, true);

            let mut next = d.clone();
            let consumed = pm.map_or(1, |p| p.len());
            if let Err(c) = next.append(grammar, index, Arc::clone(allomorph), None, consumed) {
                t.report(index, c);
                continue;
            }
            match pm {
                Some(pm) => {
                    for &covered in &pm.nodes()[1..] {
                        next.parsing_mut()
                            .append_continuation(grammar, covered, Arc::clone(allomorph));
                    }
                    fused.extend(t.proceed(pm.last_node().unwrap_or(index), &next));
                }
                None => {
                    if !t.done(&plain) {
                        plain.extend(t.proceed(index, &next));
                    }
                }
            }
        }
        if fused.is_empty() { plain } else { fused }
    }

    fn using_stem_list(t: &Traversal<'_>, index: NodeIndex, list: StemListIndex, d: &Self) -> Vec<Self> {
        let grammar = t.grammar();
        let node = grammar.node(index);
        if d.morphemes_remaining().peek() != Some(node.label()) {
            return Vec::new();
        }
        let ws = d.writing_system();
        let candidates: Vec<Arc<LexicalStem>> = match d.stems_remaining().peek() {
            Some(required) => vec![Arc::clone(required)],
            None => grammar.stem_list(list).stems().cloned().collect(),
        };

        let mut found = Vec::new();
        for stem in candidates {
            for allomorph in stem.allomorphs() {
                if t.done(&found) {
                    return found;
                }
                if !allomorph.use_in_generations() || !allomorph.has_form(ws) {
                    continue;
                }
                if let Some(c) = d.failing_match_condition(
                    grammar,
                    index,
                    allomorph,
                    Some(d.morphemes_remaining()),
                ) {
                    t.log().allomorph_matches(node, allomorph, false);
                    t.report(index, c);
                    continue;
                }
                t.log().allomorph_matches(node, allomorph, true);
                let mut next = d.clone();
                match next.append(grammar, index, Arc::clone(allomorph), Some(Arc::clone(&stem)), 1) {
                    Ok(()) => found.extend(t.proceed(index, &next)),
                    Err(c) => t.report(index, c),
                }
            }
        }
        found
    }

    fn merge_alternatives(alternatives: Vec<Self>) -> Vec<Self> {
        alternatives
    }
}
