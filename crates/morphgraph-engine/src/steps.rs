// Persistent step list.
//
// Every search branch copies its parse state; the step list is a cons list
// behind `Arc` so a copy is one refcount bump and siblings share their common
// prefix.

use std::sync::Arc;

use morphgraph_core::MorphemeLabel;

use crate::allomorph::Allomorph;
use crate::index::NodeIndex;
use crate::stem::LexicalStem;

/// One appended allomorph and the node it was appended at.
#[derive(Debug, Clone)]
pub struct ParsingStep {
    pub node: NodeIndex,
    pub label: MorphemeLabel,
    pub allomorph: Arc<Allomorph>,
    pub stem: Option<Arc<LexicalStem>>,
    pub is_stem: bool,
    /// Set on the extra steps a portmanteau allomorph fills in for the nodes
    /// it subsumes after its owner. They consume no text.
    pub continuation: bool,
}

#[derive(Debug)]
struct Cell {
    step: ParsingStep,
    prev: Option<Arc<Cell>>,
}

#[derive(Debug, Clone, Default)]
pub struct StepList {
    head: Option<Arc<Cell>>,
    len: usize,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ParsingStep) {
        let prev = self.head.take();
        self.head = Some(Arc::new(Cell { step, prev }));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&ParsingStep> {
        self.head.as_deref().map(|c| &c.step)
    }

    /// Newest first.
    pub fn iter_rev(&self) -> RevIter<'_> {
        RevIter {
            cell: self.head.as_deref(),
        }
    }

    /// Steps from `index` on, newest first. Borrows the chain.
    pub fn since(&self, index: usize) -> std::iter::Take<RevIter<'_>> {
        self.iter_rev().take(self.len.saturating_sub(index))
    }

    /// Oldest first. Buffers the chain, so the search walks `iter_rev` or
    /// `since` instead.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ParsingStep> + '_ {
        let steps: Vec<&ParsingStep> = self.iter_rev().collect();
        steps.into_iter().rev()
    }

    pub fn get(&self, index: usize) -> Option<&ParsingStep> {
        if index >= self.len {
            return None;
        }
        self.iter_rev().nth(self.len - 1 - index)
    }
}

impl Drop for StepList {
    // Unlink iteratively so dropping a long list cannot overflow the stack.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(cell) = next {
            match Arc::try_unwrap(cell) {
                Ok(mut cell) => next = cell.prev.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct RevIter<'a> {
    cell: Option<&'a Cell>,
}

impl<'a> Iterator for RevIter<'a> {
    type Item = &'a ParsingStep;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.cell?;
        self.cell = cell.prev.as_deref();
        Some(&cell.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(label: &str) -> ParsingStep {
        ParsingStep {
            node: NodeIndex(0),
            label: MorphemeLabel::new(label),
            allomorph: Arc::new(Allomorph::null()),
            stem: None,
            is_stem: false,
            continuation: false,
        }
    }

    fn labels<'a>(it: impl Iterator<Item = &'a ParsingStep>) -> Vec<&'a str> {
        it.map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn branches_share_prefix() {
        let mut base = StepList::new();
        base.push(step("a"));
        let mut left = base.clone();
        let mut right = base.clone();
        left.push(step("b"));
        right.push(step("c"));

        assert_eq!(labels(base.iter()), ["a"]);
        assert_eq!(labels(left.iter()), ["a", "b"]);
        assert_eq!(labels(right.iter_rev()), ["c", "a"]);
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn indexed_access() {
        let mut list = StepList::new();
        for l in ["a", "b", "c"] {
            list.push(step(l));
        }
        assert_eq!(list.get(0).map(|s| s.label.as_str()), Some("a"));
        assert_eq!(list.get(2).map(|s| s.label.as_str()), Some("c"));
        assert!(list.get(3).is_none());
        assert_eq!(list.last().map(|s| s.label.as_str()), Some("c"));
    }

    #[test]
    fn since_walks_the_tail_newest_first() {
        let mut list = StepList::new();
        for l in ["a", "b", "c", "d"] {
            list.push(step(l));
        }
        assert_eq!(labels(list.since(2)), ["d", "c"]);
        assert_eq!(labels(list.since(0)), ["d", "c", "b", "a"]);
        assert!(list.since(4).next().is_none());
        assert!(list.since(9).next().is_none());
    }

    #[test]
    fn long_lists_drop_without_recursion() {
        let mut list = StepList::new();
        for _ in 0..200_000 {
            list.push(step("x"));
        }
        drop(list);
    }
}
