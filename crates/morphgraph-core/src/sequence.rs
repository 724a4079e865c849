// Ordered morpheme-label sequences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;
use crate::ids::MorphemeLabel;

/// An ordered list of morpheme labels: either a generation target or the
/// derivation path a parse achieved.
///
/// Serializes as bracketed labels, e.g. `[Stem][-ing]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MorphemeSequence {
    labels: Vec<MorphemeLabel>,
}

impl MorphemeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &[MorphemeLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn push(&mut self, label: MorphemeLabel) {
        self.labels.push(label);
    }

    pub fn first(&self) -> Option<&MorphemeLabel> {
        self.labels.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MorphemeLabel> {
        self.labels.iter()
    }

    /// Position of the first contiguous occurrence of `other`, if any.
    ///
    /// The empty sequence occurs at position 0 of every sequence.
    pub fn find(&self, other: &MorphemeSequence) -> Option<usize> {
        find_run(&self.labels, &other.labels)
    }

    /// Whether `other` occurs in this sequence as a contiguous run.
    pub fn contains(&self, other: &MorphemeSequence) -> bool {
        self.find(other).is_some()
    }

    pub fn starts_with(&self, other: &MorphemeSequence) -> bool {
        self.labels.starts_with(&other.labels)
    }

    /// Replace every non-overlapping occurrence of `from` with `to`,
    /// scanning left to right.
    pub fn replace(&self, from: &MorphemeSequence, to: &MorphemeSequence) -> MorphemeSequence {
        if from.is_empty() {
            return self.clone();
        }
        let mut labels = Vec::with_capacity(self.labels.len());
        let mut i = 0;
        while i < self.labels.len() {
            if self.labels[i..].starts_with(&from.labels) {
                labels.extend(to.labels.iter().cloned());
                i += from.labels.len();
            } else {
                labels.push(self.labels[i].clone());
                i += 1;
            }
        }
        MorphemeSequence { labels }
    }
}

/// Find `needle` as a contiguous run inside `haystack`.
pub fn find_run<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl From<Vec<MorphemeLabel>> for MorphemeSequence {
    fn from(labels: Vec<MorphemeLabel>) -> Self {
        Self { labels }
    }
}

impl FromIterator<MorphemeLabel> for MorphemeSequence {
    fn from_iter<I: IntoIterator<Item = MorphemeLabel>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MorphemeSequence {
    type Item = &'a MorphemeLabel;
    type IntoIter = std::slice::Iter<'a, MorphemeLabel>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl fmt::Display for MorphemeSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

impl FromStr for MorphemeSequence {
    type Err = CoreError;

    /// Parse the bracketed form `[a][b][c]`. Whitespace between brackets is
    /// ignored; labels may not contain `[` or `]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut labels = Vec::new();
        let mut rest = s.trim();
        while !rest.is_empty() {
            let Some(body) = rest.strip_prefix('[') else {
                return Err(CoreError::MalformedSequence(s.to_string()));
            };
            let Some(close) = body.find(']') else {
                return Err(CoreError::MalformedSequence(s.to_string()));
            };
            let label = &body[..close];
            if label.contains('[') {
                return Err(CoreError::MalformedSequence(s.to_string()));
            }
            labels.push(MorphemeLabel::new(label));
            rest = body[close + 1..].trim_start();
        }
        Ok(Self { labels })
    }
}

impl Serialize for MorphemeSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MorphemeSequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
