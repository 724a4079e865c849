// Forms: a piece of text in a particular writing system.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::writing_system::WritingSystem;

/// A string in a writing system, optionally carrying a storage id.
///
/// Equality and hashing consider the writing system and text only; the id is
/// bookkeeping for stem storage back ends. The text is shared, so cloning a
/// form (as every parsing branch does with its input) does not copy it.
#[derive(Clone)]
pub struct Form {
    writing_system: WritingSystem,
    text: Arc<str>,
    id: Option<i64>,
}

impl Form {
    pub fn new(writing_system: WritingSystem, text: impl AsRef<str>) -> Self {
        Self {
            writing_system,
            text: Arc::from(text.as_ref()),
            id: None,
        }
    }

    pub fn with_id(writing_system: WritingSystem, text: impl AsRef<str>, id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(writing_system, text)
        }
    }

    /// An empty form in the given writing system.
    pub fn empty(writing_system: WritingSystem) -> Self {
        Self::new(writing_system, "")
    }

    pub fn writing_system(&self) -> &WritingSystem {
        &self.writing_system
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    /// Length of the text in bytes. Parsing positions are byte offsets.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Return a form in the same writing system with different text.
    pub fn with_text(&self, text: impl AsRef<str>) -> Self {
        Self::new(self.writing_system.clone(), text)
    }
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        self.writing_system == other.writing_system && self.text == other.text
    }
}

impl Eq for Form {}

impl Hash for Form {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
        self.writing_system.hash(state);
    }
}

impl PartialOrd for Form {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Form {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.writing_system
            .cmp(&other.writing_system)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", &*self.text, self.writing_system)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_id() {
        let en = WritingSystem::new("en");
        let a = Form::with_id(en.clone(), "katit", 4);
        let b = Form::new(en, "katit");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn writing_system_participates_in_equality() {
        let a = Form::new(WritingSystem::new("en"), "ab");
        let b = Form::new(WritingSystem::new("ipa"), "ab");
        assert_ne!(a, b);
    }

    #[test]
    fn length_is_in_bytes() {
        let f = Form::new(WritingSystem::new("ar"), "\u{0643}\u{062a}");
        assert_eq!(f.len(), 4);
        assert!(!f.is_empty());
        assert!(Form::empty(WritingSystem::null()).is_empty());
    }

    #[test]
    fn with_text_keeps_writing_system() {
        let f = Form::new(WritingSystem::new("en"), "a").with_text("b");
        assert_eq!(f.writing_system().abbreviation(), "en");
        assert_eq!(f.text(), "b");
    }
}
