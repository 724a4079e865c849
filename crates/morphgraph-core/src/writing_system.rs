// Writing systems: interned script identity with display metadata.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Direction in which text of a writing system is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug)]
struct Inner {
    abbreviation: String,
    name: String,
    font_family: String,
    direction: TextDirection,
    keyboard: Option<String>,
}

/// A writing system (script or orthography) that forms are expressed in.
///
/// Identity is the abbreviation alone: two writing systems with the same
/// abbreviation compare and hash equal regardless of their display metadata.
/// Clones share one allocation, so passing writing systems around is cheap.
///
/// The "null" writing system has an empty abbreviation.
#[derive(Clone)]
pub struct WritingSystem(Arc<Inner>);

impl WritingSystem {
    /// Create a writing system with only an abbreviation.
    pub fn new(abbreviation: impl Into<String>) -> Self {
        let abbreviation = abbreviation.into();
        Self::with_metadata(abbreviation.clone(), abbreviation, "", TextDirection::default())
    }

    /// Create a writing system with full display metadata.
    pub fn with_metadata(
        abbreviation: impl Into<String>,
        name: impl Into<String>,
        font_family: impl Into<String>,
        direction: TextDirection,
    ) -> Self {
        Self(Arc::new(Inner {
            abbreviation: abbreviation.into(),
            name: name.into(),
            font_family: font_family.into(),
            direction,
            keyboard: None,
        }))
    }

    /// The null writing system (empty abbreviation).
    pub fn null() -> Self {
        Self::new("")
    }

    /// Return a copy of this writing system carrying a keyboard hint.
    pub fn with_keyboard(&self, keyboard: impl Into<String>) -> Self {
        Self(Arc::new(Inner {
            abbreviation: self.0.abbreviation.clone(),
            name: self.0.name.clone(),
            font_family: self.0.font_family.clone(),
            direction: self.0.direction,
            keyboard: Some(keyboard.into()),
        }))
    }

    pub fn abbreviation(&self) -> &str {
        &self.0.abbreviation
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn font_family(&self) -> &str {
        &self.0.font_family
    }

    pub fn direction(&self) -> TextDirection {
        self.0.direction
    }

    pub fn keyboard(&self) -> Option<&str> {
        self.0.keyboard.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.0.abbreviation.is_empty()
    }
}

impl Default for WritingSystem {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for WritingSystem {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.abbreviation == other.0.abbreviation
    }
}

impl Eq for WritingSystem {}

impl Hash for WritingSystem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.abbreviation.hash(state);
    }
}

impl PartialOrd for WritingSystem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WritingSystem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.abbreviation.cmp(&other.0.abbreviation)
    }
}

impl fmt::Debug for WritingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WritingSystem({:?})", self.0.abbreviation)
    }
}

impl fmt::Display for WritingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.abbreviation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_metadata() {
        let a = WritingSystem::with_metadata("en", "English", "Charis", TextDirection::LeftToRight);
        let b = WritingSystem::with_metadata("en", "Anglais", "", TextDirection::RightToLeft);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn different_abbreviations_differ() {
        assert_ne!(WritingSystem::new("en"), WritingSystem::new("ar"));
    }

    #[test]
    fn null_writing_system() {
        assert!(WritingSystem::null().is_null());
        assert!(WritingSystem::default().is_null());
        assert!(!WritingSystem::new("en").is_null());
    }

    #[test]
    fn keyboard_hint_keeps_identity() {
        let ws = WritingSystem::new("syr");
        let keyed = ws.with_keyboard("syriac-phonetic");
        assert_eq!(ws, keyed);
        assert_eq!(keyed.keyboard(), Some("syriac-phonetic"));
        assert_eq!(ws.keyboard(), None);
    }
}
