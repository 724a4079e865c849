// Input normalization applied to raw text before parsing.

use std::borrow::Cow;
use std::fmt;

use regex::Regex;

use crate::CoreError;
use crate::form::Form;

/// One regex substitution step.
#[derive(Clone)]
pub struct Replacement {
    pattern: Regex,
    replacement: String,
}

impl Replacement {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, CoreError> {
        let compiled = Regex::new(pattern).map_err(|source| CoreError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.pattern.as_str(), self.replacement)
    }
}

/// A pure string-to-string function applied to input in one writing system.
///
/// Normalizers are configured per writing system on the morphology and run
/// once on the whole input before any model sees it.
#[derive(Debug, Clone, Default)]
pub enum Normalizer {
    /// Leave the text unchanged.
    #[default]
    Identity,
    /// Unicode lowercase.
    Lowercase,
    /// Apply each regex replacement in order, each over the whole text.
    Replacements(Vec<Replacement>),
    /// Apply each normalizer in order.
    Chain(Vec<Normalizer>),
}

impl Normalizer {
    /// Build a replacement normalizer from `(pattern, replacement)` pairs.
    pub fn replacements<P, R>(pairs: impl IntoIterator<Item = (P, R)>) -> Result<Self, CoreError>
    where
        P: AsRef<str>,
        R: Into<String>,
    {
        let replacements = pairs
            .into_iter()
            .map(|(p, r)| Replacement::new(p.as_ref(), r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Normalizer::Replacements(replacements))
    }

    pub fn normalize(&self, text: &str) -> String {
        match self {
            Normalizer::Identity => text.to_string(),
            Normalizer::Lowercase => text.to_lowercase(),
            Normalizer::Replacements(replacements) => {
                let mut current = text.to_string();
                for r in replacements {
                    if let Cow::Owned(changed) = r.apply(&current) {
                        current = changed;
                    }
                }
                current
            }
            Normalizer::Chain(steps) => steps
                .iter()
                .fold(text.to_string(), |acc, step| step.normalize(&acc)),
        }
    }

    /// Normalize a form, keeping its writing system and id.
    pub fn normalize_form(&self, form: &Form) -> Form {
        let mut out = form.with_text(self.normalize(form.text()));
        out.set_id(form.id());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WritingSystem;
    use proptest::prelude::*;

    #[test]
    fn identity_leaves_text_alone() {
        assert_eq!(Normalizer::Identity.normalize("KaTit"), "KaTit");
    }

    #[test]
    fn lowercase_handles_non_ascii() {
        assert_eq!(Normalizer::Lowercase.normalize("ÄITI"), "äiti");
    }

    #[test]
    fn replacements_apply_in_order() {
        let n = Normalizer::replacements([("ſ", "s"), ("s+", "s")]).unwrap();
        assert_eq!(n.normalize("maſſs"), "mas");
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Normalizer::replacements([("(", "")]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPattern { .. }));
    }

    #[test]
    fn chain_composes() {
        let n = Normalizer::Chain(vec![
            Normalizer::Lowercase,
            Normalizer::replacements([("-", "")]).unwrap(),
        ]);
        assert_eq!(n.normalize("Kat-It"), "katit");
    }

    #[test]
    fn normalize_form_keeps_id() {
        let f = Form::with_id(WritingSystem::new("en"), "ABC", 9);
        let n = Normalizer::Lowercase.normalize_form(&f);
        assert_eq!(n.text(), "abc");
        assert_eq!(n.id(), Some(9));
    }

    proptest! {
        #[test]
        fn lowercase_is_idempotent(s in "[a-zA-Z\u{00C0}-\u{00D6}\u{00D8}-\u{00F6} ]{0,24}") {
            let once = Normalizer::Lowercase.normalize(&s);
            prop_assert_eq!(Normalizer::Lowercase.normalize(&once), once.clone());
        }

        #[test]
        fn collapsing_replacement_is_idempotent(s in "[a-z ]{0,24}") {
            let n = Normalizer::replacements([(" +", " ")]).unwrap();
            let once = n.normalize(&s);
            prop_assert_eq!(n.normalize(&once), once.clone());
        }
    }
}
