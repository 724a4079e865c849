// Traversal configuration, threaded explicitly through every search call.

/// Default number of times a single jump node may be traversed per derivation.
pub const MAXIMUM_JUMPS: u32 = 1;

/// Direction of a traversal. Constraints may declare themselves inert for
/// one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Parsing,
    Generation,
}

/// Per-call parse flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseFlags {
    /// Stop the search at the first completed result.
    pub only_one_result: bool,
    /// Let stem-list nodes hypothesize unknown stems from the input.
    pub guess_stem: bool,
}

impl ParseFlags {
    pub fn only_one() -> Self {
        Self {
            only_one_result: true,
            ..Self::default()
        }
    }

    pub fn guessing() -> Self {
        Self {
            guess_stem: true,
            ..Self::default()
        }
    }
}

/// Settings read deep inside the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Maximum traversals of one jump node within a single derivation.
    pub max_jumps: u32,
    pub only_one_result: bool,
    pub guess_stem: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_jumps: MAXIMUM_JUMPS,
            only_one_result: false,
            guess_stem: false,
        }
    }
}

impl TraversalConfig {
    /// Overlay per-call flags on this configuration.
    pub fn with_flags(&self, flags: ParseFlags) -> Self {
        Self {
            max_jumps: self.max_jumps,
            only_one_result: self.only_one_result || flags.only_one_result,
            guess_stem: self.guess_stem || flags.guess_stem,
        }
    }

    pub fn with_max_jumps(mut self, max_jumps: u32) -> Self {
        self.max_jumps = max_jumps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_jump_budget_is_one() {
        assert_eq!(TraversalConfig::default().max_jumps, 1);
    }

    #[test]
    fn flags_overlay_without_clearing() {
        let base = TraversalConfig {
            only_one_result: true,
            ..TraversalConfig::default()
        };
        let merged = base.with_flags(ParseFlags::guessing());
        assert!(merged.only_one_result);
        assert!(merged.guess_stem);
        assert_eq!(merged.max_jumps, MAXIMUM_JUMPS);
    }

    #[test]
    fn max_jumps_override() {
        assert_eq!(TraversalConfig::default().with_max_jumps(3).max_jumps, 3);
    }
}
