//! Matcher configuration.
//!
//! Typed configuration with a bon builder and environment fallbacks.

use bon::bon;

/// Limits and policy for [`Matcher`](crate::pattern::Matcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Binding alternatives tried per head candidate before giving up on it.
    pub max_alternatives: usize,
    /// Stop after this many mappings per `match_all` call.
    pub max_matches: Option<usize>,
    /// Keep mappings that share matched nodes with an earlier mapping.
    /// Overlap is resolved by the rewrite step when this is on.
    pub allow_overlap: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { max_alternatives: 4096, max_matches: None, allow_overlap: true }
    }
}

#[bon]
impl MatcherConfig {
    /// Create a matcher configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = 4096)] max_alternatives: usize,
        max_matches: Option<usize>,
        #[builder(default = true)] allow_overlap: bool,
    ) -> Self {
        Self { max_alternatives, max_matches, allow_overlap }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_MATCH_BUDGET` - Alternatives per head candidate (default: 4096)
    /// * `KILN_MAX_MATCHES` - Cap on mappings per call (default: unlimited)
    /// * `KILN_NO_OVERLAP` - Drop mappings overlapping an earlier one if set
    pub fn from_env() -> Self {
        let max_alternatives = std::env::var("KILN_MATCH_BUDGET").ok().and_then(|s| s.parse().ok()).unwrap_or(4096);
        let max_matches = std::env::var("KILN_MAX_MATCHES").ok().and_then(|s| s.parse().ok());
        let allow_overlap = std::env::var("KILN_NO_OVERLAP").is_err();

        Self { max_alternatives, max_matches, allow_overlap }
    }
}
