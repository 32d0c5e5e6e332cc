//! Pass driver configuration.
//!
//! Typed configuration with bon builders and environment fallbacks.

use bon::bon;

use kiln_ir::MatcherConfig;

/// Configuration shared by every pass run through [`run_pass`](crate::run_pass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionConfig {
    /// Master switch. When off, every pass is skipped.
    pub enabled: bool,
    /// Pass names to skip.
    pub disabled_passes: Vec<String>,
    /// Run `Graph::verify` after every pass that changed the graph.
    pub verify_graph: bool,
    pub matcher: MatcherConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { enabled: true, disabled_passes: Vec::new(), verify_graph: true, matcher: MatcherConfig::default() }
    }
}

#[bon]
impl FusionConfig {
    /// Create a fusion configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = true)] enabled: bool,
        #[builder(default)] disabled_passes: Vec<String>,
        #[builder(default = true)] verify_graph: bool,
        #[builder(default)] matcher: MatcherConfig,
    ) -> Self {
        Self { enabled, disabled_passes, verify_graph, matcher }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_NOFUSE` - Disable all fusion passes if set
    /// * `KILN_DISABLED_PASSES` - Comma-separated pass names to skip
    /// * `KILN_VERIFY_GRAPH` - `0` skips post-pass verification (default: on)
    ///
    /// Matcher settings come from [`MatcherConfig::from_env`].
    pub fn from_env() -> Self {
        let enabled = std::env::var("KILN_NOFUSE").is_err();
        let disabled_passes = std::env::var("KILN_DISABLED_PASSES")
            .map(|list| list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        let verify_graph = std::env::var("KILN_VERIFY_GRAPH").map(|v| v != "0").unwrap_or(true);

        Self { enabled, disabled_passes, verify_graph, matcher: MatcherConfig::from_env() }
    }

    /// Whether the pass called `name` should run.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled && !self.disabled_passes.iter().any(|pass| pass == name)
    }
}
