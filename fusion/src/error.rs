//! Error types for pass execution.

use snafu::Snafu;

/// Result type for pass driver operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A fatal failure while running a fusion pass.
///
/// Non-fatal IR errors (semantic guard failures, fusions refused because
/// they would create a cycle) never surface here; the driver counts them as
/// rejections.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The pass declared a malformed pattern.
    #[snafu(display("pass {pass}: invalid pattern: {source}"))]
    PatternDefinition { pass: String, source: kiln_ir::Error },

    /// A rewrite hit an invariant violation. The graph may be partially
    /// rewritten and should be discarded.
    #[snafu(display("pass {pass}: rewrite failed: {source}"))]
    Rewrite { pass: String, source: kiln_ir::Error },

    /// The graph failed verification after the pass.
    #[snafu(display("pass {pass}: graph failed verification: {source}"))]
    Verification { pass: String, source: kiln_ir::Error },
}

impl Error {
    pub fn pass(&self) -> &str {
        match self {
            Self::PatternDefinition { pass, .. } | Self::Rewrite { pass, .. } | Self::Verification { pass, .. } => pass,
        }
    }

    /// The underlying IR error.
    pub fn ir(&self) -> &kiln_ir::Error {
        match self {
            Self::PatternDefinition { source, .. } | Self::Rewrite { source, .. } | Self::Verification { source, .. } => {
                source
            }
        }
    }
}
