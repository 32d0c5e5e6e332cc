//! Fusion pass driver.
//!
//! A fusion pass declares its patterns, and the driver finds every mapping,
//! filters out mappings invalidated by earlier rewrites in the same run, and
//! hands the rest to the pass's `fuse` hook together with a per-invocation
//! [`PassContext`].
//!
//! ```ignore
//! let report = run_pass(&mut graph, &ConvEltwisePass, &FusionConfig::from_env())?;
//! if report.changed() { /* ... */ }
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod pass;


pub use config::FusionConfig;
pub use context::PassContext;
pub use driver::{PassReport, Refusal, run_pass, run_pass_with_state};
pub use error::{Error, Result};
pub use pass::{FuseOutcome, FusionPass};
