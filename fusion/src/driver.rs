//! Pass driver.
//!
//! # Algorithm
//!
//! 1. Build the pass's patterns. A construction error aborts the run.
//! 2. For each pattern in order, enumerate mappings on the current graph.
//! 3. Before each `fuse`, refuse the mapping if any node it binds has been
//!    removed, if a matched node was consumed by an earlier rewrite in this
//!    run, or if the mapping no longer passes the pattern's structural check.
//! 4. Fold non-fatal errors into rejections; propagate fatal ones.
//! 5. Optionally verify the graph once the pass changed it.

use std::fmt;

use snafu::ResultExt;
use tracing::{debug, warn};

use kiln_ir::{Graph, Mapping, Matcher, Mismatch, NodeId, Pattern};

use crate::config::FusionConfig;
use crate::context::PassContext;
use crate::error::*;
use crate::pass::{FuseOutcome, FusionPass};

/// Counters for one pass invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pass: String,
    /// The pass was disabled by configuration and did not run.
    pub skipped: bool,
    /// Mappings returned by the matcher, across all patterns.
    pub matched: usize,
    /// Mappings that `fuse` turned into a rewrite.
    pub fused: usize,
    /// Mappings declined by `fuse`, including non-fatal errors.
    pub rejected: usize,
    /// Mappings refused because an earlier rewrite invalidated them.
    pub conflicts: usize,
    /// Why each refused mapping was refused, in refusal order.
    pub refusals: Vec<Refusal>,
    /// Nodes created by successful rewrites.
    pub created: Vec<NodeId>,
}

/// Why the driver refused to hand a mapping to `fuse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// A bound node was removed by an earlier rewrite.
    Stale,
    /// A matched node was consumed by an earlier rewrite in this run.
    Consumed,
    /// The mapping no longer satisfies its pattern.
    Mismatch(Mismatch),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => f.write_str("mapping refers to a removed node"),
            Self::Consumed => f.write_str("matched node already fused in this run"),
            Self::Mismatch(mismatch) => write!(f, "mapping no longer matches: {mismatch}"),
        }
    }
}

fn refusal<S>(graph: &Graph, pattern: &Pattern, mapping: &Mapping, ctx: &PassContext<S>) -> Option<Refusal> {
    if !mapping.is_live(graph) {
        return Some(Refusal::Stale);
    }
    if ctx.conflicts(mapping) {
        return Some(Refusal::Consumed);
    }
    pattern.check(graph, mapping).err().map(Refusal::Mismatch)
}

impl PassReport {
    pub fn changed(&self) -> bool {
        self.fused > 0
    }
}

/// Runs `pass` once over `graph`.
pub fn run_pass<P: FusionPass>(graph: &mut Graph, pass: &P, config: &FusionConfig) -> Result<PassReport> {
    run_pass_with_state(graph, pass, config).map(|(report, _)| report)
}

/// Like [`run_pass`], also returning the pass's final per-invocation state.
#[tracing::instrument(skip_all, fields(pass = pass.name(), graph = graph.name()))]
pub fn run_pass_with_state<P: FusionPass>(
    graph: &mut Graph,
    pass: &P,
    config: &FusionConfig,
) -> Result<(PassReport, P::State)> {
    let name = pass.name();
    let mut report = PassReport { pass: name.to_string(), ..Default::default() };
    let mut ctx = PassContext::<P::State>::new(name);

    if !config.is_enabled(name) {
        debug!("pass disabled");
        report.skipped = true;
        return Ok((report, ctx.into_state()));
    }

    let patterns = pass.define_patterns().context(PatternDefinitionSnafu { pass: name })?;
    let matcher = Matcher::new(config.matcher.clone());

    for pattern in &patterns {
        let mappings = matcher.match_all(graph, pattern);
        report.matched += mappings.len();

        for mapping in mappings {
            if let Some(reason) = refusal(graph, pattern, &mapping, &ctx) {
                warn!(pattern = pattern.name(), head = ?mapping.head(), %reason, "fusion refused");
                report.conflicts += 1;
                report.refusals.push(reason);
                continue;
            }

            match pass.fuse(graph, &mapping, &mut ctx) {
                Ok(FuseOutcome::Changed { fused }) => {
                    ctx.consume(mapping.matched_nodes());
                    report.fused += 1;
                    report.created.extend(fused);
                }
                Ok(FuseOutcome::NotChanged) => report.rejected += 1,
                Err(source) if !source.is_fatal() => {
                    debug!(pattern = pattern.name(), head = ?mapping.head(), %source, "fusion rejected");
                    report.rejected += 1;
                }
                Err(source) => return Err(source).context(RewriteSnafu { pass: name }),
            }
        }
    }

    if config.verify_graph && report.changed() {
        graph.verify().context(VerificationSnafu { pass: name })?;
    }

    debug!(
        matched = report.matched,
        fused = report.fused,
        rejected = report.rejected,
        conflicts = report.conflicts,
        "pass finished"
    );
    Ok((report, ctx.into_state()))
}
