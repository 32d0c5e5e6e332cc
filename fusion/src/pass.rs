//! The fusion pass contract.

use kiln_ir::{Graph, Mapping, NodeId, Pattern};

use crate::context::PassContext;

/// What a single `fuse` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuseOutcome {
    /// The graph was rewritten; `fused` lists the nodes the rewrite created.
    Changed { fused: Vec<NodeId> },
    /// The mapping was declined and the graph left untouched.
    NotChanged,
}

impl FuseOutcome {
    pub fn changed(fused: impl IntoIterator<Item = NodeId>) -> Self {
        Self::Changed { fused: fused.into_iter().collect() }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// A pattern-driven graph rewrite.
///
/// The driver calls [`define_patterns`](Self::define_patterns) once per run,
/// enumerates mappings for each pattern in order, and hands every mapping
/// that survived the overlap check to [`fuse`](Self::fuse).
///
/// `fuse` must re-check concrete operator types (for example with
/// [`Mapping::require_op`]) before mutating anything. Returning a non-fatal
/// error is equivalent to [`FuseOutcome::NotChanged`]; a fatal one aborts
/// the pass.
pub trait FusionPass {
    /// Per-invocation state, fresh for every run.
    type State: Default;

    fn name(&self) -> &str;

    fn define_patterns(&self) -> kiln_ir::Result<Vec<Pattern>>;

    fn fuse(
        &self,
        graph: &mut Graph,
        mapping: &Mapping,
        ctx: &mut PassContext<Self::State>,
    ) -> kiln_ir::Result<FuseOutcome>;
}
