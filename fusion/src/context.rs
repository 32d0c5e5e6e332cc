//! Per-invocation pass context.

use std::collections::HashSet;

use kiln_ir::{Mapping, NodeId};

/// State threaded through every `fuse` call of one pass invocation.
///
/// Holds the nodes already consumed by earlier rewrites, a name generator
/// for synthesized nodes and subgraphs, and the pass's own typed state. A
/// fresh context is created for each [`run_pass`](crate::run_pass) call, so
/// nothing leaks between invocations.
#[derive(Debug)]
pub struct PassContext<S> {
    pass: String,
    consumed: HashSet<NodeId>,
    names: usize,
    state: S,
}

impl<S: Default> PassContext<S> {
    pub fn new(pass: impl Into<String>) -> Self {
        Self { pass: pass.into(), consumed: HashSet::new(), names: 0, state: S::default() }
    }
}

impl<S> PassContext<S> {
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Unique name for a synthesized node or subgraph: `{pass}/{base}_{n}`.
    pub fn fused_name(&mut self, base: &str) -> String {
        let name = format!("{}/{base}_{}", self.pass, self.names);
        self.names += 1;
        name
    }

    /// Marks nodes as absorbed by a rewrite.
    pub fn consume(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.consumed.extend(nodes);
    }

    pub fn is_consumed(&self, node: NodeId) -> bool {
        self.consumed.contains(&node)
    }

    /// True if any matched node of `mapping` was consumed earlier.
    pub fn conflicts(&self, mapping: &Mapping) -> bool {
        mapping.matched_nodes().iter().any(|id| self.consumed.contains(id))
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}
