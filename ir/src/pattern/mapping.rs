//! Match results.

use std::collections::BTreeSet;

use smallvec::SmallVec;
use snafu::OptionExt;

use super::descriptor::{Pattern, SlotId};
use crate::error::*;
use crate::graph::Graph;
use crate::node::NodeId;

/// Nodes bound to one slot, in node id order.
pub type Binding = SmallVec<[NodeId; 4]>;

/// Slot-to-nodes table produced by one successful match.
///
/// A mapping is a snapshot: any rewrite that removes one of its nodes makes
/// it stale, which [`Mapping::is_live`] detects through the generation check
/// on [`NodeId`].
#[derive(Debug, Clone)]
pub struct Mapping {
    pattern: Pattern,
    bindings: Vec<Binding>,
}

impl Mapping {
    pub(crate) fn new(pattern: Pattern, bindings: Vec<Binding>) -> Self {
        Self { pattern, bindings }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The node the match was anchored on.
    pub fn head(&self) -> Option<NodeId> {
        self.bindings.get(self.pattern.head().index()).and_then(|b| b.first().copied())
    }

    pub fn binding(&self, slot: SlotId) -> &[NodeId] {
        self.bindings.get(slot.index()).map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Every non-sentinel bound node. This is the set a fusion absorbs.
    pub fn matched_nodes(&self) -> BTreeSet<NodeId> {
        self.pattern
            .slots()
            .iter()
            .zip(&self.bindings)
            .filter(|(slot, _)| !slot.is_sentinel())
            .flat_map(|(_, binding)| binding.iter().copied())
            .collect()
    }

    /// Bindings of one slot; empty for an unknown name.
    pub fn matched_nodes_by_slot(&self, slot: &str) -> &[NodeId] {
        self.pattern.slot_id(slot).map(|id| self.binding(id)).unwrap_or(&[])
    }

    /// `(slot name, bindings)` in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.pattern.slots().iter().zip(&self.bindings).map(|(slot, binding)| (slot.name.as_str(), binding.as_slice()))
    }

    /// Every bound node, sentinel slots included.
    pub fn all_nodes(&self) -> BTreeSet<NodeId> {
        self.bindings.iter().flatten().copied().collect()
    }

    /// True while every bound node still exists in `graph`.
    pub fn is_live(&self, graph: &Graph) -> bool {
        self.bindings.iter().flatten().all(|&id| graph.contains(id))
    }

    /// The single node bound to `slot`, or `None` if it bound zero or several.
    pub fn single(&self, slot: &str) -> Option<NodeId> {
        match self.matched_nodes_by_slot(slot) {
            [node] => Some(*node),
            _ => None,
        }
    }

    /// Like [`Mapping::single`], but a failure is a semantic rejection.
    pub fn require_single(&self, slot: &str) -> Result<NodeId> {
        let bound = self.matched_nodes_by_slot(slot);
        self.single(slot).context(SemanticGuardFailedSnafu {
            slot,
            expected: vec!["exactly one node".to_string()],
            found: format!("{} node(s)", bound.len()),
        })
    }

    /// Concrete operator re-check on a single-node slot.
    ///
    /// Pattern slots filter on coarse categories; a pass calls this before
    /// mutating anything to confirm the bound node is exactly one of `ops`.
    pub fn require_op(&self, graph: &Graph, slot: &str, ops: &[&str]) -> Result<NodeId> {
        let id = self.require_single(slot)?;
        let node = graph.node(id)?;
        if ops.iter().any(|op| node.op().is(op)) {
            return Ok(id);
        }
        SemanticGuardFailedSnafu {
            slot,
            expected: ops.iter().map(|op| op.to_string()).collect::<Vec<_>>(),
            found: node.op_name(),
        }
        .fail()
    }
}
