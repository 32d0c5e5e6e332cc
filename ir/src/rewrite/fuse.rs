//! Region fusion: collapse a node set into a single node.

use std::collections::{BTreeSet, HashSet, VecDeque};

use itertools::Itertools;
use snafu::ensure;
use tracing::debug;

use crate::attr::Attrs;
use crate::error::*;
use crate::graph::Graph;
use crate::node::{EdgeRef, NodeId, OutputAnchor};
use crate::types::{OpType, TensorDesc};

impl Graph {
    /// Replaces `region` with one node of type `op`.
    ///
    /// Producers outside the region become the fused node's inputs,
    /// deduplicated and ordered by consuming node id then input index.
    /// Region outputs with at least one consumer outside the region become
    /// the fused node's outputs in the same order; only those outside
    /// consumers are moved. Control dependencies crossing the region boundary
    /// are carried over to the fused node.
    ///
    /// The region must be convex: if a path leaves the region and re-enters
    /// it, fusing would create a cycle and [`Error::CycleDetected`] is
    /// returned before anything is mutated.
    pub fn fuse_region(
        &mut self,
        region: impl IntoIterator<Item = NodeId>,
        op: impl Into<OpType>,
        attrs: Attrs,
    ) -> Result<NodeId> {
        let region: BTreeSet<NodeId> = region.into_iter().collect();
        ensure!(!region.is_empty(), EmptyRegionSnafu);
        for &id in &region {
            let node = self.node(id)?;
            ensure!(
                !node.is_boundary(),
                InvalidNodeSnafu { reason: format!("boundary node {} cannot be fused", node.name()) }
            );
        }
        self.check_convex(&region)?;

        let order: Vec<NodeId> = self.topological_order()?.into_iter().filter(|id| region.contains(id)).collect();

        let mut inputs: Vec<(OutputAnchor, TensorDesc)> = Vec::new();
        let mut outputs: Vec<(OutputAnchor, TensorDesc)> = Vec::new();
        let mut control_in = BTreeSet::new();
        let mut control_out = BTreeSet::new();
        for &id in &region {
            let node = self.node(id)?;
            for (index, from) in node.inputs().iter().enumerate() {
                let Some(from) = *from else { continue };
                if !region.contains(&from.node) && !inputs.iter().any(|(seen, _)| *seen == from) {
                    inputs.push((from, node.input_descs()[index].clone()));
                }
            }
            for (index, consumers) in node.outputs().iter().enumerate() {
                if consumers.iter().any(|to| !region.contains(&to.node)) {
                    outputs.push((OutputAnchor::new(id, index), node.output_descs()[index].clone()));
                }
            }
            control_in.extend(node.control_predecessors().iter().copied().filter(|n| !region.contains(n)));
            control_out.extend(node.control_successors().iter().copied().filter(|n| !region.contains(n)));
        }

        let name = order.iter().filter_map(|&id| self.get(id)).map(|node| node.name()).join("_");

        let fused = self
            .add_node()
            .op(op)
            .inputs(inputs.iter().map(|(_, desc)| desc.clone()).collect())
            .outputs(outputs.iter().map(|(_, desc)| desc.clone()).collect())
            .attrs(attrs)
            .name(name)
            .call()?;

        for (index, (from, _)) in inputs.iter().enumerate() {
            self.link(from.node, from.index, fused, index)?;
        }
        for (index, (old, _)) in outputs.iter().enumerate() {
            let external: Vec<_> =
                self.node(old.node)?.consumers(old.index).iter().copied().filter(|to| !region.contains(&to.node)).collect();
            for to in external {
                self.unlink(EdgeRef::new(*old, to));
                self.link(fused, index, to.node, to.index)?;
            }
        }
        for pred in control_in {
            self.link_control(pred, fused)?;
        }
        for succ in control_out {
            self.link_control(fused, succ)?;
        }

        for &id in order.iter().rev() {
            self.isolate(id)?.unlink_all().remove()?;
        }

        debug!(
            fused = %fused,
            region = region.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "region fused"
        );
        Ok(fused)
    }

    /// Fails if any path leaving `region` leads back into it.
    fn check_convex(&self, region: &BTreeSet<NodeId>) -> Result<()> {
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        for &id in region {
            let node = self.node(id)?;
            for next in self.successors(node).filter(|n| !region.contains(n)) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        while let Some(id) = queue.pop_front() {
            let node = self.node(id)?;
            for next in self.successors(node) {
                ensure!(!region.contains(&next), CycleDetectedSnafu { region: region.len(), node: id });
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(())
    }
}
