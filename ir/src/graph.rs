//! Owned dataflow graph.
//!
//! A [`Graph`] owns every node and edge in it; nothing is shared with other
//! graphs. External inputs are `Data` nodes (no inputs, one output) and the
//! external outputs are the inputs of a single `NetOutput` node. Nested graphs
//! attached to control-flow nodes use the same boundary convention, which is
//! what lets their signature be checked positionally.
//!
//! Mutation primitives live in [`crate::rewrite`].

use std::collections::{BTreeSet, HashSet};

use slotmap::SlotMap;
use snafu::{OptionExt, ensure};

use crate::attr::{self, AttrValue, Attrs};
use crate::error::*;
use crate::node::{Edge, EdgeRef, InputAnchor, Node, NodeId, OutputAnchor};
use crate::types::{OpCategory, OpType, TensorDesc};

#[derive(Debug, Clone, Default)]
pub struct Graph {
    name: String,
    pub(crate) nodes: SlotMap<NodeId, Node>,
    /// Nodes ever created here; numbers default node names.
    created: usize,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) output: Option<NodeId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Boundary
    // =========================================================================

    /// Appends an external input and returns its `Data` node.
    pub fn add_input(&mut self, desc: TensorDesc) -> NodeId {
        let position = self.inputs.len();
        let op = OpType::with_category("Data", OpCategory::Data);
        let mut attrs = Attrs::new();
        attrs.insert(attr::INPUT_INDEX.to_string(), AttrValue::Int(position as i64));
        let name = format!("{}_input_{position}", self.name);
        let id = self.insert_with(|id, _| Node::new(id, name, op, Vec::new(), vec![desc], attrs));
        self.inputs.push(id);
        id
    }

    /// Creates the `NetOutput` node with one input per external output.
    pub fn declare_outputs(&mut self, descs: Vec<TensorDesc>) -> Result<NodeId> {
        if let Some(existing) = self.output {
            return InvalidNodeSnafu {
                reason: format!("graph {} already declares its outputs on {existing}", self.name),
            }
            .fail();
        }
        let op = OpType::with_category("NetOutput", OpCategory::NetOutput);
        let name = format!("{}_output", self.name);
        let id = self.insert_with(|id, _| Node::new(id, name, op, descs, Vec::new(), Attrs::new()));
        self.output = Some(id);
        Ok(id)
    }

    /// Stores a node built from its own id and creation ordinal.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(NodeId, usize) -> Node) -> NodeId {
        let ordinal = self.created;
        self.created += 1;
        self.nodes.insert_with_key(|id| build(id, ordinal))
    }

    /// Links `from` to external output `position`.
    pub fn set_output(&mut self, position: usize, from: OutputAnchor) -> Result<EdgeRef> {
        let output = self.output.context(InvalidNodeSnafu {
            reason: format!("graph {} has no declared outputs", self.name),
        })?;
        self.link(from.node, from.index, output, position)
    }

    /// `Data` nodes in positional order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn output_node(&self) -> Option<NodeId> {
        self.output
    }

    /// Producers feeding each external output, in positional order.
    pub fn outputs(&self) -> Vec<Option<OutputAnchor>> {
        self.output.and_then(|id| self.get(id)).map(|node| node.inputs.clone()).unwrap_or_default()
    }

    pub fn input_descs(&self) -> Vec<TensorDesc> {
        self.inputs.iter().filter_map(|&id| self.get(id)).filter_map(|node| node.output_descs.first().cloned()).collect()
    }

    pub fn output_descs(&self) -> Vec<TensorDesc> {
        self.output.and_then(|id| self.get(id)).map(|node| node.input_descs.clone()).unwrap_or_default()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Node lookup that reports stale ids as [`Error::StaleNode`].
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).context(StaleNodeSnafu { node: id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).context(StaleNodeSnafu { node: id })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|node| node.name == name).map(|node| node.id)
    }

    /// Every consumed output with its consumers.
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.nodes().flat_map(|node| {
            node.outputs.iter().enumerate().filter(|(_, list)| !list.is_empty()).map(|(index, list)| Edge {
                producer: OutputAnchor::new(node.id, index),
                consumers: list.as_slice(),
            })
        })
    }

    /// Every individual producer-to-consumer link.
    pub fn edge_refs(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.edges().flat_map(|edge| edge.consumers.iter().map(move |&to| EdgeRef::new(edge.producer, to)))
    }

    /// Number of producer-to-consumer links.
    pub fn edge_count(&self) -> usize {
        self.nodes().map(Node::consumer_edge_count).sum()
    }

    pub fn has_edge(&self, edge: EdgeRef) -> bool {
        self.get(edge.to.node).and_then(|node| node.input(edge.to.index)) == Some(edge.from)
    }

    /// Distinct consumer nodes of `id`, in output then link order.
    pub fn consumers(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        let mut seen = HashSet::new();
        Ok(node.outputs.iter().flatten().map(|anchor| anchor.node).filter(|n| seen.insert(*n)).collect())
    }

    /// Distinct producer nodes feeding `id`, in input order.
    pub fn producers(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        let mut seen = HashSet::new();
        Ok(node.inputs.iter().flatten().map(|anchor| anchor.node).filter(|n| seen.insert(*n)).collect())
    }

    pub fn consumer_edge_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.consumer_edge_count())
    }

    pub(crate) fn successors(&self, node: &Node) -> impl Iterator<Item = NodeId> {
        node.outputs.iter().flatten().map(|anchor| anchor.node).chain(node.control_out.iter().copied())
    }

    /// Whether `target` is reachable from any of `from` over data and control
    /// edges. Start nodes count as reached.
    pub fn reaches(&self, from: impl IntoIterator<Item = NodeId>, target: NodeId) -> bool {
        let mut stack: Vec<NodeId> = from.into_iter().collect();
        let mut visited: HashSet<NodeId> = stack.iter().copied().collect();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let Some(node) = self.get(id) else { continue };
            stack.extend(self.successors(node).filter(|next| visited.insert(*next)));
        }
        false
    }

    /// Kahn's algorithm over data and control edges, ties broken by id.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: std::collections::HashMap<NodeId, usize> = self
            .nodes()
            .map(|node| {
                let fan_in = node.inputs.iter().flatten().count() + node.control_in.len();
                (node.id, fan_in)
            })
            .collect();
        let mut ready: BTreeSet<NodeId> = pending.iter().filter(|(_, n)| **n == 0).map(|(id, _)| *id).collect();
        let mut order = Vec::with_capacity(self.node_count());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            let node = self.node(id)?;
            for next in self.successors(node) {
                if let Some(count) = pending.get_mut(&next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(next);
                    }
                }
            }
        }

        let placed: HashSet<NodeId> = order.iter().copied().collect();
        if let Some(node) = self.nodes.keys().find(|id| !placed.contains(id)) {
            return GraphCycleSnafu { node }.fail();
        }
        Ok(order)
    }

    /// Checks anchor symmetry, live endpoints, required inputs, and acyclicity.
    pub fn verify(&self) -> Result<()> {
        for node in self.nodes() {
            for (index, input) in node.inputs.iter().enumerate() {
                let here = InputAnchor::new(node.id, index);
                let Some(from) = input else {
                    ensure!(node.input_descs[index].optional, DanglingRequiredInputSnafu { input: here });
                    continue;
                };
                let producer = self.get(from.node).context(BrokenAnchorSnafu {
                    detail: format!("{here} is fed by removed node {}", from.node),
                })?;
                let consumers = producer.outputs.get(from.index).context(BrokenAnchorSnafu {
                    detail: format!("{here} is fed by missing port {from}"),
                })?;
                ensure!(
                    consumers.contains(&here),
                    BrokenAnchorSnafu { detail: format!("{from} does not list consumer {here}") }
                );
            }

            for (index, consumers) in node.outputs.iter().enumerate() {
                let here = OutputAnchor::new(node.id, index);
                for to in consumers {
                    let consumer = self.get(to.node).context(BrokenAnchorSnafu {
                        detail: format!("{here} feeds removed node {}", to.node),
                    })?;
                    ensure!(
                        consumer.input(to.index) == Some(here),
                        BrokenAnchorSnafu { detail: format!("{to} does not read from {here}") }
                    );
                }
            }

            for &succ in &node.control_out {
                let ok = self.get(succ).is_some_and(|other| other.control_in.contains(&node.id));
                ensure!(ok, BrokenAnchorSnafu { detail: format!("control edge {} -> {succ} is one-sided", node.id) });
            }
            for &pred in &node.control_in {
                let ok = self.get(pred).is_some_and(|other| other.control_out.contains(&node.id));
                ensure!(ok, BrokenAnchorSnafu { detail: format!("control edge {pred} -> {} is one-sided", node.id) });
            }
        }

        for &input in &self.inputs {
            ensure!(
                self.contains(input),
                BrokenAnchorSnafu { detail: format!("graph input {input} was removed") }
            );
        }

        self.topological_order().map(|_| ())
    }
}
