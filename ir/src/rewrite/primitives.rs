//! Edge and node mutation primitives.
//!
//! Every primitive either succeeds completely or fails before touching the
//! graph. The only way to drop a node that still feeds others is through
//! [`Graph::isolate`](super::removal), which forces the consumers to be moved
//! or cut first.

use std::collections::BTreeSet;

use bon::bon;
use snafu::{OptionExt, ensure};
use tracing::{debug, trace};

use crate::attr::{AttrValue, Attrs};
use crate::error::*;
use crate::graph::Graph;
use crate::node::{EdgeRef, InputAnchor, Node, NodeId, OutputAnchor};
use crate::types::{OpCategory, OpType, TensorDesc};

#[bon]
impl Graph {
    /// Adds an unlinked node.
    ///
    /// ```ignore
    /// let relu = graph.add_node().op("Relu").inputs(vec![desc.clone()]).outputs(vec![desc]).call()?;
    /// ```
    ///
    /// Boundary and control-flow categories are rejected here; use
    /// [`Graph::add_input`], [`Graph::declare_outputs`], or
    /// [`Graph::insert_control_flow`] for those.
    #[builder]
    pub fn add_node(
        &mut self,
        #[builder(into)] op: OpType,
        #[builder(default)] inputs: Vec<TensorDesc>,
        #[builder(default)] outputs: Vec<TensorDesc>,
        #[builder(default)] attrs: Attrs,
        #[builder(into)] name: Option<String>,
    ) -> Result<NodeId> {
        ensure!(!op.name().is_empty(), InvalidNodeSnafu { reason: "empty operator type" });
        ensure!(
            !op.category().is_boundary() && op.category() != OpCategory::ControlFlow,
            InvalidNodeSnafu { reason: format!("{} nodes cannot be added directly", op.category()) }
        );
        ensure!(
            attrs.keys().all(|key| !key.is_empty()),
            InvalidNodeSnafu { reason: format!("empty attribute key on {op}") }
        );
        Ok(self.insert_node(op, inputs, outputs, attrs, name))
    }
}

impl Graph {
    pub(crate) fn insert_node(
        &mut self,
        op: OpType,
        inputs: Vec<TensorDesc>,
        outputs: Vec<TensorDesc>,
        attrs: Attrs,
        name: Option<String>,
    ) -> NodeId {
        let id = self.insert_with(|id, ordinal| {
            let name = name.unwrap_or_else(|| format!("{}_{ordinal}", op.name()));
            Node::new(id, name, op, inputs, outputs, attrs)
        });
        trace!(node = %id, "node added");
        id
    }

    /// Links output `output` of `producer` to input `input` of `consumer`.
    ///
    /// Relinking an existing edge is a no-op. An input fed by a different
    /// producer fails with [`Error::InputOccupied`].
    pub fn link(&mut self, producer: NodeId, output: usize, consumer: NodeId, input: usize) -> Result<EdgeRef> {
        let from = OutputAnchor::new(producer, output);
        let to = InputAnchor::new(consumer, input);
        self.check_output(from)?;
        let current = self.check_input(to)?;
        ensure!(producer != consumer, GraphCycleSnafu { node: producer });

        match current {
            Some(existing) if existing == from => return Ok(EdgeRef::new(from, to)),
            Some(existing) => return InputOccupiedSnafu { input: to, producer: existing }.fail(),
            None => {}
        }

        self.node_mut(consumer)?.inputs[input] = Some(from);
        self.node_mut(producer)?.outputs[output].push(to);
        trace!(edge = %EdgeRef::new(from, to), "linked");
        Ok(EdgeRef::new(from, to))
    }

    /// Removes `edge` if present. Returns whether anything was removed.
    pub fn unlink(&mut self, edge: EdgeRef) -> bool {
        if !self.has_edge(edge) {
            return false;
        }
        if let Some(consumer) = self.nodes.get_mut(edge.to.node) {
            consumer.inputs[edge.to.index] = None;
        }
        if let Some(producer) = self.nodes.get_mut(edge.from.node)
            && let Some(list) = producer.outputs.get_mut(edge.from.index)
        {
            list.retain(|to| *to != edge.to);
        }
        trace!(%edge, "unlinked");
        true
    }

    /// Disconnects whatever feeds `input`, returning the removed edge.
    pub fn unlink_input(&mut self, input: InputAnchor) -> Option<EdgeRef> {
        let from = self.get(input.node)?.input(input.index)?;
        let edge = EdgeRef::new(from, input);
        self.unlink(edge).then_some(edge)
    }

    /// Moves every consumer of `old` to `new`, keeping each consumer's input
    /// index. Returns the number of moved edges.
    pub fn replace_consumers(&mut self, old: OutputAnchor, new: OutputAnchor) -> Result<usize> {
        self.check_output(old)?;
        self.check_output(new)?;
        if old == new {
            return Ok(0);
        }

        let readers = self.node(old.node)?.consumers(old.index).iter().map(|to| to.node);
        ensure!(!self.reaches(readers, new.node), GraphCycleSnafu { node: new.node });
        let moved = std::mem::take(&mut self.node_mut(old.node)?.outputs[old.index]);
        for to in &moved {
            self.node_mut(to.node)?.inputs[to.index] = Some(new);
        }
        self.node_mut(new.node)?.outputs[new.index].extend(moved.iter().copied());
        debug!(from = %old, to = %new, edges = moved.len(), "consumers replaced");
        Ok(moved.len())
    }

    /// Adds an ordering-only edge. Duplicate links are ignored.
    pub fn link_control(&mut self, before: NodeId, after: NodeId) -> Result<()> {
        self.node(before)?;
        self.node(after)?;
        ensure!(before != after, GraphCycleSnafu { node: before });
        let node = self.node_mut(before)?;
        if node.control_out.contains(&after) {
            return Ok(());
        }
        node.control_out.push(after);
        self.node_mut(after)?.control_in.push(before);
        Ok(())
    }

    /// Removes an ordering-only edge if present.
    pub fn unlink_control(&mut self, before: NodeId, after: NodeId) -> bool {
        let mut removed = false;
        if let Some(node) = self.nodes.get_mut(before) {
            let len = node.control_out.len();
            node.control_out.retain(|n| *n != after);
            removed = node.control_out.len() != len;
        }
        if let Some(node) = self.nodes.get_mut(after) {
            node.control_in.retain(|n| *n != before);
        }
        removed
    }

    /// Removes a node with no live consumers.
    ///
    /// Fails with [`Error::LiveConsumers`] and leaves the graph untouched if
    /// any output still feeds another node. The node's own input edges and
    /// control dependencies are cut as part of removal.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let node = self.node(id)?;
        ensure!(
            !node.is_boundary(),
            InvalidNodeSnafu { reason: format!("boundary node {} cannot be removed", node.name) }
        );
        let consumers = node.consumer_edge_count();
        ensure!(consumers == 0, LiveConsumersSnafu { node: id, consumers });
        self.detach(id)?;
        let node = self.nodes.remove(id).context(StaleNodeSnafu { node: id })?;
        debug!(node = %id, name = %node.name, "node removed");
        Ok(node)
    }

    /// Cuts the node's input edges and control dependencies in both directions.
    pub(crate) fn detach(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let inputs: Vec<_> = node
            .inputs
            .iter()
            .enumerate()
            .filter_map(|(index, from)| from.map(|from| EdgeRef::new(from, InputAnchor::new(id, index))))
            .collect();
        let preds = node.control_in.clone();
        let succs = node.control_out.clone();

        for edge in inputs {
            self.unlink(edge);
        }
        for pred in preds {
            self.unlink_control(pred, id);
        }
        for succ in succs {
            self.unlink_control(id, succ);
        }
        Ok(())
    }

    pub fn set_attr(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<AttrValue>) -> Result<()> {
        let key = key.into();
        ensure!(!key.is_empty(), InvalidNodeSnafu { reason: "empty attribute key" });
        self.node_mut(id)?.attrs.insert(key, value.into());
        Ok(())
    }

    /// Splices `node` into `edge`: the old producer feeds input `input` of
    /// `node`, and output `output` of `node` feeds the old consumer.
    pub fn insert_between(&mut self, edge: EdgeRef, node: NodeId, input: usize, output: usize) -> Result<()> {
        ensure!(
            self.has_edge(edge),
            BrokenAnchorSnafu { detail: format!("edge {edge} does not exist") }
        );
        self.check_output(OutputAnchor::new(node, output))?;
        let current = self.check_input(InputAnchor::new(node, input))?;
        if let Some(producer) = current {
            return InputOccupiedSnafu { input: InputAnchor::new(node, input), producer }.fail();
        }
        ensure!(
            node != edge.from.node && node != edge.to.node,
            GraphCycleSnafu { node }
        );

        self.unlink(edge);
        self.link(edge.from.node, edge.from.index, node, input)?;
        self.link(node, output, edge.to.node, edge.to.index)?;
        Ok(())
    }

    /// Removes every candidate left without consumers. Removing one candidate
    /// may leave another candidate dangling, so this runs to a fixpoint.
    /// Boundary and side-effecting nodes are kept.
    ///
    /// Returns the removed ids in removal order.
    pub fn prune_dangling_outputs(&mut self, candidates: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let candidates: BTreeSet<NodeId> = candidates.into_iter().collect();
        let mut queue = candidates.clone();
        let mut removed = Vec::new();

        while let Some(id) = queue.pop_first() {
            let Some(node) = self.get(id) else { continue };
            if !node.is_dangling() || node.has_side_effect() {
                continue;
            }
            let producers: Vec<NodeId> = node.inputs.iter().flatten().map(|from| from.node).collect();
            if self.remove_node(id).is_ok() {
                removed.push(id);
                queue.extend(producers.into_iter().filter(|p| candidates.contains(p)));
            }
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned dangling nodes");
        }
        removed
    }

    fn check_output(&self, anchor: OutputAnchor) -> Result<()> {
        let node = self.node(anchor.node)?;
        ensure!(
            anchor.index < node.num_outputs(),
            PortOutOfRangeSnafu {
                node: anchor.node,
                direction: Direction::Output,
                index: anchor.index,
                arity: node.num_outputs()
            }
        );
        Ok(())
    }

    /// Returns the current producer of a valid input port.
    fn check_input(&self, anchor: InputAnchor) -> Result<Option<OutputAnchor>> {
        let node = self.node(anchor.node)?;
        ensure!(
            anchor.index < node.num_inputs(),
            PortOutOfRangeSnafu {
                node: anchor.node,
                direction: Direction::Input,
                index: anchor.index,
                arity: node.num_inputs()
            }
        );
        Ok(node.inputs[anchor.index])
    }
}
