//! Typestate node removal.
//!
//! [`Graph::isolate`] hands out a [`NodeRemoval<Attached>`]. `remove()` only
//! exists on [`NodeRemoval<Isolated>`], and the only ways to get there are to
//! redirect every consumer elsewhere or to cut them all. Forgetting to unlink
//! before removal is therefore a type error rather than a runtime failure.
//!
//! ```ignore
//! graph.isolate(old)?.redirect_outputs(fused)?.remove()?;
//! graph.isolate(dead)?.unlink_all().remove()?;
//! ```

use std::marker::PhantomData;

use snafu::ensure;
use tracing::trace;

use crate::error::*;
use crate::graph::Graph;
use crate::node::{EdgeRef, Node, NodeId, OutputAnchor};

/// Node may still have consumers.
#[derive(Debug)]
pub enum Attached {}

/// Node has no data consumers left.
#[derive(Debug)]
pub enum Isolated {}

#[derive(Debug)]
pub struct NodeRemoval<'g, S> {
    graph: &'g mut Graph,
    node: NodeId,
    _state: PhantomData<S>,
}

impl Graph {
    /// Starts removing `node`. Boundary nodes are refused.
    pub fn isolate(&mut self, node: NodeId) -> Result<NodeRemoval<'_, Attached>> {
        let target = self.node(node)?;
        ensure!(
            !target.is_boundary(),
            InvalidNodeSnafu { reason: format!("boundary node {} cannot be removed", target.name()) }
        );
        Ok(NodeRemoval { graph: self, node, _state: PhantomData })
    }
}

impl<'g, S> NodeRemoval<'g, S> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    fn transition<T>(self) -> NodeRemoval<'g, T> {
        NodeRemoval { graph: self.graph, node: self.node, _state: PhantomData }
    }
}

impl<'g> NodeRemoval<'g, Attached> {
    /// Moves consumers of output `index` to `to`.
    pub fn redirect_output(self, index: usize, to: OutputAnchor) -> Result<Self> {
        self.graph.replace_consumers(OutputAnchor::new(self.node, index), to)?;
        Ok(self)
    }

    /// Moves consumers of output `i` to output `i` of `to`, for every output.
    pub fn redirect_outputs(self, to: NodeId) -> Result<NodeRemoval<'g, Isolated>> {
        let arity = self.graph.node(self.node)?.num_outputs();
        let target = self.graph.node(to)?.num_outputs();
        ensure!(
            target >= arity,
            PortOutOfRangeSnafu { node: to, direction: Direction::Output, index: arity.saturating_sub(1), arity: target }
        );
        ensure!(
            to != self.node,
            InvalidNodeSnafu { reason: format!("cannot redirect {to} onto itself") }
        );
        let readers = self.graph.consumers(self.node)?;
        ensure!(!self.graph.reaches(readers, to), GraphCycleSnafu { node: to });
        for index in 0..arity {
            self.graph.replace_consumers(OutputAnchor::new(self.node, index), OutputAnchor::new(to, index))?;
        }
        trace!(node = %self.node, %to, "outputs redirected");
        Ok(self.transition())
    }

    /// Cuts every remaining consumer edge.
    pub fn unlink_all(self) -> NodeRemoval<'g, Isolated> {
        let node = self.node;
        let edges: Vec<EdgeRef> = self
            .graph
            .get(node)
            .map(|n| {
                n.outputs()
                    .iter()
                    .enumerate()
                    .flat_map(|(index, list)| list.iter().map(move |&to| EdgeRef::new(OutputAnchor::new(node, index), to)))
                    .collect()
            })
            .unwrap_or_default();
        for edge in edges {
            self.graph.unlink(edge);
        }
        trace!(%node, "consumers cut");
        self.transition()
    }
}

impl NodeRemoval<'_, Isolated> {
    /// Removes the node together with its input and control edges.
    pub fn remove(self) -> Result<Node> {
        self.graph.remove_node(self.node)
    }
}
