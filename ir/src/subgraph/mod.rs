//! Nested graphs for control-flow nodes.
//!
//! A [`Subgraph`] is a self-contained [`Graph`] whose `Data` and `NetOutput`
//! boundary nodes match a declared signature positionally. Loop synthesis
//! builds a `cond` and a `body` subgraph with [`build_subgraph`] and attaches
//! them through the [`ControlFlowNode`] state machine in [`control_flow`].

pub mod control_flow;

use std::ops::{Deref, DerefMut};

use snafu::{OptionExt, ensure};
use tracing::debug;

use crate::error::*;
use crate::graph::Graph;
use crate::node::{EdgeRef, OutputAnchor};
use crate::types::TensorDesc;

pub use control_flow::{
    BoundToCond, BoundToCondAndBody, ControlFlowNode, ControlFlowStage, ControlFlowState, Unbound, Validated,
    attach_control_flow,
};

#[derive(Debug, Clone)]
pub struct Subgraph {
    graph: Graph,
}

impl Subgraph {
    pub fn name(&self) -> &str {
        self.graph.name()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn input_descs(&self) -> Vec<TensorDesc> {
        self.graph.input_descs()
    }

    pub fn output_descs(&self) -> Vec<TensorDesc> {
        self.graph.output_descs()
    }

    pub fn num_inputs(&self) -> usize {
        self.graph.inputs().len()
    }

    pub fn num_outputs(&self) -> usize {
        self.graph.outputs().len()
    }
}

/// Build-time view of a subgraph under construction.
///
/// Derefs to the inner [`Graph`], so the full rewrite API is available
/// inside the build closure.
#[derive(Debug)]
pub struct SubgraphScope {
    graph: Graph,
}

impl SubgraphScope {
    /// Output port of boundary input `position`.
    pub fn input(&self, position: usize) -> Result<OutputAnchor> {
        let data = self.graph.inputs().get(position).copied().context(BoundaryMismatchSnafu {
            subgraph: self.graph.name(),
            reason: format!("no boundary input {position}, signature has {}", self.graph.inputs().len()),
        })?;
        Ok(OutputAnchor::new(data, 0))
    }

    /// Feeds boundary output `position` from `from`.
    pub fn set_output(&mut self, position: usize, from: OutputAnchor) -> Result<EdgeRef> {
        self.graph.set_output(position, from)
    }
}

impl Deref for SubgraphScope {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}

impl DerefMut for SubgraphScope {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}

/// Builds a nested graph with the given boundary signature.
///
/// `build` receives a scope whose boundary inputs and outputs are already in
/// place. After it returns, every boundary output must be connected, the
/// boundary must still match the signature, and the graph must verify.
///
/// ```ignore
/// let cond = build_subgraph("cond", &[i, limit], &[TensorDesc::scalar(DataType::Bool)], |scope| {
///     let less = scope.add_node().op("Less").inputs(vec![i, limit]).outputs(vec![flag]).call()?;
///     scope.link(scope.input(0)?.node, 0, less, 0)?;
///     scope.link(scope.input(1)?.node, 0, less, 1)?;
///     scope.set_output(0, OutputAnchor::new(less, 0))?;
///     Ok(())
/// })?;
/// ```
pub fn build_subgraph<F>(
    name: impl Into<String>,
    inputs: &[TensorDesc],
    outputs: &[TensorDesc],
    build: F,
) -> Result<Subgraph>
where
    F: FnOnce(&mut SubgraphScope) -> Result<()>,
{
    let mut graph = Graph::new(name);
    for desc in inputs {
        graph.add_input(desc.clone());
    }
    graph.declare_outputs(outputs.to_vec())?;

    let mut scope = SubgraphScope { graph };
    build(&mut scope)?;
    let graph = scope.graph;

    ensure!(
        graph.inputs().len() == inputs.len(),
        BoundaryMismatchSnafu {
            subgraph: graph.name(),
            reason: format!("declared {} inputs, built {}", inputs.len(), graph.inputs().len()),
        }
    );
    if let Some(position) = graph.outputs().iter().position(Option::is_none) {
        return BoundaryMismatchSnafu { subgraph: graph.name(), reason: format!("output {position} is not connected") }
            .fail();
    }
    graph.verify()?;

    debug!(
        subgraph = graph.name(),
        inputs = inputs.len(),
        outputs = outputs.len(),
        nodes = graph.node_count(),
        "subgraph built"
    );
    Ok(Subgraph { graph })
}

/// Subgraphs and slot mappings owned by a control-flow node.
///
/// `input_mapping[i]` is the body input fed by outer input `i`, and
/// `output_mapping[j]` is the body output that produces outer output `j`.
/// Loop-carried values are threaded from body outputs back to body inputs by
/// position.
#[derive(Debug, Clone)]
pub struct ControlFlow {
    pub(crate) cond: Subgraph,
    pub(crate) body: Subgraph,
    pub(crate) input_mapping: Vec<usize>,
    pub(crate) output_mapping: Vec<usize>,
}

impl ControlFlow {
    pub fn cond(&self) -> &Subgraph {
        &self.cond
    }

    pub fn body(&self) -> &Subgraph {
        &self.body
    }

    pub fn input_mapping(&self) -> &[usize] {
        &self.input_mapping
    }

    pub fn output_mapping(&self) -> &[usize] {
        &self.output_mapping
    }
}
