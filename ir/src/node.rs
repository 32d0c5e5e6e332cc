//! Nodes, anchors, and edge references.
//!
//! An edge is identified by its producer side (an [`OutputAnchor`]) and fans
//! out to any number of consumer [`InputAnchor`]s. Each node stores both
//! sides: `inputs[i]` names the producer feeding input `i`, and `outputs[j]`
//! lists every consumer of output `j`. The graph keeps the two views in sync.
//!
//! Nodes live in a [`SlotMap`](slotmap::SlotMap) keyed by [`NodeId`]. A
//! removed node's key is never resolved again, so an id held past a rewrite
//! (for example by an old [`Mapping`](crate::pattern::Mapping)) cannot alias
//! a node allocated later in the same slot.

use std::fmt;

use slotmap::{Key, new_key_type};
use smallvec::SmallVec;

use crate::attr::{self, AttrValue, Attrs};
use crate::subgraph::ControlFlow;
use crate::types::{OpCategory, OpType, TensorDesc};

new_key_type! {
    /// Generation-checked node identifier.
    pub struct NodeId;
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{:?}", self.data())
    }
}

/// Output port of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{node}:out{index}")]
pub struct OutputAnchor {
    pub node: NodeId,
    pub index: usize,
}

impl OutputAnchor {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Input port of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{node}:in{index}")]
pub struct InputAnchor {
    pub node: NodeId,
    pub index: usize,
}

impl InputAnchor {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// One producer-to-consumer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{from} -> {to}")]
pub struct EdgeRef {
    pub from: OutputAnchor,
    pub to: InputAnchor,
}

impl EdgeRef {
    pub fn new(from: OutputAnchor, to: InputAnchor) -> Self {
        Self { from, to }
    }
}

/// A producer output together with all of its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'g> {
    pub producer: OutputAnchor,
    pub consumers: &'g [InputAnchor],
}

pub type ConsumerList = SmallVec<[InputAnchor; 2]>;

#[derive(derive_more::Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) op: OpType,
    pub(crate) input_descs: Vec<TensorDesc>,
    pub(crate) output_descs: Vec<TensorDesc>,
    pub(crate) inputs: Vec<Option<OutputAnchor>>,
    pub(crate) outputs: Vec<ConsumerList>,
    pub(crate) control_in: SmallVec<[NodeId; 2]>,
    pub(crate) control_out: SmallVec<[NodeId; 2]>,
    pub(crate) attrs: Attrs,
    #[debug(skip)]
    pub(crate) control_flow: Option<Box<ControlFlow>>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        op: OpType,
        input_descs: Vec<TensorDesc>,
        output_descs: Vec<TensorDesc>,
        attrs: Attrs,
    ) -> Self {
        let inputs = vec![None; input_descs.len()];
        let outputs = vec![ConsumerList::new(); output_descs.len()];
        Self {
            id,
            name,
            op,
            input_descs,
            output_descs,
            inputs,
            outputs,
            control_in: SmallVec::new(),
            control_out: SmallVec::new(),
            attrs,
            control_flow: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> &OpType {
        &self.op
    }

    pub fn op_name(&self) -> &str {
        self.op.name()
    }

    pub fn category(&self) -> OpCategory {
        self.op.category()
    }

    pub fn input_descs(&self) -> &[TensorDesc] {
        &self.input_descs
    }

    pub fn output_descs(&self) -> &[TensorDesc] {
        &self.output_descs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Producer feeding input `index`, if linked.
    pub fn input(&self, index: usize) -> Option<OutputAnchor> {
        self.inputs.get(index).copied().flatten()
    }

    pub fn inputs(&self) -> &[Option<OutputAnchor>] {
        &self.inputs
    }

    /// Consumers of output `index`.
    pub fn consumers(&self, index: usize) -> &[InputAnchor] {
        self.outputs.get(index).map(|list| list.as_slice()).unwrap_or(&[])
    }

    pub fn outputs(&self) -> &[ConsumerList] {
        &self.outputs
    }

    /// Consumer edges across all outputs. A consumer reading the same output
    /// twice counts twice.
    pub fn consumer_edge_count(&self) -> usize {
        self.outputs.iter().map(|list| list.len()).sum()
    }

    pub fn control_predecessors(&self) -> &[NodeId] {
        &self.control_in
    }

    pub fn control_successors(&self) -> &[NodeId] {
        &self.control_out
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn control_flow(&self) -> Option<&ControlFlow> {
        self.control_flow.as_deref()
    }

    pub fn is_boundary(&self) -> bool {
        self.category().is_boundary()
    }

    /// Side-effecting nodes survive pruning even with no consumers.
    pub fn has_side_effect(&self) -> bool {
        self.is_boundary() || self.attr(attr::SIDE_EFFECT).and_then(AttrValue::as_bool).unwrap_or(false)
    }

    /// True when no output has a data or control consumer.
    pub fn is_dangling(&self) -> bool {
        self.consumer_edge_count() == 0 && self.control_out.is_empty()
    }
}
