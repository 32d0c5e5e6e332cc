//! Control-flow node synthesis.
//!
//! A control-flow node goes through four stages before it can enter a graph:
//!
//! ```text
//! Unbound --bind_cond--> BoundToCond --bind_body--> BoundToCondAndBody --validate--> Validated
//! ```
//!
//! Each stage is a distinct type, so binding `body` before `cond` or
//! inserting an unvalidated node does not compile. Only
//! [`Graph::insert_control_flow`] consumes a `ControlFlowNode<Validated>`.

use std::collections::HashSet;

use snafu::ensure;
use tracing::debug;

use super::{ControlFlow, Subgraph};
use crate::attr::{AttrValue, Attrs};
use crate::error::*;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::types::{DataType, OpCategory, OpType, TensorDesc};

/// Runtime name of a stage, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ControlFlowState {
    Unbound,
    BoundToCond,
    BoundToCondAndBody,
    Validated,
}

mod sealed {
    pub trait Sealed {}
}

pub trait ControlFlowStage: sealed::Sealed {
    const STATE: ControlFlowState;
}

#[derive(Debug)]
pub struct Unbound;

#[derive(Debug)]
pub struct BoundToCond {
    cond: Subgraph,
}

#[derive(Debug)]
pub struct BoundToCondAndBody {
    cond: Subgraph,
    body: Subgraph,
}

#[derive(Debug)]
pub struct Validated {
    flow: ControlFlow,
}

macro_rules! stage {
    ($($ty:ident),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl ControlFlowStage for $ty {
                const STATE: ControlFlowState = ControlFlowState::$ty;
            }
        )*
    };
}

stage!(Unbound, BoundToCond, BoundToCondAndBody, Validated);

#[derive(Debug)]
pub struct ControlFlowNode<S: ControlFlowStage> {
    name: Option<String>,
    op: OpType,
    inputs: Vec<TensorDesc>,
    outputs: Vec<TensorDesc>,
    attrs: Attrs,
    stage: S,
}

impl<S: ControlFlowStage> ControlFlowNode<S> {
    pub fn state(&self) -> ControlFlowState {
        S::STATE
    }

    pub fn op(&self) -> &OpType {
        &self.op
    }

    pub fn input_descs(&self) -> &[TensorDesc] {
        &self.inputs
    }

    pub fn output_descs(&self) -> &[TensorDesc] {
        &self.outputs
    }

    fn advance<T: ControlFlowStage>(self, stage: T) -> ControlFlowNode<T> {
        ControlFlowNode {
            name: self.name,
            op: self.op,
            inputs: self.inputs,
            outputs: self.outputs,
            attrs: self.attrs,
            stage,
        }
    }
}

impl ControlFlowNode<Unbound> {
    /// Control-flow node of operator `op`. The category is always
    /// [`OpCategory::ControlFlow`], whatever the name would infer to.
    pub fn new(op: impl Into<String>, inputs: Vec<TensorDesc>, outputs: Vec<TensorDesc>) -> Self {
        Self {
            name: None,
            op: OpType::with_category(op, OpCategory::ControlFlow),
            inputs,
            outputs,
            attrs: Attrs::new(),
            stage: Unbound,
        }
    }

    /// `While` node carrying `state` through every iteration.
    pub fn while_loop(state: Vec<TensorDesc>) -> Self {
        Self::new("While", state.clone(), state)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Binds the loop predicate. `cond` must take every loop input and
    /// produce a single boolean.
    pub fn bind_cond(self, cond: Subgraph) -> Result<ControlFlowNode<BoundToCond>> {
        ensure!(
            cond.num_inputs() == self.inputs.len(),
            InvalidConditionSnafu {
                subgraph: cond.name(),
                reason: format!("takes {} input(s), node has {}", cond.num_inputs(), self.inputs.len()),
            }
        );
        let outputs = cond.output_descs();
        ensure!(
            outputs.len() == 1,
            InvalidConditionSnafu { subgraph: cond.name(), reason: format!("has {} outputs, expected 1", outputs.len()) }
        );
        ensure!(
            matches!(outputs[0].dtype, DataType::Bool | DataType::Undefined),
            InvalidConditionSnafu { subgraph: cond.name(), reason: format!("output is {}, not Bool", outputs[0].dtype) }
        );
        Ok(self.advance(BoundToCond { cond }))
    }
}

impl ControlFlowNode<BoundToCond> {
    pub fn cond(&self) -> &Subgraph {
        &self.stage.cond
    }

    /// Binds the body. Its signature must have the node's arity on both sides.
    pub fn bind_body(self, body: Subgraph) -> Result<ControlFlowNode<BoundToCondAndBody>> {
        ensure!(
            body.num_inputs() == self.inputs.len(),
            SignatureMismatchSnafu {
                subgraph: body.name(),
                direction: Direction::Input,
                expected: self.inputs.len(),
                actual: body.num_inputs()
            }
        );
        ensure!(
            body.num_outputs() == self.outputs.len(),
            SignatureMismatchSnafu {
                subgraph: body.name(),
                direction: Direction::Output,
                expected: self.outputs.len(),
                actual: body.num_outputs()
            }
        );
        let BoundToCond { cond } = self.stage;
        Ok(ControlFlowNode {
            name: self.name,
            op: self.op,
            inputs: self.inputs,
            outputs: self.outputs,
            attrs: self.attrs,
            stage: BoundToCondAndBody { cond, body },
        })
    }
}

impl ControlFlowNode<BoundToCondAndBody> {
    pub fn cond(&self) -> &Subgraph {
        &self.stage.cond
    }

    pub fn body(&self) -> &Subgraph {
        &self.stage.body
    }

    /// Checks that every outer position maps to a distinct body slot with a
    /// compatible dtype.
    pub fn validate(self, input_mapping: Vec<usize>, output_mapping: Vec<usize>) -> Result<ControlFlowNode<Validated>> {
        let body = &self.stage.body;
        let body_inputs = body.input_descs();
        let body_outputs = body.output_descs();
        check_mapping(body.name(), Direction::Input, &self.inputs, &body_inputs, &input_mapping)?;
        check_mapping(body.name(), Direction::Output, &self.outputs, &body_outputs, &output_mapping)?;

        debug!(
            op = %self.op,
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "control-flow node validated"
        );
        let BoundToCondAndBody { cond, body } = self.stage;
        let flow = ControlFlow { cond, body, input_mapping, output_mapping };
        Ok(ControlFlowNode {
            name: self.name,
            op: self.op,
            inputs: self.inputs,
            outputs: self.outputs,
            attrs: self.attrs,
            stage: Validated { flow },
        })
    }
}

impl ControlFlowNode<Validated> {
    pub fn flow(&self) -> &ControlFlow {
        &self.stage.flow
    }
}

fn check_mapping(
    subgraph: &str,
    direction: Direction,
    outer: &[TensorDesc],
    inner: &[TensorDesc],
    mapping: &[usize],
) -> Result<()> {
    if mapping.len() < outer.len() {
        return UnmappedSlotSnafu { direction, position: mapping.len() }.fail();
    }
    if let Some(&target) = mapping.get(outer.len()) {
        return InvalidSlotMappingSnafu { direction, position: outer.len(), target, arity: inner.len() }.fail();
    }

    let mut seen = HashSet::with_capacity(mapping.len());
    for (position, &target) in mapping.iter().enumerate() {
        ensure!(
            target < inner.len() && seen.insert(target),
            InvalidSlotMappingSnafu { direction, position, target, arity: inner.len() }
        );
        let (a, b) = (outer[position].dtype, inner[target].dtype);
        ensure!(
            a == b || a == DataType::Undefined || b == DataType::Undefined,
            BoundaryMismatchSnafu {
                subgraph,
                reason: format!("{direction} {position} is {a} but subgraph slot {target} is {b}"),
            }
        );
    }
    Ok(())
}

/// Binds `cond` and `body` to `node` and validates both slot mappings.
///
/// Any unmapped position is an [`Error::UnmappedSlot`]; on failure nothing
/// is attached and the node is dropped.
pub fn attach_control_flow(
    node: ControlFlowNode<Unbound>,
    cond: Subgraph,
    body: Subgraph,
    input_mapping: Vec<usize>,
    output_mapping: Vec<usize>,
) -> Result<ControlFlowNode<Validated>> {
    node.bind_cond(cond)?.bind_body(body)?.validate(input_mapping, output_mapping)
}

impl Graph {
    /// Inserts a validated control-flow node, unlinked. The node takes
    /// exclusive ownership of its subgraphs.
    pub fn insert_control_flow(&mut self, node: ControlFlowNode<Validated>) -> Result<NodeId> {
        let ControlFlowNode { name, op, inputs, outputs, attrs, stage } = node;
        let id = self.insert_node(op, inputs, outputs, attrs, name);
        self.node_mut(id)?.control_flow = Some(Box::new(stage.flow));
        debug!(node = %id, "control-flow node inserted");
        Ok(id)
    }
}
