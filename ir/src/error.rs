use snafu::Snafu;

use crate::node::{InputAnchor, NodeId, OutputAnchor};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Side of a node or subgraph boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Direction {
    #[display("input")]
    Input,
    #[display("output")]
    Output,
}

/// Coarse classification used by pass drivers to decide whether an error
/// stops the enclosing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorKind {
    /// Malformed pattern, reported by `PatternBuilder::build`.
    #[display("construction error")]
    Construction,
    /// Misuse of the rewrite or subgraph API. Aborts the current rewrite.
    #[display("invariant violation")]
    InvariantViolation,
    /// The rewrite was refused; the graph is left untouched.
    #[display("rejected")]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Pattern construction
    // =========================================================================
    /// Slot name declared twice.
    #[snafu(display("pattern {pattern}: slot {slot:?} is declared more than once"))]
    DuplicateSlot { pattern: String, slot: String },

    /// `connect` or `set_head` names a slot that was never added.
    #[snafu(display("pattern {pattern}: reference to undeclared slot {slot:?}"))]
    UnknownSlot { pattern: String, slot: String },

    #[snafu(display("pattern {pattern}: no head slot was set"))]
    MissingHead { pattern: String },

    #[snafu(display("pattern {pattern}: exactly one head slot is allowed, got {heads:?}"))]
    MultipleHeads { pattern: String, heads: Vec<String> },

    #[snafu(display("pattern {pattern}: head slot {slot:?} cannot be a sentinel"))]
    SentinelHead { pattern: String, slot: String },

    /// INPUT_NODE used as a consumer, or OUTPUT_NODE used as a producer.
    #[snafu(display("pattern {pattern}: sentinel slot {slot:?} is used on the wrong side of a connection"))]
    MisplacedSentinel { pattern: String, slot: String },

    #[snafu(display("pattern {pattern}: slot {slot:?} has invalid cardinality {min}..={max}"))]
    InvalidCardinality { pattern: String, slot: String, min: usize, max: usize },

    #[snafu(display("pattern {pattern}: slot {slot:?} admits no operator types"))]
    EmptyTypeSet { pattern: String, slot: String },

    #[snafu(display("pattern {pattern}: slot {slot:?} is not reachable from the head slot"))]
    UnreachableSlot { pattern: String, slot: String },

    #[snafu(display("pattern {pattern}: connection from {slot:?} has no consumer slots"))]
    EmptyConnection { pattern: String, slot: String },

    // =========================================================================
    // Graph invariants
    // =========================================================================
    /// Node id refers to a removed node (or was never allocated).
    #[snafu(display("node {node} does not exist in the graph"))]
    StaleNode { node: NodeId },

    #[snafu(display("{direction} port {index} out of range for node {node} with {arity} {direction}s"))]
    PortOutOfRange { node: NodeId, direction: Direction, index: usize, arity: usize },

    /// Input already fed by another producer; unlink it first.
    #[snafu(display("input {input} is already linked to {producer}"))]
    InputOccupied { input: InputAnchor, producer: OutputAnchor },

    /// `remove_node` on a node that still feeds other nodes.
    #[snafu(display("node {node} still has {consumers} live consumer edge(s)"))]
    LiveConsumers { node: NodeId, consumers: usize },

    #[snafu(display("invalid node definition: {reason}"))]
    InvalidNode { reason: String },

    #[snafu(display("required input {input} is not connected"))]
    DanglingRequiredInput { input: InputAnchor },

    /// Producer and consumer sides of an edge disagree.
    #[snafu(display("broken anchor: {detail}"))]
    BrokenAnchor { detail: String },

    #[snafu(display("graph contains a cycle through node {node}"))]
    GraphCycle { node: NodeId },

    // =========================================================================
    // Subgraph synthesis
    // =========================================================================
    /// Positional slot of a control-flow node left without a subgraph mapping.
    #[snafu(display("{direction} position {position} of the control-flow node has no subgraph mapping"))]
    UnmappedSlot { direction: Direction, position: usize },

    #[snafu(display("{direction} position {position} maps to subgraph slot {target} (arity {arity})"))]
    InvalidSlotMapping { direction: Direction, position: usize, target: usize, arity: usize },

    #[snafu(display("subgraph {subgraph}: {direction} signature has {actual} slot(s), expected {expected}"))]
    SignatureMismatch { subgraph: String, direction: Direction, expected: usize, actual: usize },

    #[snafu(display("subgraph {subgraph} is not a valid loop condition: {reason}"))]
    InvalidCondition { subgraph: String, reason: String },

    #[snafu(display("subgraph {subgraph}: boundary mismatch: {reason}"))]
    BoundaryMismatch { subgraph: String, reason: String },

    // =========================================================================
    // Rejections
    // =========================================================================
    /// A structurally matched slot failed the concrete operator re-check.
    #[snafu(display("slot {slot:?} bound {found}, expected one of {expected:?}"))]
    SemanticGuardFailed { slot: String, expected: Vec<String>, found: String },

    /// Fusing the region would route a path out of the region and back in.
    #[snafu(display("fusing {region} node(s) would create a cycle through {node}"))]
    CycleDetected { region: usize, node: NodeId },

    #[snafu(display("cannot fuse an empty region"))]
    EmptyRegion,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateSlot { .. }
            | Self::UnknownSlot { .. }
            | Self::MissingHead { .. }
            | Self::MultipleHeads { .. }
            | Self::SentinelHead { .. }
            | Self::MisplacedSentinel { .. }
            | Self::InvalidCardinality { .. }
            | Self::EmptyTypeSet { .. }
            | Self::UnreachableSlot { .. }
            | Self::EmptyConnection { .. } => ErrorKind::Construction,

            Self::SemanticGuardFailed { .. } | Self::CycleDetected { .. } | Self::EmptyRegion => ErrorKind::Rejected,

            _ => ErrorKind::InvariantViolation,
        }
    }

    /// Fatal errors stop the enclosing pass; the rest surface as "not changed".
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Rejected)
    }
}
