//! Common imports for writing fusion passes.
//!
//! ```rust,ignore
//! use kiln_ir::prelude::*;
//! ```

// Graph
pub use crate::attr::{AttrValue, Attrs};
pub use crate::graph::Graph;
pub use crate::node::{EdgeRef, InputAnchor, NodeId, OutputAnchor};
pub use crate::types::{DataType, OpCategory, OpType, TensorDesc};

// Patterns
pub use crate::pattern::{
    BranchArity, ConnectFlags, INPUT_NODE, Mapping, Matcher, OUTPUT_NODE, Pattern, REPEAT_UNBOUNDED, SlotTypes,
};

// Rewriting and synthesis
pub use crate::subgraph::{ControlFlowNode, Subgraph, attach_control_flow, build_subgraph};

pub use crate::error::{Error, Result};
