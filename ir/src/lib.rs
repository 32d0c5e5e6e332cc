//! Graph IR and subgraph pattern-matching engine for operator fusion.
//!
//! This crate defines the dataflow graph that fusion passes operate on, the
//! pattern language used to describe fusible shapes, the matcher that finds
//! them, and the rewrite primitives that replace them.
//!
//! # Module Organization
//!
//! - [`types`] - Operator types, categories, and tensor descriptors
//! - [`attr`] - Typed node attributes
//! - [`node`] - Node ids, nodes, anchors, and edge references
//! - [`graph`] - The owned [`Graph`], queries, and verification
//! - [`rewrite`] - Mutation primitives, typestate removal, region fusion, transactions
//! - [`subgraph`] - Nested graphs and control-flow node synthesis
//! - [`pattern`] - Pattern builder, matcher, and mappings
//! - [`config`] - Matcher configuration
//! - [`error`] - Error types and result handling

pub mod attr;
pub mod config;
pub mod error;
pub mod graph;
pub mod node;
pub mod prelude;
pub mod types;

pub mod pattern;
pub mod rewrite;
pub mod subgraph;


pub use attr::{AttrValue, Attrs, TensorBlob};
pub use config::MatcherConfig;
pub use error::{Direction, Error, ErrorKind, Result};
pub use graph::Graph;
pub use node::{Edge, EdgeRef, InputAnchor, Node, NodeId, OutputAnchor};
pub use types::{DataType, OpCategory, OpType, Shape, TensorDesc};

// Re-export pattern matching and rewriting infrastructure
pub use pattern::{BranchArity, ConnectFlags, Mapping, Matcher, Mismatch, Pattern, PatternBuilder, match_all};
pub use rewrite::{NodeRemoval, Transaction, TransactionSummary};
pub use subgraph::{ControlFlow, ControlFlowNode, Subgraph, SubgraphScope, attach_control_flow, build_subgraph};
