//! Graph rewrite API.
//!
//! Primitives for adding, linking, and removing nodes, plus the higher-level
//! helpers fusion passes are built from: typestate node removal
//! ([`Graph::isolate`]), region fusion ([`Graph::fuse_region`]), and
//! committed rewrite transactions ([`Graph::transaction`]).

pub mod fuse;
pub mod primitives;
pub mod removal;
pub mod transaction;

pub use removal::{Attached, Isolated, NodeRemoval};
pub use transaction::{Transaction, TransactionSummary};
