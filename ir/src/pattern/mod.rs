//! Subgraph pattern matching.
//!
//! Patterns are declared once with [`PatternBuilder`] and matched many times
//! with [`Matcher`]. A successful match yields a [`Mapping`] from slot names
//! to the graph nodes bound to them; fusion passes feed that mapping into the
//! rewrite API.

pub mod check;
pub mod descriptor;
pub mod mapping;
pub mod matcher;

// =============================================================================
// Pattern Exports
// =============================================================================

pub use check::Mismatch;
pub use descriptor::{
    BranchArity, ConnectFlags, Connection, INPUT_NODE, OUTPUT_NODE, Pattern, PatternBuilder, REPEAT_UNBOUNDED,
    Sentinel, Slot, SlotId, SlotTypes, TypeFilter,
};
pub use mapping::{Binding, Mapping};
pub use matcher::{Matcher, match_all};
