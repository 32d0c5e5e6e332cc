//! Property-based tests for graph construction, matching, and rewriting.
//!
//! Uses proptest to verify invariants across randomly shaped graphs.
