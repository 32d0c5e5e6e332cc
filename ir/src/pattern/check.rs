//! Structural validation of a mapping against its pattern.
//!
//! A failed check is a [`Mismatch`], not an error: structural mismatches are
//! the normal outcome for most head candidates and are only traced.

use std::collections::HashMap;

use itertools::Itertools;

use super::descriptor::{BranchArity, Pattern, Sentinel};
use super::mapping::Mapping;
use crate::graph::Graph;
use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Mismatch {
    #[display("slot {slot:?} bound {count} node(s), allowed {min}..={max}")]
    Cardinality { slot: String, count: usize, min: usize, max: usize },

    #[display("slot {slot:?} refers to removed node {node}")]
    StaleBinding { slot: String, node: NodeId },

    #[display("slot {slot:?} does not admit {op} ({node})")]
    TypeRejected { slot: String, node: NodeId, op: String },

    #[display("node {node} is bound to more than one slot")]
    DoubleBinding { node: NodeId },

    #[display("head slot must bind exactly one node, got {count}")]
    Head { count: usize },

    #[display("slot {slot:?} node {node} has {consumers} consumer edge(s) on a single branch")]
    SingleBranch { slot: String, node: NodeId, consumers: usize },

    #[display("{node} in slot {consumer:?} is not connected to slot {producer:?}")]
    MissingEdge { producer: String, consumer: String, node: NodeId },

    #[display("{node} in slot {slot:?} reads from {producer}, bound outside its declared producers")]
    UndeclaredInput { slot: String, node: NodeId, producer: NodeId },
}

impl Pattern {
    /// Re-validates `mapping` against every cardinality, type, and adjacency
    /// constraint of this pattern.
    pub fn check(&self, graph: &Graph, mapping: &Mapping) -> Result<(), Mismatch> {
        let mut owner: HashMap<NodeId, usize> = HashMap::new();

        for (index, slot) in self.slots().iter().enumerate() {
            let id = super::SlotId(index as u16);
            let bound = mapping.binding(id);
            if !slot.admits_count(bound.len()) {
                return Err(Mismatch::Cardinality {
                    slot: slot.name.clone(),
                    count: bound.len(),
                    min: slot.min,
                    max: slot.max,
                });
            }
            for &node_id in bound {
                let node = graph.get(node_id).ok_or_else(|| Mismatch::StaleBinding { slot: slot.name.clone(), node: node_id })?;
                if owner.insert(node_id, index).is_some() {
                    return Err(Mismatch::DoubleBinding { node: node_id });
                }
                if !slot.types.admits(node.op()) {
                    return Err(Mismatch::TypeRejected {
                        slot: slot.name.clone(),
                        node: node_id,
                        op: node.op_name().to_string(),
                    });
                }
            }
        }

        let head = mapping.binding(self.head()).len();
        if head != 1 {
            return Err(Mismatch::Head { count: head });
        }

        for conn in self.connections() {
            let producer_slot = self.slot(conn.producer);
            let producers = mapping.binding(conn.producer);

            if conn.arity == BranchArity::Single && !conn.flags.ignore_output_count {
                for &node in producers {
                    let consumers = graph.get(node).map(|n| n.consumer_edge_count()).unwrap_or_default();
                    if consumers != 1 {
                        return Err(Mismatch::SingleBranch { slot: producer_slot.name.clone(), node, consumers });
                    }
                }
            }

            if producers.is_empty() {
                continue;
            }
            for &consumer in &conn.consumers {
                for &node in mapping.binding(consumer) {
                    let fed = graph
                        .get(node)
                        .is_some_and(|n| n.inputs().iter().flatten().any(|from| producers.contains(&from.node)));
                    if !fed {
                        return Err(Mismatch::MissingEdge {
                            producer: producer_slot.name.clone(),
                            consumer: self.slot(consumer).name.clone(),
                            node,
                        });
                    }
                }
            }

            if producer_slot.types.sentinel() == Some(Sentinel::Input) {
                let consumers: Vec<NodeId> =
                    conn.consumers.iter().flat_map(|&c| mapping.binding(c).iter().copied()).collect();
                for &node in producers {
                    let feeds = graph
                        .get(node)
                        .is_some_and(|n| n.outputs().iter().flatten().any(|to| consumers.contains(&to.node)));
                    if !feeds {
                        return Err(Mismatch::MissingEdge {
                            producer: producer_slot.name.clone(),
                            consumer: conn.consumers.iter().map(|&c| self.slot(c).name.as_str()).join("|"),
                            node,
                        });
                    }
                }
            }
        }

        // A typed consumer may only read matched nodes through declared connections.
        for (index, slot) in self.slots().iter().enumerate() {
            let id = super::SlotId(index as u16);
            if slot.is_sentinel() || self.ignores_inputs(id) || self.producers_of(id).is_empty() {
                continue;
            }
            let declared = self.producers_of(id);
            for &node_id in mapping.binding(id) {
                let Some(node) = graph.get(node_id) else { continue };
                for from in node.inputs().iter().flatten() {
                    let Some(&producer_slot) = owner.get(&from.node) else { continue };
                    if !declared.iter().any(|p| p.index() == producer_slot) {
                        return Err(Mismatch::UndeclaredInput {
                            slot: slot.name.clone(),
                            node: node_id,
                            producer: from.node,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
