//! Single-writer rewrite transaction.
//!
//! A [`Transaction`] borrows the graph mutably for the duration of one
//! rewrite, derefs to [`Graph`] so every primitive is available, and on
//! [`commit`](Transaction::commit) prunes the scheduled candidates and runs
//! [`Graph::verify`]. There is no rollback: a transaction dropped without a
//! successful commit only logs a warning, and the caller is expected to
//! discard the graph.

use std::collections::{BTreeSet, HashSet};
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeId;

/// What a committed transaction changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub created: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub pruned: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Transaction<'g> {
    graph: &'g mut Graph,
    baseline: HashSet<NodeId>,
    prune: BTreeSet<NodeId>,
    committed: bool,
}

impl Graph {
    pub fn transaction(&mut self) -> Transaction<'_> {
        let baseline = self.nodes.keys().collect();
        Transaction { graph: self, baseline, prune: BTreeSet::new(), committed: false }
    }
}

impl Transaction<'_> {
    /// Marks nodes to be pruned at commit if they end up without consumers.
    pub fn schedule_prune(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.prune.extend(nodes);
    }

    /// Nodes added since the transaction started.
    pub fn created(&self) -> Vec<NodeId> {
        self.graph.nodes.keys().filter(|id| !self.baseline.contains(id)).collect()
    }

    pub fn commit(mut self) -> Result<TransactionSummary> {
        let candidates = std::mem::take(&mut self.prune);
        let pruned = self.graph.prune_dangling_outputs(candidates);
        self.graph.verify()?;

        let mut removed: Vec<NodeId> = self.baseline.iter().copied().filter(|id| !self.graph.contains(*id)).collect();
        removed.sort();
        let summary = TransactionSummary { created: self.created(), removed, pruned };
        self.committed = true;
        debug!(
            created = summary.created.len(),
            removed = summary.removed.len(),
            pruned = summary.pruned.len(),
            "transaction committed"
        );
        Ok(summary)
    }
}

impl Deref for Transaction<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            warn!(graph = self.graph.name(), "rewrite transaction dropped without a successful commit");
        }
    }
}
