//! Subgraph matcher.
//!
//! # Algorithm
//!
//! Every graph node admitted by the head slot is a head candidate, tried in
//! topological order. From a candidate the matcher binds the remaining slots
//! in the pattern's breadth-first plan order:
//!
//! - A consumer slot draws candidates from the data consumers of the nodes
//!   bound to its producer slot.
//! - A producer slot reached backwards draws from the producers of the nodes
//!   bound to its consumer slots.
//!
//! Constraints are checked as soon as the slots they relate are bound. A
//! candidate is dropped before any binding is formed if it fails on its own:
//! wrong type or fan-out, no edge from a bound producer, a read from a
//! matched node outside its declared producers, or a read from a sibling
//! that the connection's sentinel is bound to absorb. Two candidates of one
//! slot where one reads the other never share a binding. The remaining
//! set-level constraint (every bound consumer is fed by the new binding) is
//! checked per binding before the walk proceeds.
//!
//! Typed slots try the largest admissible binding first, so the walk is
//! greedy, and fall back to smaller bindings on failure. Sentinel slots take
//! every candidate left over once the typed slots of the same connection
//! have claimed theirs. A complete binding is accepted only if
//! [`Pattern::check`] passes.
//!
//! Backtracking never crosses head candidates. Each candidate has a budget of
//! binding alternatives ([`MatcherConfig::max_alternatives`]). When the
//! largest-first walk runs out of budget, the head is retried once with a
//! fresh budget trying the smallest bindings first, so a head is never
//! abandoned before its small bindings were tried.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use super::descriptor::{Pattern, Role, SlotId, Step};
use super::mapping::{Binding, Mapping};
use crate::config::MatcherConfig;
use crate::graph::Graph;
use crate::node::NodeId;

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Every mapping of `pattern` in `graph`, at most one per head node.
    #[tracing::instrument(skip_all, fields(pattern = pattern.name(), nodes = graph.node_count()))]
    pub fn match_all(&self, graph: &Graph, pattern: &Pattern) -> Vec<Mapping> {
        let head = pattern.head();
        let mut mappings = Vec::new();
        let mut claimed: HashSet<NodeId> = HashSet::new();
        let mut abandoned = 0usize;
        let order = graph.topological_order().unwrap_or_else(|_| {
            debug!("graph has a cycle, trying head candidates in id order");
            graph.node_ids()
        });

        for node in order.into_iter().filter_map(|id| graph.get(id)) {
            if self.config.max_matches.is_some_and(|cap| mappings.len() >= cap) {
                break;
            }
            if !pattern.fits(head, node.op(), node.consumer_edge_count()) {
                continue;
            }

            let (found, exhausted) = self.search(graph, pattern, node.id());
            if exhausted {
                abandoned += 1;
            }
            let Some(mapping) = found else {
                continue;
            };

            if !self.config.allow_overlap {
                let matched = mapping.matched_nodes();
                if matched.iter().any(|id| claimed.contains(id)) {
                    trace!(head = %node.id(), "overlapping mapping dropped");
                    continue;
                }
                claimed.extend(matched);
            }
            mappings.push(mapping);
        }

        debug!(matches = mappings.len(), abandoned, "match_all finished");
        mappings
    }

    /// Attempts a single match anchored on `head`.
    pub fn match_at(&self, graph: &Graph, pattern: &Pattern, head: NodeId) -> Option<Mapping> {
        let node = graph.get(head)?;
        if !pattern.fits(pattern.head(), node.op(), node.consumer_edge_count()) {
            return None;
        }
        self.search(graph, pattern, head).0
    }

    /// Largest-first search, retried smallest-first if the budget ran out.
    /// The flag reports whether the first walk was cut short.
    fn search(&self, graph: &Graph, pattern: &Pattern, head: NodeId) -> (Option<Mapping>, bool) {
        let budget = self.config.max_alternatives;
        let mut search = Search { graph, pattern, budget, exhausted: false, order: SizeOrder::LargestFirst };
        let found = search.run(head);
        if found.is_some() || !search.exhausted {
            return (found, search.exhausted);
        }

        debug!(head = %head, budget, "match budget exhausted, retrying smallest bindings first");
        let mut retry = Search { graph, pattern, budget, exhausted: false, order: SizeOrder::SmallestFirst };
        (retry.run(head), true)
    }
}

/// [`Matcher::match_all`] with the default configuration.
pub fn match_all(graph: &Graph, pattern: &Pattern) -> Vec<Mapping> {
    Matcher::default().match_all(graph, pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeOrder {
    LargestFirst,
    SmallestFirst,
}

struct Search<'a> {
    graph: &'a Graph,
    pattern: &'a Pattern,
    budget: usize,
    exhausted: bool,
    order: SizeOrder,
}

impl<'a> Search<'a> {
    fn run(&mut self, head: NodeId) -> Option<Mapping> {
        let mut bindings: Vec<Option<Binding>> = vec![None; self.pattern.slots().len()];
        bindings[self.pattern.head().index()] = Some(Binding::from_slice(&[head]));
        self.extend(0, &mut bindings)
    }

    fn extend(&mut self, index: usize, bindings: &mut Vec<Option<Binding>>) -> Option<Mapping> {
        let pattern: &'a Pattern = self.pattern;
        let Some(&step) = pattern.steps().get(index) else {
            return self.finish(bindings);
        };

        let slot = pattern.slot(step.slot);
        let owners = owners(bindings);
        let pool = self.pool(step, bindings, &owners);
        let admitted: Vec<NodeId> = pool
            .iter()
            .copied()
            .filter(|&id| self.fits(step, id))
            .filter(|&id| self.admissible(step, id, bindings, &owners, &pool))
            .collect();

        let alternatives: Box<dyn Iterator<Item = Binding>> = if slot.is_sentinel() {
            // The sentinel binding is forced: every leftover candidate.
            let fitting = pool.iter().filter(|&&id| self.fits(step, id)).count();
            if admitted.len() == fitting && slot.admits_count(admitted.len()) {
                Box::new(std::iter::once(admitted.into_iter().collect()))
            } else {
                Box::new(std::iter::empty())
            }
        } else {
            let hi = slot.max.min(admitted.len());
            let sizes: Vec<usize> = match self.order {
                _ if hi < slot.min => Vec::new(),
                SizeOrder::LargestFirst => (slot.min..=hi).rev().collect(),
                SizeOrder::SmallestFirst => (slot.min..=hi).collect(),
            };
            Box::new(Subsets::new(self.clashes(step, &admitted), admitted, sizes))
        };

        for alternative in alternatives {
            if self.budget == 0 {
                self.exhausted = true;
                break;
            }
            self.budget -= 1;
            if !self.covers(step, &alternative, bindings) {
                continue;
            }
            bindings[step.slot.index()] = Some(alternative);
            if let Some(mapping) = self.extend(index + 1, bindings) {
                return Some(mapping);
            }
            if self.exhausted {
                break;
            }
        }
        bindings[step.slot.index()] = None;
        None
    }

    /// Unbound neighbours of the other side of `step.via`, in id order.
    fn pool(&self, step: Step, bindings: &[Option<Binding>], owners: &HashMap<NodeId, SlotId>) -> BTreeSet<NodeId> {
        let conn = &self.pattern.connections()[step.via];
        let pool: BTreeSet<NodeId> = match step.role {
            Role::Consumer => bindings[conn.producer.index()]
                .iter()
                .flatten()
                .filter_map(|&id| self.graph.get(id))
                .flat_map(|node| node.outputs().iter().flatten().map(|to| to.node))
                .collect(),
            Role::Producer => conn
                .consumers
                .iter()
                .filter_map(|c| bindings[c.index()].as_ref())
                .flatten()
                .filter_map(|&id| self.graph.get(id))
                .flat_map(|node| node.inputs().iter().flatten().map(|from| from.node))
                .collect(),
        };
        pool.into_iter().filter(|id| !owners.contains_key(id)).collect()
    }

    fn fits(&self, step: Step, id: NodeId) -> bool {
        self.graph.get(id).is_some_and(|node| self.pattern.fits(step.slot, node.op(), node.consumer_edge_count()))
    }

    /// Whether a typed slot checks its nodes' inputs against matched nodes.
    fn guards_inputs(&self, slot: SlotId) -> bool {
        !self.pattern.slot(slot).is_sentinel()
            && !self.pattern.ignores_inputs(slot)
            && !self.pattern.producers_of(slot).is_empty()
    }

    /// Constraints `id` must meet on its own to be bound to `step.slot`.
    fn admissible(
        &self,
        step: Step,
        id: NodeId,
        bindings: &[Option<Binding>],
        owners: &HashMap<NodeId, SlotId>,
        pool: &BTreeSet<NodeId>,
    ) -> bool {
        let pattern = self.pattern;
        let Some(node) = self.graph.get(id) else { return false };
        let reads = |from: &[NodeId]| node.inputs().iter().flatten().any(|input| from.contains(&input.node));

        // Fed by every bound, non-empty producer slot it consumes from.
        for conn in pattern.connections().iter().filter(|conn| conn.consumers.contains(&step.slot)) {
            if let Some(producers) = &bindings[conn.producer.index()]
                && !producers.is_empty()
                && !reads(producers.as_slice())
            {
                return false;
            }
        }

        // Bound typed consumers may only read it if this slot is declared for them.
        for to in node.outputs().iter().flatten() {
            if let Some(&reader) = owners.get(&to.node)
                && self.guards_inputs(reader)
                && !pattern.producers_of(reader).contains(&step.slot)
            {
                return false;
            }
        }

        if !self.guards_inputs(step.slot) {
            return true;
        }
        let declared = pattern.producers_of(step.slot);
        let conn = &pattern.connections()[step.via];
        // An unbound sentinel consumer will absorb every sibling left unbound.
        let absorbing = step.role == Role::Consumer
            && conn.consumers.iter().any(|&c| pattern.slot(c).is_sentinel() && bindings[c.index()].is_none());

        node.inputs().iter().flatten().all(|input| {
            if let Some(owner) = owners.get(&input.node) {
                return declared.contains(owner);
            }
            if !absorbing || input.node == id || !pool.contains(&input.node) {
                return true;
            }
            // The sibling will be matched, so some unbound declared slot must be able to take it.
            let Some(sibling) = self.graph.get(input.node) else { return true };
            declared.iter().any(|&slot| {
                bindings[slot.index()].is_none()
                    && (pattern.slot(slot).is_sentinel()
                        || pattern.fits(slot, sibling.op(), sibling.consumer_edge_count()))
            })
        })
    }

    /// `clash[i][j]` when candidates `i` and `j` cannot share a typed slot.
    fn clashes(&self, step: Step, candidates: &[NodeId]) -> Vec<Vec<bool>> {
        let n = candidates.len();
        let mut clash = vec![vec![false; n]; n];
        if !self.guards_inputs(step.slot) || self.pattern.producers_of(step.slot).contains(&step.slot) {
            return clash;
        }
        for (i, &id) in candidates.iter().enumerate() {
            let Some(node) = self.graph.get(id) else { continue };
            for input in node.inputs().iter().flatten() {
                if let Some(j) = candidates.iter().position(|&other| other == input.node)
                    && i != j
                {
                    clash[i][j] = true;
                    clash[j][i] = true;
                }
            }
        }
        clash
    }

    /// Every node already bound to a consumer slot of a connection produced
    /// by `step.slot` must read from the new binding.
    fn covers(&self, step: Step, binding: &[NodeId], bindings: &[Option<Binding>]) -> bool {
        if binding.is_empty() {
            return true;
        }
        self.pattern.connections().iter().filter(|conn| conn.producer == step.slot).all(|conn| {
            conn.consumers.iter().filter_map(|c| bindings[c.index()].as_ref()).flatten().all(|&consumer| {
                self.graph
                    .get(consumer)
                    .is_some_and(|node| node.inputs().iter().flatten().any(|from| binding.contains(&from.node)))
            })
        })
    }

    fn finish(&self, bindings: &[Option<Binding>]) -> Option<Mapping> {
        let mapping = Mapping::new(self.pattern.clone(), bindings.iter().map(|b| b.clone().unwrap_or_default()).collect());
        match self.pattern.check(self.graph, &mapping) {
            Ok(()) => Some(mapping),
            Err(mismatch) => {
                trace!(%mismatch, "candidate mapping rejected");
                None
            }
        }
    }
}

fn owners(bindings: &[Option<Binding>]) -> HashMap<NodeId, SlotId> {
    bindings
        .iter()
        .enumerate()
        .filter_map(|(index, binding)| binding.as_ref().map(|b| (SlotId(index as u16), b)))
        .flat_map(|(slot, binding)| binding.iter().map(move |&id| (id, slot)))
        .collect()
}

/// Subsets of `items` with no clashing pair, one size at a time, each size
/// in lexicographic order.
struct Subsets {
    items: Vec<NodeId>,
    clash: Vec<Vec<bool>>,
    sizes: std::vec::IntoIter<usize>,
    size: Option<usize>,
    picks: Vec<usize>,
    cursor: usize,
}

impl Subsets {
    fn new(clash: Vec<Vec<bool>>, items: Vec<NodeId>, sizes: Vec<usize>) -> Self {
        Self { items, clash, sizes: sizes.into_iter(), size: None, picks: Vec::new(), cursor: 0 }
    }

    fn next_of_size(&mut self, size: usize) -> Option<Binding> {
        if size == 0 {
            // The empty binding is yielded once.
            let first = self.cursor == 0;
            self.cursor = 1;
            return first.then(Binding::new);
        }
        loop {
            if self.picks.len() == size {
                let found = self.picks.iter().map(|&i| self.items[i]).collect();
                if let Some(last) = self.picks.pop() {
                    self.cursor = last + 1;
                }
                return Some(found);
            }
            if self.cursor + (size - self.picks.len()) > self.items.len() {
                let last = self.picks.pop()?;
                self.cursor = last + 1;
                continue;
            }
            let next = self.cursor;
            self.cursor += 1;
            if self.picks.iter().all(|&picked| !self.clash[picked][next]) {
                self.picks.push(next);
            }
        }
    }
}

impl Iterator for Subsets {
    type Item = Binding;

    fn next(&mut self) -> Option<Binding> {
        loop {
            let size = match self.size {
                Some(size) => size,
                None => {
                    let size = self.sizes.next()?;
                    self.size = Some(size);
                    self.picks.clear();
                    self.cursor = 0;
                    size
                }
            };
            if let Some(found) = self.next_of_size(size) {
                return Some(found);
            }
            self.size = None;
        }
    }
}
