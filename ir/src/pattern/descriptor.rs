//! Pattern descriptors and their builder.
//!
//! A pattern is a set of named slots joined by directed producer-to-consumer
//! connections. One slot is the head: the matcher anchors every attempt on a
//! graph node admitted by the head slot and walks outward from there.
//!
//! ```ignore
//! let pattern = Pattern::builder("conv_elemwise")
//!     .add_slot("conv", OpCategory::Convolution, 1, 1)
//!     .add_slot("elemwise", OpCategory::ElemWise, 0, 1)
//!     .add_slot("output", OUTPUT_NODE, 0, REPEAT_UNBOUNDED)
//!     .set_head(&["conv"])
//!     .connect("conv", &["elemwise", "output"], BranchArity::Multi)
//!     .build()?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use enumset::EnumSet;
use smallvec::SmallVec;
use snafu::ensure;
use tracing::debug;

use crate::error::*;
use crate::types::{OpCategory, OpType};

/// Upper cardinality bound meaning "no limit".
pub const REPEAT_UNBOUNDED: usize = usize::MAX;

/// Sentinel slot type matching any consumer of a bound producer. Nodes bound
/// to it constrain fan-out shape but are never part of the fused set.
pub const OUTPUT_NODE: SlotTypes = SlotTypes::Sentinel(Sentinel::Output);

/// Sentinel slot type matching any producer of a bound consumer.
pub const INPUT_NODE: SlotTypes = SlotTypes::Sentinel(Sentinel::Input);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Sentinel {
    #[strum(serialize = "OUTPUT_NODE")]
    Output,
    #[strum(serialize = "INPUT_NODE")]
    Input,
}

/// Admissible operator types: any listed category or any listed concrete name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    pub categories: EnumSet<OpCategory>,
    pub names: SmallVec<[String; 2]>,
}

impl TypeFilter {
    pub fn admits(&self, op: &OpType) -> bool {
        self.categories.contains(op.category()) || self.names.iter().any(|name| op.is(name))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTypes {
    Ops(TypeFilter),
    Sentinel(Sentinel),
}

impl SlotTypes {
    pub fn category(category: OpCategory) -> Self {
        Self::Ops(TypeFilter { categories: EnumSet::only(category), names: SmallVec::new() })
    }

    pub fn categories(categories: impl IntoIterator<Item = OpCategory>) -> Self {
        Self::Ops(TypeFilter { categories: categories.into_iter().collect(), names: SmallVec::new() })
    }

    /// Concrete operator names.
    pub fn ops(names: &[&str]) -> Self {
        Self::Ops(TypeFilter { categories: EnumSet::empty(), names: names.iter().map(|n| n.to_string()).collect() })
    }

    /// Adds a concrete name to an operator filter. Sentinels are left alone.
    pub fn or_op(mut self, name: &str) -> Self {
        if let Self::Ops(filter) = &mut self {
            filter.names.push(name.to_string());
        }
        self
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Self::Sentinel(sentinel) => Some(*sentinel),
            Self::Ops(_) => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel().is_some()
    }

    /// Sentinels admit everything.
    pub fn admits(&self, op: &OpType) -> bool {
        match self {
            Self::Ops(filter) => filter.admits(op),
            Self::Sentinel(_) => true,
        }
    }
}

impl From<OpCategory> for SlotTypes {
    fn from(category: OpCategory) -> Self {
        Self::category(category)
    }
}

impl From<EnumSet<OpCategory>> for SlotTypes {
    fn from(categories: EnumSet<OpCategory>) -> Self {
        Self::Ops(TypeFilter { categories, names: SmallVec::new() })
    }
}

impl From<Sentinel> for SlotTypes {
    fn from(sentinel: Sentinel) -> Self {
        Self::Sentinel(sentinel)
    }
}

impl fmt::Display for SlotTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel(sentinel) => write!(f, "{sentinel}"),
            Self::Ops(filter) => {
                let categories = filter.categories.iter().map(|c| c.to_string());
                let names = filter.names.iter().cloned();
                let all: Vec<String> = categories.chain(names).collect();
                write!(f, "{{{}}}", all.join(", "))
            }
        }
    }
}

/// Index of a slot within its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("#{_0}")]
pub struct SlotId(pub(crate) u16);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub types: SlotTypes,
    /// Minimum number of bound nodes.
    pub min: usize,
    /// Maximum number of bound nodes, [`REPEAT_UNBOUNDED`] for no limit.
    pub max: usize,
}

impl Slot {
    pub fn is_sentinel(&self) -> bool {
        self.types.is_sentinel()
    }

    pub fn admits_count(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum BranchArity {
    /// Every node bound to the producer slot has exactly one consumer edge
    /// across all of its outputs.
    #[default]
    Single,
    /// Fan-out is allowed; consumers not bound to a listed slot stay outside
    /// the fused set.
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectFlags {
    /// Skip the undeclared-input check on the consumer slots.
    pub ignore_input_count: bool,
    /// Skip the single-consumer check on the producer slot.
    pub ignore_output_count: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub producer: SlotId,
    pub consumers: SmallVec<[SlotId; 4]>,
    pub arity: BranchArity,
    pub flags: ConnectFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Producer,
    Consumer,
}

/// One slot binding in matcher order. `via` is the connection through which
/// the slot is reached; its other side is already bound when the step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub slot: SlotId,
    pub via: usize,
    pub role: Role,
}

#[derive(Debug)]
struct PatternInner {
    name: String,
    slots: Vec<Slot>,
    head: SlotId,
    connections: Vec<Connection>,
    steps: Vec<Step>,
    by_name: HashMap<String, SlotId>,
    /// Slots whose nodes must have exactly one consumer edge.
    single_output: Vec<bool>,
    /// Declared producer slots per slot.
    producers_of: Vec<SmallVec<[SlotId; 2]>>,
    /// Consumer slots exempt from the undeclared-input check.
    ignore_inputs: Vec<bool>,
}

/// Immutable, cheaply cloneable pattern. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct Pattern(Arc<PatternInner>);

impl Pattern {
    pub fn builder(name: impl Into<String>) -> PatternBuilder {
        PatternBuilder { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn slots(&self) -> &[Slot] {
        &self.0.slots
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.0.slots[id.index()]
    }

    pub fn slot_id(&self, name: &str) -> Option<SlotId> {
        self.0.by_name.get(name).copied()
    }

    pub fn head(&self) -> SlotId {
        self.0.head
    }

    pub fn connections(&self) -> &[Connection] {
        &self.0.connections
    }

    pub(crate) fn steps(&self) -> &[Step] {
        &self.0.steps
    }

    pub(crate) fn single_output(&self, id: SlotId) -> bool {
        self.0.single_output[id.index()]
    }

    pub(crate) fn producers_of(&self, id: SlotId) -> &[SlotId] {
        &self.0.producers_of[id.index()]
    }

    pub(crate) fn ignores_inputs(&self, id: SlotId) -> bool {
        self.0.ignore_inputs[id.index()]
    }

    /// Whether `op` can be bound to `id` with the given consumer edge count.
    pub(crate) fn fits(&self, id: SlotId, op: &OpType, consumer_edges: usize) -> bool {
        self.slot(id).types.admits(op) && (!self.single_output(id) || consumer_edges == 1)
    }

    pub fn same(&self, other: &Pattern) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone)]
struct PendingConnection {
    producer: String,
    consumers: Vec<String>,
    arity: BranchArity,
    flags: ConnectFlags,
}

/// Fluent pattern builder. Errors are recorded and reported by
/// [`build`](PatternBuilder::build), so calls can be chained freely.
#[derive(Debug, Clone, Default)]
pub struct PatternBuilder {
    name: String,
    slots: Vec<Slot>,
    head: Option<Vec<String>>,
    connections: Vec<PendingConnection>,
    errors: Vec<Error>,
}

impl PatternBuilder {
    pub fn add_slot(&mut self, name: &str, types: impl Into<SlotTypes>, min: usize, max: usize) -> &mut Self {
        if self.slots.iter().any(|slot| slot.name == name) {
            self.errors.push(Error::DuplicateSlot { pattern: self.name.clone(), slot: name.to_string() });
            return self;
        }
        self.slots.push(Slot { name: name.to_string(), types: types.into(), min, max });
        self
    }

    /// Slot bound to exactly one node.
    pub fn add_op(&mut self, name: &str, types: impl Into<SlotTypes>) -> &mut Self {
        self.add_slot(name, types, 1, 1)
    }

    pub fn set_head(&mut self, slots: &[&str]) -> &mut Self {
        for slot in slots {
            self.require_declared(slot);
        }
        self.head = Some(slots.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn connect(&mut self, producer: &str, consumers: &[&str], arity: BranchArity) -> &mut Self {
        self.connect_with(producer, consumers, arity, ConnectFlags::default())
    }

    pub fn connect_with(
        &mut self,
        producer: &str,
        consumers: &[&str],
        arity: BranchArity,
        flags: ConnectFlags,
    ) -> &mut Self {
        self.require_declared(producer);
        for consumer in consumers {
            self.require_declared(consumer);
        }
        self.connections.push(PendingConnection {
            producer: producer.to_string(),
            consumers: consumers.iter().map(|c| c.to_string()).collect(),
            arity,
            flags,
        });
        self
    }

    fn require_declared(&mut self, slot: &str) {
        if !self.slots.iter().any(|s| s.name == slot) {
            self.errors.push(Error::UnknownSlot { pattern: self.name.clone(), slot: slot.to_string() });
        }
    }

    pub fn build(&self) -> Result<Pattern> {
        if let Some(error) = self.errors.first() {
            return Err(error.clone());
        }
        let pattern = self.name.as_str();

        let by_name: HashMap<String, SlotId> =
            self.slots.iter().enumerate().map(|(i, slot)| (slot.name.clone(), SlotId(i as u16))).collect();

        for slot in &self.slots {
            ensure!(
                slot.max >= 1 && slot.min <= slot.max,
                InvalidCardinalitySnafu { pattern, slot: &slot.name, min: slot.min, max: slot.max }
            );
            if let SlotTypes::Ops(filter) = &slot.types {
                ensure!(!filter.is_empty(), EmptyTypeSetSnafu { pattern, slot: &slot.name });
            }
        }

        let heads = self.head.as_ref().ok_or_else(|| Error::MissingHead { pattern: pattern.to_string() })?;
        ensure!(!heads.is_empty(), MissingHeadSnafu { pattern });
        ensure!(heads.len() == 1, MultipleHeadsSnafu { pattern, heads: heads.clone() });
        let resolve = |slot: &String| by_name.get(slot).copied().ok_or_else(|| unknown(pattern, slot));
        let head = resolve(&heads[0])?;
        ensure!(!self.slots[head.index()].is_sentinel(), SentinelHeadSnafu { pattern, slot: &heads[0] });

        let mut connections = Vec::with_capacity(self.connections.len());
        for pending in &self.connections {
            ensure!(!pending.consumers.is_empty(), EmptyConnectionSnafu { pattern, slot: &pending.producer });
            let producer = resolve(&pending.producer)?;
            ensure!(
                self.slots[producer.index()].types.sentinel() != Some(Sentinel::Output),
                MisplacedSentinelSnafu { pattern, slot: &pending.producer }
            );
            let mut consumers: SmallVec<[SlotId; 4]> = SmallVec::new();
            for name in &pending.consumers {
                let id = resolve(name)?;
                ensure!(
                    self.slots[id.index()].types.sentinel() != Some(Sentinel::Input),
                    MisplacedSentinelSnafu { pattern, slot: name }
                );
                if id != producer && !consumers.contains(&id) {
                    consumers.push(id);
                }
            }
            // Typed slots claim consumers before sentinels soak up the rest.
            consumers.sort_by_key(|id| self.slots[id.index()].is_sentinel());
            connections.push(Connection { producer, consumers, arity: pending.arity, flags: pending.flags });
        }

        let steps = plan(head, self.slots.len(), &connections);
        let mut reached = vec![false; self.slots.len()];
        reached[head.index()] = true;
        for step in &steps {
            reached[step.slot.index()] = true;
        }
        if let Some(index) = reached.iter().position(|r| !r) {
            return UnreachableSlotSnafu { pattern, slot: &self.slots[index].name }.fail();
        }

        let mut single_output = vec![false; self.slots.len()];
        let mut producers_of: Vec<SmallVec<[SlotId; 2]>> = vec![SmallVec::new(); self.slots.len()];
        let mut ignore_inputs = vec![false; self.slots.len()];
        for conn in &connections {
            if conn.arity == BranchArity::Single && !conn.flags.ignore_output_count {
                single_output[conn.producer.index()] = true;
            }
            for &consumer in &conn.consumers {
                if !producers_of[consumer.index()].contains(&conn.producer) {
                    producers_of[consumer.index()].push(conn.producer);
                }
                ignore_inputs[consumer.index()] |= conn.flags.ignore_input_count;
            }
        }

        debug!(pattern, slots = self.slots.len(), connections = connections.len(), "pattern built");
        Ok(Pattern(Arc::new(PatternInner {
            name: self.name.clone(),
            slots: self.slots.clone(),
            head,
            connections,
            steps,
            by_name,
            single_output,
            producers_of,
            ignore_inputs,
        })))
    }
}

fn unknown(pattern: &str, slot: &str) -> Error {
    Error::UnknownSlot { pattern: pattern.to_string(), slot: slot.to_string() }
}

/// Breadth-first binding order from the head over connections, treated as
/// undirected. Within a connection the producer is bound before consumers.
fn plan(head: SlotId, slots: usize, connections: &[Connection]) -> Vec<Step> {
    let mut scheduled = vec![false; slots];
    let mut visited = vec![false; connections.len()];
    let mut queue = VecDeque::from([head]);
    let mut steps = Vec::new();
    scheduled[head.index()] = true;

    while let Some(slot) = queue.pop_front() {
        for (via, conn) in connections.iter().enumerate() {
            if visited[via] || (conn.producer != slot && !conn.consumers.contains(&slot)) {
                continue;
            }
            visited[via] = true;
            if !scheduled[conn.producer.index()] {
                scheduled[conn.producer.index()] = true;
                steps.push(Step { slot: conn.producer, via, role: Role::Producer });
                queue.push_back(conn.producer);
            }
            for &consumer in &conn.consumers {
                if !scheduled[consumer.index()] {
                    scheduled[consumer.index()] = true;
                    steps.push(Step { slot: consumer, via, role: Role::Consumer });
                    queue.push_back(consumer);
                }
            }
        }
    }
    steps
}
