//! Unit graph - owns units, connections and the message schedule

use alloc::boxed::Box;
use alloc::collections::{BinaryHeap, VecDeque};
use core::cmp::Ordering;
use core::fmt;

use hashbrown::HashMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::GraphError;
use crate::factory::ObjectFactory;
use crate::message::Message;
use crate::node::{Buffer, ConnectionType, MessageUnit, Outlets, ProcessContext, BLOCK_SIZE};
use crate::resources::Resources;
use crate::table::TableStore;

/// Identifies a unit within one [`Graph`].
///
/// Ids of removed units may be handed out again to units added later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(NodeIndex);

impl UnitId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// Graph settings, fixed at construction.
///
/// ```
/// # use patchwerk::GraphConfig;
/// let config = GraphConfig::new(48_000.0)
///     .with_message_queue_size(256)
///     .with_max_message_depth(64);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Capacity of the ring behind [`MessageHandle`]
    pub message_queue_size: usize,
    /// Deepest chain of synchronous deliveries before messages are dropped
    pub max_message_depth: usize,
}

impl GraphConfig {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    pub fn with_max_message_depth(mut self, depth: usize) -> Self {
        self.max_message_depth = depth;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            message_queue_size: 64,
            max_message_depth: 1000,
        }
    }
}

/// A message travelling through a [`MessageHandle`].
#[derive(Clone, Debug, PartialEq)]
pub struct Pending {
    pub unit: UnitId,
    pub inlet: usize,
    pub message: Message,
}

/// Sends messages into a [`Graph`] from another thread.
///
/// Messages are buffered in a lock-free ring buffer and moved into the
/// graph's schedule at the start of the next block, where they are delivered
/// in timestamp order like any [`Graph::schedule_message`] call.
pub struct MessageHandle {
    sender: Producer<Pending>,
}

impl MessageHandle {
    /// Queue `message` for `inlet` of `unit`.
    ///
    /// Returns `Err` with the message if the ring is full (message dropped).
    pub fn send(&mut self, unit: UnitId, inlet: usize, message: Message) -> Result<(), Pending> {
        self.sender
            .push(Pending { unit, inlet, message })
            .map_err(|rtrb::PushError::Full(p)| p)
    }

    /// Free slots in the ring.
    pub fn slots(&self) -> usize {
        self.sender.slots()
    }
}

#[derive(Clone, Copy, Debug)]
struct Connection {
    outlet: usize,
    inlet: usize,
    kind: ConnectionType,
    /// Creation order, for deterministic fan-out.
    seq: u64,
}

/// A message waiting for its timestamp.
struct Scheduled {
    timestamp: f64,
    seq: u64,
    target: NodeIndex,
    inlet: usize,
    message: Message,
}

// reversed, so the max-heap pops the earliest message first
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .total_cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

/// One signal unit in processing order, with the outlets that feed it.
struct Step {
    node: NodeIndex,
    /// `(source, outlet, inlet)`
    inputs: Vec<(NodeIndex, usize, usize)>,
}

type UnitGraph = StableDiGraph<Box<dyn MessageUnit>, Connection>;

/// A graph of units at a fixed sample rate.
///
/// The graph owns its units and their connections. Messages sent with
/// [`send_message`](Self::send_message) are delivered at once, depth-first;
/// messages given to [`schedule_message`](Self::schedule_message) or a
/// [`MessageHandle`] are delivered during [`process_block`](Self::process_block)
/// at the sample their timestamp falls on.
///
/// ```
/// # use patchwerk::{Graph, Message};
/// let mut graph = Graph::new(44_100.0);
/// let osc = graph.add_object("osc~ 440").unwrap();
/// graph.process_block();
/// assert_eq!(graph.signal_outlet(osc, 0).unwrap()[0], 1.0);
///
/// graph.send_message(osc, 0, &Message::float(0.0, 220.0)).unwrap();
/// assert_eq!(graph.describe(osc).unwrap(), "osc~ 220");
/// ```
pub struct Graph {
    units: UnitGraph,
    config: GraphConfig,
    factory: ObjectFactory,
    resources: Resources,
    tables: TableStore,

    schedule: BinaryHeap<Scheduled>,
    receiver: Consumer<Pending>,
    handle: Option<MessageHandle>,

    plan: Vec<Step>,
    plan_dirty: bool,

    blocks: u64,
    next_seq: u64,
}

impl Graph {
    /// Create a new graph with the given sample rate and default settings.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_config(GraphConfig::new(sample_rate))
    }

    pub fn with_config(config: GraphConfig) -> Self {
        let (producer, consumer) = RingBuffer::new(config.message_queue_size);
        Self {
            units: UnitGraph::with_capacity(64, 64),
            config,
            factory: ObjectFactory::standard(),
            resources: Resources::new(),
            tables: TableStore::new(),
            schedule: BinaryHeap::new(),
            receiver: consumer,
            handle: Some(MessageHandle { sender: producer }),
            plan: Vec::new(),
            plan_dirty: false,
            blocks: 0,
            next_seq: 0,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Logical time of the start of the next block, in milliseconds.
    pub fn current_time(&self) -> f64 {
        self.blocks as f64 * self.block_duration()
    }

    fn block_duration(&self) -> f64 {
        BLOCK_SIZE as f64 * 1000.0 / self.config.sample_rate as f64
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// The handle for sending messages from another thread. There is one per
    /// graph; later calls return `None`.
    pub fn take_message_handle(&mut self) -> Option<MessageHandle> {
        self.handle.take()
    }

    pub fn factory_mut(&mut self) -> &mut ObjectFactory {
        &mut self.factory
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TableStore {
        &mut self.tables
    }

    /// Live holders of the shared cosine table.
    pub fn cosine_table_refs(&self) -> usize {
        self.resources.cosine_table_refs()
    }

    pub fn len(&self) -> usize {
        self.units.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.units.node_count() == 0
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_node(id.0)
    }

    pub fn unit(&self, id: UnitId) -> Option<&dyn MessageUnit> {
        self.units.node_weight(id.0).map(|unit| &**unit)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut (dyn MessageUnit + 'static)> {
        self.units.node_weight_mut(id.0).map(|unit| &mut **unit)
    }

    pub fn describe(&self, id: UnitId) -> Option<String> {
        self.unit(id).map(|unit| unit.describe())
    }

    /// The last block written to a signal outlet.
    pub fn signal_outlet(&self, id: UnitId, outlet: usize) -> Option<&Buffer> {
        let ports = self.unit(id)?.as_signal()?.ports();
        (outlet < ports.num_outlets()).then(|| ports.outlet(outlet))
    }

    /// Add a unit to the graph.
    pub fn add<U: MessageUnit>(&mut self, unit: U) -> UnitId {
        self.add_boxed(Box::new(unit))
    }

    pub fn add_boxed(&mut self, unit: Box<dyn MessageUnit>) -> UnitId {
        let is_signal = unit.as_signal().is_some();
        let description = unit.describe();
        let id = UnitId(self.units.add_node(unit));
        if is_signal {
            self.plan_dirty = true;
        }
        tracing::debug!(%id, unit = %description, "added unit");
        id
    }

    /// Create a unit from an object line such as `"osc~ 440"` and add it.
    pub fn add_object(&mut self, line: &str) -> Result<UnitId, GraphError> {
        let unit = self.factory.create_from_line(line, &mut self.resources)?;
        Ok(self.add_boxed(unit))
    }

    /// Remove a unit and all its connections, returning it.
    ///
    /// Units that lose a signal input are told so.
    pub fn remove(&mut self, id: UnitId) -> Result<Box<dyn MessageUnit>, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::NoSuchUnit(id));
        }
        let mut fed: Vec<(NodeIndex, usize)> = self
            .units
            .edges_directed(id.0, Direction::Outgoing)
            .filter(|e| e.weight().kind == ConnectionType::Signal)
            .map(|e| (e.target(), e.weight().inlet))
            .collect();
        fed.sort_unstable();
        fed.dedup();

        let unit = self.units.remove_node(id.0).ok_or(GraphError::NoSuchUnit(id))?;
        for (target, inlet) in fed {
            self.refresh_inlet(target, inlet);
        }
        if unit.as_signal().is_some() {
            self.plan_dirty = true;
        }
        tracing::debug!(%id, unit = %unit.describe(), "removed unit");
        Ok(unit)
    }

    fn check_outlet(&self, id: UnitId, outlet: usize) -> Result<&dyn MessageUnit, GraphError> {
        let unit = self.unit(id).ok_or(GraphError::NoSuchUnit(id))?;
        if outlet >= unit.num_outlets() {
            return Err(GraphError::NoSuchOutlet { unit: id, outlet });
        }
        Ok(unit)
    }

    fn check_inlet(&self, id: UnitId, inlet: usize) -> Result<&dyn MessageUnit, GraphError> {
        let unit = self.unit(id).ok_or(GraphError::NoSuchUnit(id))?;
        if inlet >= unit.num_inlets() {
            return Err(GraphError::NoSuchInlet { unit: id, inlet });
        }
        Ok(unit)
    }

    fn find_connection(&self, from: UnitId, outlet: usize, to: UnitId, inlet: usize) -> Option<EdgeIndex> {
        self.units
            .edges_directed(from.0, Direction::Outgoing)
            .find(|e| e.target() == to.0 && e.weight().outlet == outlet && e.weight().inlet == inlet)
            .map(|e| e.id())
    }

    /// True if a chain of signal connections leads from `start` to `goal`.
    fn signal_path(&self, start: NodeIndex, goal: NodeIndex) -> bool {
        let mut stack = vec![start];
        let mut seen = vec![start];
        while let Some(node) = stack.pop() {
            if node == goal {
                return true;
            }
            for e in self.units.edges_directed(node, Direction::Outgoing) {
                if e.weight().kind == ConnectionType::Signal && !seen.contains(&e.target()) {
                    seen.push(e.target());
                    stack.push(e.target());
                }
            }
        }
        false
    }

    /// Connect `outlet` of `from` to `inlet` of `to`.
    ///
    /// Signal outlets may only feed signal inlets and may not close a loop of
    /// signal connections. Connecting the same pair twice does nothing.
    pub fn connect(&mut self, from: UnitId, outlet: usize, to: UnitId, inlet: usize) -> Result<(), GraphError> {
        let kind = self.check_outlet(from, outlet)?.outlet_type(outlet);
        let target = self.check_inlet(to, inlet)?;

        if kind == ConnectionType::Signal {
            let accepts = target
                .as_signal()
                .map_or(false, |unit| inlet < unit.ports().num_inlets());
            if !accepts {
                return Err(GraphError::NotASignalInlet { unit: to, inlet });
            }
            if self.signal_path(to.0, from.0) {
                return Err(GraphError::SignalCycle { from, to });
            }
        }

        if self.find_connection(from, outlet, to, inlet).is_some() {
            tracing::trace!(%from, outlet, %to, inlet, "already connected");
            return Ok(());
        }

        let seq = self.next_seq();
        self.units.add_edge(from.0, to.0, Connection { outlet, inlet, kind, seq });
        if kind == ConnectionType::Signal {
            self.refresh_inlet(to.0, inlet);
            self.plan_dirty = true;
        }
        tracing::debug!(%from, outlet, %to, inlet, ?kind, "connected");
        Ok(())
    }

    pub fn disconnect(&mut self, from: UnitId, outlet: usize, to: UnitId, inlet: usize) -> Result<(), GraphError> {
        let edge = self
            .find_connection(from, outlet, to, inlet)
            .ok_or(GraphError::NoSuchConnection { from, outlet, to, inlet })?;
        let connection = self.units.remove_edge(edge).ok_or(GraphError::NoSuchConnection { from, outlet, to, inlet })?;
        if connection.kind == ConnectionType::Signal {
            self.refresh_inlet(to.0, inlet);
            self.plan_dirty = true;
        }
        tracing::debug!(%from, outlet, %to, inlet, "disconnected");
        Ok(())
    }

    /// Recount the signal connections into `inlet` and tell the unit.
    fn refresh_inlet(&mut self, node: NodeIndex, inlet: usize) {
        let count = self
            .units
            .edges_directed(node, Direction::Incoming)
            .filter(|e| e.weight().kind == ConnectionType::Signal && e.weight().inlet == inlet)
            .count();
        let Some(unit) = self.units.node_weight_mut(node).and_then(|u| u.as_signal_mut()) else {
            return;
        };
        if unit.ports().connection_count(inlet) != count {
            unit.ports_mut().set_connection_count(inlet, count);
            unit.on_inlet_connection_update(inlet);
        }
    }

    /// Deliver `message` to `inlet` of `id` now, along with everything it
    /// causes downstream.
    pub fn send_message(&mut self, id: UnitId, inlet: usize, message: &Message) -> Result<(), GraphError> {
        self.check_inlet(id, inlet)?;
        self.deliver(id.0, inlet, message, 0);
        Ok(())
    }

    /// Queue `message` for `inlet` of `id`, to be delivered during the block
    /// containing its timestamp. Messages with equal timestamps keep their
    /// order.
    ///
    /// A message whose timestamp is not finite is delivered at the start of
    /// the next block.
    pub fn schedule_message(&mut self, id: UnitId, inlet: usize, message: Message) -> Result<(), GraphError> {
        self.check_inlet(id, inlet)?;
        self.enqueue(id.0, inlet, message);
        Ok(())
    }

    fn enqueue(&mut self, target: NodeIndex, inlet: usize, message: Message) {
        let timestamp = if message.timestamp().is_finite() {
            message.timestamp()
        } else {
            tracing::warn!(
                unit = target.index(),
                inlet,
                %message,
                timestamp = message.timestamp(),
                "timestamp not finite, delivering at next block"
            );
            f64::NEG_INFINITY
        };
        let seq = self.next_seq();
        self.schedule.push(Scheduled {
            timestamp,
            seq,
            target,
            inlet,
            message,
        });
    }

    fn deliver(&mut self, node: NodeIndex, inlet: usize, message: &Message, depth: usize) {
        if depth > self.config.max_message_depth {
            tracing::warn!(node = node.index(), inlet, %message, depth, "message recursion too deep, dropped");
            return;
        }
        let mut outlets = Outlets::new();
        match self.units.node_weight_mut(node) {
            Some(unit) => unit.process_message(inlet, message, &mut outlets),
            None => return,
        }
        self.forward(node, outlets, depth);
    }

    /// Send everything `node` put into `outlets`, in order, each through its
    /// outlet's connections in the order they were made.
    fn forward(&mut self, node: NodeIndex, mut outlets: Outlets, depth: usize) {
        for (outlet, message) in outlets.take() {
            let mut targets: Vec<(u64, NodeIndex, usize)> = self
                .units
                .edges_directed(node, Direction::Outgoing)
                .filter(|e| e.weight().kind == ConnectionType::Message && e.weight().outlet == outlet)
                .map(|e| (e.weight().seq, e.target(), e.weight().inlet))
                .collect();
            targets.sort_unstable_by_key(|&(seq, _, _)| seq);
            for (_, target, inlet) in targets {
                self.deliver(target, inlet, &message, depth + 1);
            }
        }
    }

    /// Order the signal units so that every unit runs after the units that
    /// feed it.
    fn rebuild_plan(&mut self) {
        let units = &self.units;
        let signal = |n: NodeIndex| units.node_weight(n).map_or(false, |u| u.as_signal().is_some());

        let nodes: Vec<NodeIndex> = units.node_indices().filter(|&n| signal(n)).collect();
        let mut pending: HashMap<NodeIndex, usize> = nodes
            .iter()
            .map(|&n| {
                let fed_by = units
                    .edges_directed(n, Direction::Incoming)
                    .filter(|e| e.weight().kind == ConnectionType::Signal)
                    .count();
                (n, fed_by)
            })
            .collect();

        let mut ready: VecDeque<NodeIndex> = nodes.iter().copied().filter(|n| pending[n] == 0).collect();
        let mut plan = Vec::with_capacity(nodes.len());
        while let Some(node) = ready.pop_front() {
            let mut inputs = Vec::new();
            for e in units.edges_directed(node, Direction::Incoming) {
                if e.weight().kind == ConnectionType::Signal {
                    inputs.push((e.source(), e.weight().outlet, e.weight().inlet));
                }
            }
            let mut downstream: Vec<NodeIndex> = units
                .edges_directed(node, Direction::Outgoing)
                .filter(|e| e.weight().kind == ConnectionType::Signal)
                .map(|e| e.target())
                .collect();
            downstream.sort_unstable();
            for target in downstream {
                if let Some(n) = pending.get_mut(&target) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(target);
                    }
                }
            }
            plan.push(Step { node, inputs });
        }

        // connect() refuses cycles, so every signal unit is placed
        debug_assert_eq!(plan.len(), nodes.len());
        tracing::debug!(units = plan.len(), "signal order rebuilt");
        self.plan = plan;
        self.plan_dirty = false;
    }

    /// Run every signal unit over `[from, to)` of the current block.
    fn run_signal(&mut self, from: usize, to: usize) {
        let plan = core::mem::take(&mut self.plan);
        let block_start = self.current_time();
        for step in &plan {
            gather(&mut self.units, step, from, to);

            let mut outlets = Outlets::new();
            let ctx = ProcessContext {
                sample_rate: self.config.sample_rate,
                block_size: BLOCK_SIZE,
                block_start,
                tables: &self.tables,
            };
            if let Some(unit) = self.units.node_weight_mut(step.node).and_then(|u| u.as_signal_mut()) {
                unit.process(&ctx, from, to, &mut outlets);
            }
            if !outlets.is_empty() {
                self.forward(step.node, outlets, 0);
            }
        }
        self.plan = plan;
    }

    /// Move messages from the [`MessageHandle`] ring into the schedule.
    fn drain_ingress(&mut self) {
        while let Ok(Pending { unit, inlet, message }) = self.receiver.pop() {
            self.enqueue(unit.0, inlet, message);
        }
    }

    /// Compute one block.
    ///
    /// Scheduled messages due before the end of the block are delivered in
    /// timestamp order, each after the signal units have run up to the sample
    /// its timestamp falls on. Messages already late are delivered at the
    /// start of the block.
    pub fn process_block(&mut self) {
        self.drain_ingress();
        if self.plan_dirty {
            self.rebuild_plan();
        }

        let block_start = self.current_time();
        let block_end = block_start + self.block_duration();
        let samples_per_ms = self.config.sample_rate as f64 / 1000.0;
        let mut cursor = 0;

        while self.schedule.peek().map_or(false, |s| s.timestamp < block_end) {
            let Some(next) = self.schedule.pop() else {
                break;
            };
            let offset = ((next.timestamp - block_start) * samples_per_ms).ceil();
            let offset = if offset > 0.0 { (offset as usize).min(BLOCK_SIZE) } else { 0 };
            if offset > cursor {
                self.run_signal(cursor, offset);
                cursor = offset;
            }

            let in_range = self
                .units
                .node_weight(next.target)
                .map_or(false, |unit| next.inlet < unit.num_inlets());
            if in_range {
                self.deliver(next.target, next.inlet, &next.message, 0);
            } else {
                tracing::warn!(
                    unit = next.target.index(),
                    inlet = next.inlet,
                    message = %next.message,
                    "scheduled message has no receiver, dropped"
                );
            }
        }

        if cursor < BLOCK_SIZE {
            self.run_signal(cursor, BLOCK_SIZE);
        }
        self.blocks += 1;
    }
}

/// Set each signal inlet of `step.node` over `[from, to)` to the sum of the
/// outlets feeding it.
fn gather(units: &mut UnitGraph, step: &Step, from: usize, to: usize) {
    let Some(unit) = units.node_weight_mut(step.node).and_then(|u| u.as_signal_mut()) else {
        return;
    };
    let ports = unit.ports_mut();
    for inlet in 0..ports.num_inlets() {
        ports.inlet_mut(inlet)[from..to].fill(0.0);
    }

    for &(source, outlet, inlet) in &step.inputs {
        let (src, dst) = units.index_twice_mut(source, step.node);
        let (Some(src), Some(dst)) = (src.as_signal(), dst.as_signal_mut()) else {
            continue;
        };
        let input = &src.ports().outlet(outlet)[from..to];
        for (d, s) in dst.ports_mut().inlet_mut(inlet)[from..to].iter_mut().zip(input) {
            *d += s;
        }
    }
}
