//! Core unit traits and context types.

use alloc::vec::Vec;

use crate::message::Message;
use crate::table::TableStore;

/// Samples per signal block. Every [`SignalPorts`] buffer has this length.
pub const BLOCK_SIZE: usize = 64;

/// One block of samples.
pub type Buffer = [f32; BLOCK_SIZE];

/// Information available during signal processing.
///
/// Passed to every [`SignalUnit::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext<'a> {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: f32,
    /// Number of samples per buffer (always [`BLOCK_SIZE`])
    pub block_size: usize,
    /// Logical time of sample 0 of the current block, in milliseconds
    pub block_start: f64,
    /// Named tables owned by the graph
    pub tables: &'a TableStore,
}

impl ProcessContext<'_> {
    /// Logical time of sample `index` of the current block.
    #[inline]
    pub fn timestamp_at(&self, index: usize) -> f64 {
        self.block_start + index as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Whether an outlet carries messages or a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionType {
    Message,
    Signal,
}

/// Collects the messages a unit sends while it runs.
///
/// The graph delivers them after the unit returns, in the order they were
/// sent, each one depth-first through every connection of its outlet.
#[derive(Debug, Default)]
pub struct Outlets {
    pending: Vec<(usize, Message)>,
}

impl Outlets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `message` from `outlet`.
    #[inline]
    pub fn send(&mut self, outlet: usize, message: Message) {
        self.pending.push((outlet, message));
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> &[(usize, Message)] {
        &self.pending
    }

    /// Take everything sent so far, oldest first.
    pub fn take(&mut self) -> Vec<(usize, Message)> {
        core::mem::take(&mut self.pending)
    }
}

/// Signal buffers and connection state of a signal unit.
///
/// Inlet buffers are written by the graph (the sum of every upstream signal
/// feeding that inlet) before the unit runs, and read by the unit. Outlet
/// buffers are written by the unit and read downstream until the next block.
#[derive(Clone, Debug)]
pub struct SignalPorts {
    inlets: Vec<Buffer>,
    outlets: Vec<Buffer>,
    connections: Vec<usize>,
}

impl SignalPorts {
    /// Ports for a unit whose first `inlets` inlets and first `outlets`
    /// outlets carry signals.
    pub fn new(inlets: usize, outlets: usize) -> Self {
        Self {
            inlets: vec![[0.0; BLOCK_SIZE]; inlets],
            outlets: vec![[0.0; BLOCK_SIZE]; outlets],
            connections: vec![0; inlets],
        }
    }

    #[inline]
    pub fn num_inlets(&self) -> usize {
        self.inlets.len()
    }

    #[inline]
    pub fn num_outlets(&self) -> usize {
        self.outlets.len()
    }

    /// True if at least one signal connection feeds `inlet`.
    #[inline]
    pub fn has_signal(&self, inlet: usize) -> bool {
        self.connections.get(inlet).map_or(false, |&n| n > 0)
    }

    #[inline]
    pub fn inlet(&self, inlet: usize) -> &Buffer {
        &self.inlets[inlet]
    }

    #[inline]
    pub fn inlet_mut(&mut self, inlet: usize) -> &mut Buffer {
        &mut self.inlets[inlet]
    }

    #[inline]
    pub fn outlet(&self, outlet: usize) -> &Buffer {
        &self.outlets[outlet]
    }

    #[inline]
    pub fn outlet_mut(&mut self, outlet: usize) -> &mut Buffer {
        &mut self.outlets[outlet]
    }

    /// Borrow an inlet for reading and an outlet for writing at once.
    #[inline]
    pub fn split_mut(&mut self, inlet: usize, outlet: usize) -> (&Buffer, &mut Buffer) {
        (&self.inlets[inlet], &mut self.outlets[outlet])
    }

    /// Live signal connections into `inlet`.
    pub fn connection_count(&self, inlet: usize) -> usize {
        self.connections.get(inlet).copied().unwrap_or(0)
    }

    /// Kept up to date by [`Graph`](crate::Graph). Hosts driving a unit by
    /// hand call this, then [`SignalUnit::on_inlet_connection_update`].
    pub fn set_connection_count(&mut self, inlet: usize, count: usize) {
        if let Some(n) = self.connections.get_mut(inlet) {
            *n = count;
        }
    }
}

/// A node that reacts to messages.
///
/// Every unit is a message unit. Delivery is synchronous: the graph calls
/// [`process_message`](Self::process_message) and, once it returns, forwards
/// whatever the unit put into `outlets`.
///
/// Units never fail. Messages a unit does not understand, on any inlet, are
/// ignored.
pub trait MessageUnit: Send + 'static {
    /// Object name as written in a patch, e.g. `"osc~"`.
    fn label(&self) -> &'static str;

    fn num_inlets(&self) -> usize;

    fn num_outlets(&self) -> usize;

    /// Handle `message` arriving on `inlet`.
    fn process_message(&mut self, inlet: usize, message: &Message, outlets: &mut Outlets);

    /// What `outlet` carries. Message units only have message outlets.
    fn outlet_type(&self, _outlet: usize) -> ConnectionType {
        ConnectionType::Message
    }

    /// Human-readable description for diagnostics.
    fn describe(&self) -> String {
        self.label().to_string()
    }

    /// Signal capability, if this unit has one.
    fn as_signal(&self) -> Option<&dyn SignalUnit> {
        None
    }

    fn as_signal_mut(&mut self) -> Option<&mut dyn SignalUnit> {
        None
    }
}

/// A message unit that also owns signal buffers and runs once per block.
///
/// Implementors return `Some(self)` from [`MessageUnit::as_signal`] and
/// [`MessageUnit::as_signal_mut`].
pub trait SignalUnit: MessageUnit {
    fn ports(&self) -> &SignalPorts;

    fn ports_mut(&mut self) -> &mut SignalPorts;

    /// Called after a signal connection to `inlet` is added or removed.
    ///
    /// [`SignalPorts::has_signal`] already reflects the change. Units that
    /// compute differently with and without a signal input pick their
    /// strategy here, once, instead of testing per sample.
    fn on_inlet_connection_update(&mut self, _inlet: usize) {}

    /// Compute samples `[from, to)` of every signal outlet.
    ///
    /// Must write each outlet over exactly that range and read inlets only
    /// within it. Called back to back across blocks and sub-blocks; state
    /// carries over between calls.
    fn process(&mut self, ctx: &ProcessContext, from: usize, to: usize, outlets: &mut Outlets);
}
