//! patchwerk - dataflow execution for patch-style audio and message graphs
//!
//! Design principles:
//! - Units are small objects with numbered inlets and outlets
//! - Messages are timestamped atom lists, delivered synchronously and depth-first
//! - Signals move in fixed blocks of [`BLOCK_SIZE`] samples, in dependency order
//! - A graph has one sample rate, fixed at construction
//! - Other threads talk to a graph through a lock-free [`MessageHandle`]
//!
//! ```
//! use patchwerk::{Graph, Message};
//!
//! let mut graph = Graph::new(48_000.0);
//! let f = graph.add_object("f 440").unwrap();
//! let osc = graph.add_object("osc~").unwrap();
//! graph.connect(f, 0, osc, 0).unwrap();
//!
//! graph.send_message(f, 0, &Message::bang(0.0)).unwrap();
//! graph.process_block();
//! assert_eq!(graph.describe(osc).unwrap(), "osc~ 440");
//! ```

extern crate alloc;

pub mod dsp;
mod error;
mod factory;
mod graph;
mod message;
mod node;
pub mod nodes;
mod resources;
mod table;

pub use error::GraphError;
pub use factory::{Constructor, ObjectFactory};
pub use graph::{Graph, GraphConfig, MessageHandle, Pending, UnitId};
pub use message::{Atom, AtomType, Message};
pub use node::{
    Buffer, ConnectionType, MessageUnit, Outlets, ProcessContext, SignalPorts, SignalUnit, BLOCK_SIZE,
};
pub use resources::Resources;
pub use table::TableStore;
