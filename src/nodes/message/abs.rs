//! Absolute value

use crate::message::Message;
use crate::node::{MessageUnit, Outlets};

/// `[abs]`: replies to a float with its absolute value.
///
/// Floats on any inlet are answered on outlet 0 with the incoming timestamp.
#[derive(Clone, Debug, Default)]
pub struct Abs;

impl Abs {
    pub fn new() -> Self {
        Self
    }
}

impl MessageUnit for Abs {
    fn label(&self) -> &'static str {
        "abs"
    }

    fn num_inlets(&self) -> usize {
        1
    }

    fn num_outlets(&self) -> usize {
        1
    }

    fn process_message(&mut self, _inlet: usize, message: &Message, outlets: &mut Outlets) {
        match message.float_at(0) {
            Some(x) => outlets.send(0, Message::float(message.timestamp(), x.abs())),
            None => tracing::trace!(%message, "abs: ignored"),
        }
    }
}
