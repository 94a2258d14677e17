//! Float storage

use crate::message::Message;
use crate::node::{MessageUnit, Outlets};

/// `[float]` / `[f]`: stores one number.
///
/// A float on inlet 0 is stored and sent, a bang on inlet 0 resends the
/// stored value. A float on inlet 1 is stored silently.
#[derive(Clone, Debug, Default)]
pub struct Float {
    value: f32,
}

impl Float {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    /// Build from creation arguments: `[value]`, defaulting to 0.
    pub fn from_init(init: &Message) -> Self {
        Self::new(init.float_at(0).unwrap_or(0.0))
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl MessageUnit for Float {
    fn label(&self) -> &'static str {
        "float"
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn num_outlets(&self) -> usize {
        1
    }

    fn process_message(&mut self, inlet: usize, message: &Message, outlets: &mut Outlets) {
        match inlet {
            0 => {
                if let Some(x) = message.float_at(0) {
                    self.value = x;
                } else if !message.is_bang(0) {
                    tracing::trace!(%message, "float: ignored");
                    return;
                }
                outlets.send(0, Message::float(message.timestamp(), self.value));
            }
            1 => {
                if let Some(x) = message.float_at(0) {
                    self.value = x;
                }
            }
            _ => {}
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.label(), self.value)
    }
}
