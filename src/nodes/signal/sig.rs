//! Constant signal

use crate::message::Message;
use crate::node::{ConnectionType, MessageUnit, Outlets, ProcessContext, SignalPorts, SignalUnit};

/// `[sig~]`: turns a float into a constant signal.
pub struct Sig {
    value: f32,
    ports: SignalPorts,
}

impl Sig {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            ports: SignalPorts::new(0, 1),
        }
    }

    pub fn from_init(init: &Message) -> Self {
        Self::new(init.float_at(0).unwrap_or(0.0))
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl MessageUnit for Sig {
    fn label(&self) -> &'static str {
        "sig~"
    }

    fn num_inlets(&self) -> usize {
        1
    }

    fn num_outlets(&self) -> usize {
        1
    }

    fn process_message(&mut self, inlet: usize, message: &Message, _outlets: &mut Outlets) {
        if inlet == 0 {
            if let Some(x) = message.float_at(0) {
                self.value = x;
            }
        }
    }

    fn outlet_type(&self, _outlet: usize) -> ConnectionType {
        ConnectionType::Signal
    }

    fn describe(&self) -> String {
        format!("{} {}", self.label(), self.value)
    }

    fn as_signal(&self) -> Option<&dyn SignalUnit> {
        Some(self)
    }

    fn as_signal_mut(&mut self) -> Option<&mut dyn SignalUnit> {
        Some(self)
    }
}

impl SignalUnit for Sig {
    fn ports(&self) -> &SignalPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut SignalPorts {
        &mut self.ports
    }

    fn process(&mut self, _ctx: &ProcessContext, from: usize, to: usize, _outlets: &mut Outlets) {
        self.ports.outlet_mut(0)[from..to].fill(self.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BLOCK_SIZE;
    use crate::table::TableStore;

    #[test]
    fn holds_value_over_range() {
        let tables = TableStore::new();
        let ctx = ProcessContext {
            sample_rate: 44_100.0,
            block_size: BLOCK_SIZE,
            block_start: 0.0,
            tables: &tables,
        };
        let mut sig = Sig::from_init(&Message::parse(0.0, "0.5"));
        let mut outlets = Outlets::new();
        sig.process(&ctx, 0, 10, &mut outlets);
        sig.process_message(0, &Message::float(0.0, -2.0), &mut outlets);
        sig.process(&ctx, 10, BLOCK_SIZE, &mut outlets);

        let out = sig.ports().outlet(0);
        assert!(out[..10].iter().all(|&s| s == 0.5));
        assert!(out[10..].iter().all(|&s| s == -2.0));
        assert!(outlets.is_empty());
    }
}
