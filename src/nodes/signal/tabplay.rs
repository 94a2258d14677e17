//! Table playback

use crate::message::Message;
use crate::node::{ConnectionType, MessageUnit, Outlets, ProcessContext, SignalPorts, SignalUnit};

/// Half-open index range still to be played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Playback {
    position: usize,
    end: usize,
}

/// `[tabplay~ name]`: plays a table from the graph's [`TableStore`] as a
/// signal.
///
/// `bang` plays the whole table, a float `start` plays from that index to the
/// end and a list `start length` plays `length` samples. `set name` switches
/// tables and `stop` halts; neither sends anything. When playback runs to its
/// end a bang goes out of outlet 1, stamped with the time of the sample where
/// it ended.
///
/// [`TableStore`]: crate::table::TableStore
pub struct TabPlay {
    table: String,
    playback: Option<Playback>,
    ports: SignalPorts,
}

/// Float to index, with negatives and NaN at 0.
fn index(x: f32) -> usize {
    if x > 0.0 {
        x as usize
    } else {
        0
    }
}

impl TabPlay {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            playback: None,
            ports: SignalPorts::new(0, 1),
        }
    }

    pub fn from_init(init: &Message) -> Self {
        Self::new(init.symbol_at(0).unwrap_or_default())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    fn play(&mut self, position: usize, end: usize) {
        self.playback = Some(Playback { position, end });
    }
}

impl MessageUnit for TabPlay {
    fn label(&self) -> &'static str {
        "tabplay~"
    }

    fn num_inlets(&self) -> usize {
        1
    }

    fn num_outlets(&self) -> usize {
        2
    }

    fn process_message(&mut self, inlet: usize, message: &Message, _outlets: &mut Outlets) {
        if inlet != 0 {
            return;
        }
        if message.is_bang(0) {
            self.play(0, usize::MAX);
        } else if let Some(start) = message.float_at(0) {
            let start = index(start);
            match message.float_at(1) {
                Some(length) => self.play(start, start.saturating_add(index(length))),
                None => self.play(start, usize::MAX),
            }
        } else if message.is_symbol(0, "set") {
            if let Some(name) = message.symbol_at(1) {
                self.table = name.to_string();
            }
            self.playback = None;
        } else if message.is_symbol(0, "stop") {
            self.playback = None;
        } else {
            tracing::trace!(%message, "tabplay~: ignored");
        }
    }

    fn outlet_type(&self, outlet: usize) -> ConnectionType {
        if outlet == 0 {
            ConnectionType::Signal
        } else {
            ConnectionType::Message
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.label(), self.table)
    }

    fn as_signal(&self) -> Option<&dyn SignalUnit> {
        Some(self)
    }

    fn as_signal_mut(&mut self) -> Option<&mut dyn SignalUnit> {
        Some(self)
    }
}

impl SignalUnit for TabPlay {
    fn ports(&self) -> &SignalPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut SignalPorts {
        &mut self.ports
    }

    fn process(&mut self, ctx: &ProcessContext, from: usize, to: usize, outlets: &mut Outlets) {
        let output = &mut self.ports.outlet_mut(0)[from..to];
        output.fill(0.0);

        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        let Some(samples) = ctx.tables.get(&self.table) else {
            tracing::trace!(table = %self.table, "tabplay~: no such table");
            self.playback = None;
            return;
        };

        let end = playback.end.min(samples.len());
        let start = playback.position.min(end);
        let n = output.len().min(end - start);
        output[..n].copy_from_slice(&samples[start..start + n]);
        playback.position = start + n;

        if playback.position >= end {
            self.playback = None;
            outlets.send(1, Message::bang(ctx.timestamp_at(from + n)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BLOCK_SIZE;
    use crate::table::TableStore;

    fn ctx(tables: &TableStore) -> ProcessContext<'_> {
        ProcessContext {
            sample_rate: 1000.0,
            block_size: BLOCK_SIZE,
            block_start: 100.0,
            tables,
        }
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn plays_whole_table_and_bangs_at_the_end() {
        let mut tables = TableStore::new();
        tables.insert("t", ramp(10));
        let ctx = ctx(&tables);
        let mut tab = TabPlay::from_init(&Message::parse(0.0, "t"));
        let mut outlets = Outlets::new();

        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);

        let out = tab.ports().outlet(0);
        assert_eq!(&out[..10], &ramp(10)[..]);
        assert!(out[10..].iter().all(|&s| s == 0.0));
        // sample 10 at 1 kHz is 10 ms into the block
        assert_eq!(outlets.take(), vec![(1, Message::bang(110.0))]);
        assert!(!tab.is_playing());
    }

    #[test]
    fn start_and_length() {
        let mut tables = TableStore::new();
        tables.insert("t", ramp(100));
        let ctx = ctx(&tables);
        let mut tab = TabPlay::new("t");
        let mut outlets = Outlets::new();

        tab.process_message(0, &Message::floats(0.0, &[5.0, 3.0]), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(&tab.ports().outlet(0)[..4], &[6.0, 7.0, 8.0, 0.0]);
        assert_eq!(outlets.take(), vec![(1, Message::bang(103.0))]);

        tab.process_message(0, &Message::float(0.0, 90.0), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(tab.ports().outlet(0)[9], 100.0);
        assert_eq!(outlets.take(), vec![(1, Message::bang(110.0))]);
    }

    #[test]
    fn playback_spans_blocks() {
        let mut tables = TableStore::new();
        tables.insert("t", ramp(100));
        let ctx = ctx(&tables);
        let mut tab = TabPlay::new("t");
        let mut outlets = Outlets::new();

        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert!(outlets.is_empty());
        assert_eq!(tab.ports().outlet(0)[63], 64.0);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(tab.ports().outlet(0)[0], 65.0);
        assert_eq!(outlets.take(), vec![(1, Message::bang(136.0))]);
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        let mut tables = TableStore::new();
        tables.insert("t", ramp(4));
        let ctx = ctx(&tables);
        let mut tab = TabPlay::new("t");
        let mut outlets = Outlets::new();

        tab.process_message(0, &Message::floats(0.0, &[-3.0, 2.0]), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(&tab.ports().outlet(0)[..3], &[1.0, 2.0, 0.0]);

        // zero length ends at once
        tab.process_message(0, &Message::floats(0.0, &[1.0, -1.0]), &mut outlets);
        outlets.take();
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(outlets.take(), vec![(1, Message::bang(100.0))]);
    }

    #[test]
    fn stop_and_set_are_silent() {
        let mut tables = TableStore::new();
        tables.insert("a", ramp(100));
        tables.insert("b", vec![-1.0; 8]);
        let ctx = ctx(&tables);
        let mut tab = TabPlay::new("a");
        let mut outlets = Outlets::new();

        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process(&ctx, 0, 16, &mut outlets);
        tab.process_message(0, &Message::symbol(0.0, "stop"), &mut outlets);
        tab.process(&ctx, 16, BLOCK_SIZE, &mut outlets);
        assert!(tab.ports().outlet(0)[16..].iter().all(|&s| s == 0.0));

        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process_message(0, &Message::parse(0.0, "set b"), &mut outlets);
        assert_eq!(tab.table(), "b");
        assert!(!tab.is_playing());
        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert_eq!(&tab.ports().outlet(0)[..9], &[-1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 0.0]);
        assert_eq!(outlets.take(), vec![(1, Message::bang(108.0))]);
    }

    #[test]
    fn missing_table_is_silence() {
        let tables = TableStore::new();
        let ctx = ctx(&tables);
        let mut tab = TabPlay::new("nowhere");
        let mut outlets = Outlets::new();
        tab.ports_mut().outlet_mut(0).fill(3.0);

        tab.process_message(0, &Message::bang(0.0), &mut outlets);
        tab.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert!(tab.ports().outlet(0).iter().all(|&s| s == 0.0));
        assert!(outlets.is_empty());
        assert!(!tab.is_playing());
    }
}
