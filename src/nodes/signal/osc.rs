//! Cosine oscillator

use alloc::sync::Arc;

use crate::dsp::phase::{self, UNIT_BIT_32};
use crate::dsp::{CosineTable, COS_TABLE_SIZE};
use crate::message::Message;
use crate::node::{
    ConnectionType, MessageUnit, Outlets, ProcessContext, SignalPorts, SignalUnit,
};

/// How the per-sample phase increment is obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    /// Constant increment from the stored frequency.
    Scalar,
    /// Increment from each sample of the signal on inlet 0.
    Signal,
}

/// `[osc~]`: cosine oscillator with audio-rate frequency input.
///
/// Inlet 0 takes either a frequency message or a signal (FM). Inlet 1 takes
/// phase messages, which are accepted but currently have no effect. Outlet 0
/// is the signal.
///
/// The phase lives in table units and is carried across blocks; see
/// [`dsp::phase`](crate::dsp::phase) for the accumulator.
pub struct Osc {
    frequency: f32,
    phase: f64,
    table: Arc<CosineTable>,
    strategy: Strategy,
    ports: SignalPorts,
}

impl Osc {
    pub fn new(frequency: f32, table: Arc<CosineTable>) -> Self {
        Self {
            frequency: frequency.abs(),
            phase: 0.0,
            table,
            strategy: Strategy::Scalar,
            ports: SignalPorts::new(1, 1),
        }
    }

    /// Build from creation arguments: `[frequency]`, defaulting to 0.
    pub fn from_init(init: &Message, table: Arc<CosineTable>) -> Self {
        Self::new(init.float_at(0).unwrap_or(0.0), table)
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Current phase in table units, in `[0, COS_TABLE_SIZE)` between calls.
    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// True while a signal drives the frequency.
    pub fn is_signal_driven(&self) -> bool {
        self.strategy == Strategy::Signal
    }
}

/// Largest phase excursion, in table units, one run of the accumulator may
/// cover before it is wrapped. Keeps the biased phase inside the range
/// [`phase::split`] requires, given a start phase in `[0, COS_TABLE_SIZE)`.
const MAX_EXCURSION: f64 = 524_288.0 - COS_TABLE_SIZE as f64;

/// Run the accumulator over `output`, taking the increment for sample `i`
/// from `increment(i)`, and return the wrapped phase.
///
/// `max_increment` bounds `|increment(i)|`. Ranges that could leave the
/// biased domain are cut into chunks with a wrap between them; within a chunk
/// the loop is branch-free.
#[inline(always)]
fn render<F>(
    table: &CosineTable,
    start: f64,
    output: &mut [f32],
    max_increment: f64,
    mut increment: F,
) -> f64
where
    F: FnMut(usize) -> f64,
{
    let chunk = if max_increment > 0.0 {
        ((MAX_EXCURSION / max_increment) as usize).clamp(1, output.len().max(1))
    } else {
        output.len().max(1)
    };

    let mut current = start;
    for (c, samples) in output.chunks_mut(chunk).enumerate() {
        let offset = c * chunk;
        let mut biased = current + UNIT_BIT_32;
        for (i, out) in samples.iter_mut().enumerate() {
            let (index, frac) = phase::split(biased, CosineTable::MASK);
            biased += increment(offset + i);
            *out = table.interpolate(index, frac);
        }
        current = phase::wrap(biased, COS_TABLE_SIZE as f64);
    }
    current
}

impl MessageUnit for Osc {
    fn label(&self) -> &'static str {
        "osc~"
    }

    fn num_inlets(&self) -> usize {
        2
    }

    fn num_outlets(&self) -> usize {
        1
    }

    fn process_message(&mut self, inlet: usize, message: &Message, _outlets: &mut Outlets) {
        match inlet {
            0 => {
                if let Some(f) = message.float_at(0) {
                    self.frequency = f.abs();
                }
            }
            1 => {
                // TODO: reset the phase
                tracing::trace!(%message, "osc~: phase message ignored");
            }
            _ => {}
        }
    }

    fn outlet_type(&self, _outlet: usize) -> ConnectionType {
        ConnectionType::Signal
    }

    fn describe(&self) -> String {
        format!("{} {}", self.label(), self.frequency)
    }

    fn as_signal(&self) -> Option<&dyn SignalUnit> {
        Some(self)
    }

    fn as_signal_mut(&mut self) -> Option<&mut dyn SignalUnit> {
        Some(self)
    }
}

impl SignalUnit for Osc {
    fn ports(&self) -> &SignalPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut SignalPorts {
        &mut self.ports
    }

    fn on_inlet_connection_update(&mut self, _inlet: usize) {
        self.strategy = if self.ports.has_signal(0) {
            Strategy::Signal
        } else {
            Strategy::Scalar
        };
    }

    fn process(&mut self, ctx: &ProcessContext, from: usize, to: usize, _outlets: &mut Outlets) {
        let multiplier = COS_TABLE_SIZE as f32 / ctx.sample_rate;
        let table = &*self.table;

        self.phase = match self.strategy {
            Strategy::Scalar => {
                let increment = self.frequency as f64 * multiplier as f64;
                let output = &mut self.ports.outlet_mut(0)[from..to];
                render(table, self.phase, output, increment.abs(), |_| increment)
            }
            Strategy::Signal => {
                let (input, output) = self.ports.split_mut(0, 0);
                let input = &input[from..to];
                let peak = input.iter().fold(0.0f32, |m, s| m.max(s.abs()));
                let max_increment = (peak * multiplier) as f64;
                render(table, self.phase, &mut output[from..to], max_increment, |i| {
                    (input[i] * multiplier) as f64
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BLOCK_SIZE;
    use crate::table::TableStore;
    use float_cmp::approx_eq;

    fn ctx(tables: &TableStore, sample_rate: f32) -> ProcessContext<'_> {
        ProcessContext {
            sample_rate,
            block_size: BLOCK_SIZE,
            block_start: 0.0,
            tables,
        }
    }

    fn osc(frequency: f32) -> Osc {
        Osc::new(frequency, Arc::new(CosineTable::new()))
    }

    fn run_blocks(osc: &mut Osc, ctx: &ProcessContext, blocks: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut outlets = Outlets::new();
        for _ in 0..blocks {
            osc.process(ctx, 0, BLOCK_SIZE, &mut outlets);
            out.extend_from_slice(osc.ports().outlet(0));
        }
        out
    }

    #[test]
    fn init_defaults() {
        let table = Arc::new(CosineTable::new());
        assert_eq!(Osc::from_init(&Message::parse(0.0, "440"), table.clone()).frequency(), 440.0);
        assert_eq!(Osc::from_init(&Message::parse(0.0, "fast"), table.clone()).frequency(), 0.0);
        assert_eq!(Osc::from_init(&Message::new(0.0, vec![]), table).frequency(), 0.0);
    }

    #[test]
    fn negative_frequency_is_folded() {
        let mut osc = osc(100.0);
        osc.process_message(0, &Message::float(0.0, -220.0), &mut Outlets::new());
        assert_eq!(osc.frequency(), 220.0);
        assert_eq!(osc.describe(), "osc~ 220");
    }

    #[test]
    fn phase_and_unknown_messages_are_inert() {
        let mut osc = osc(100.0);
        let mut outlets = Outlets::new();
        osc.process_message(1, &Message::float(0.0, 0.5), &mut outlets);
        osc.process_message(0, &Message::symbol(0.0, "set"), &mut outlets);
        osc.process_message(7, &Message::float(0.0, 3.0), &mut outlets);
        assert_eq!(osc.frequency(), 100.0);
        assert_eq!(osc.phase(), 0.0);
        assert!(outlets.is_empty());
    }

    #[test]
    fn zero_frequency_is_dc() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 48_000.0);
        let mut osc = osc(0.0);
        assert!(run_blocks(&mut osc, &ctx, 2).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn periodic_with_exact_increment() {
        // 512 Hz at 32768 Hz advances exactly 512 table entries per sample,
        // a period of 64 samples
        let tables = TableStore::new();
        let ctx = ctx(&tables, 32_768.0);
        let mut osc = osc(512.0);
        let out = run_blocks(&mut osc, &ctx, 4);
        for i in 64..out.len() {
            assert_eq!(out[i], out[i - 64], "sample {}", i);
        }
        assert_eq!(out[0], 1.0);
        assert!(approx_eq!(f32, out[16], 0.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, out[32], -1.0, epsilon = 1e-6));
    }

    #[test]
    fn matches_cosine() {
        let sample_rate = 48_000.0;
        let frequency = 440.0;
        let tables = TableStore::new();
        let ctx = ctx(&tables, sample_rate);
        let mut osc = osc(frequency);
        let out = run_blocks(&mut osc, &ctx, 40);
        for (n, &s) in out.iter().enumerate() {
            let t = n as f64 / sample_rate as f64;
            let expected = (core::f64::consts::TAU * frequency as f64 * t).cos() as f32;
            assert!(approx_eq!(f32, s, expected, epsilon = 1e-4), "sample {}: {} vs {}", n, s, expected);
        }
    }

    #[test]
    fn split_blocks_are_continuous() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 44_100.0);
        let mut outlets = Outlets::new();

        let mut whole = osc(1234.5);
        whole.process(&ctx, 0, BLOCK_SIZE, &mut outlets);

        let mut split = osc(1234.5);
        split.process(&ctx, 0, 23, &mut outlets);
        split.process(&ctx, 23, BLOCK_SIZE, &mut outlets);

        for (a, b) in whole.ports().outlet(0).iter().zip(split.ports().outlet(0).iter()) {
            assert!(approx_eq!(f32, *a, *b, epsilon = 1e-6));
        }
        assert!(approx_eq!(f64, whole.phase(), split.phase(), epsilon = 1e-3));
    }

    #[test]
    fn process_writes_only_its_range() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 48_000.0);
        let mut osc = osc(1000.0);
        osc.ports_mut().outlet_mut(0).iter_mut().for_each(|s| *s = 9.0);
        osc.process(&ctx, 10, 20, &mut Outlets::new());
        let out = osc.ports().outlet(0);
        assert!(out[..10].iter().all(|&s| s == 9.0));
        assert!(out[10..20].iter().all(|&s| s != 9.0));
        assert!(out[20..].iter().all(|&s| s == 9.0));
    }

    #[test]
    fn phase_stays_canonical() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 48_000.0);
        let mut osc = osc(17_000.0);
        let mut outlets = Outlets::new();
        for _ in 0..100 {
            osc.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
            assert!((0.0..COS_TABLE_SIZE as f64).contains(&osc.phase()));
        }
    }

    #[test]
    fn high_frequencies_match_cosine() {
        // fast enough that one block spans more phase than the biased
        // accumulator can hold
        let sample_rate = 48_000.0;
        let frequency = 19_000.0;
        let tables = TableStore::new();
        let ctx = ctx(&tables, sample_rate);
        let mut osc = osc(frequency);
        let out = run_blocks(&mut osc, &ctx, 4);
        for (n, &s) in out.iter().enumerate() {
            let t = n as f64 / sample_rate as f64;
            let expected = (core::f64::consts::TAU * frequency as f64 * t).cos() as f32;
            assert!(approx_eq!(f32, s, expected, epsilon = 1e-3), "sample {}: {} vs {}", n, s, expected);
        }
    }

    #[test]
    fn signal_strategy_follows_connection_state() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 32_768.0);
        let mut outlets = Outlets::new();

        // scalar frequency says 512 Hz, the signal says 1024 Hz
        let mut osc = osc(512.0);
        osc.ports_mut().inlet_mut(0).iter_mut().for_each(|s| *s = 1024.0);

        osc.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        assert!(!osc.is_signal_driven());
        assert!(approx_eq!(f32, osc.ports().outlet(0)[32], -1.0, epsilon = 1e-6));

        osc.ports_mut().set_connection_count(0, 1);
        osc.on_inlet_connection_update(0);
        assert!(osc.is_signal_driven());

        osc.process(&ctx, 0, BLOCK_SIZE, &mut outlets);
        // a period of 32 samples now
        assert!(approx_eq!(f32, osc.ports().outlet(0)[16], -1.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, osc.ports().outlet(0)[32], 1.0, epsilon = 1e-6));

        osc.ports_mut().set_connection_count(0, 0);
        osc.on_inlet_connection_update(0);
        assert!(!osc.is_signal_driven());
    }

    #[test]
    fn switching_strategy_keeps_phase() {
        let tables = TableStore::new();
        let ctx = ctx(&tables, 48_000.0);
        let mut outlets = Outlets::new();

        let mut osc = osc(300.0);
        osc.process(&ctx, 0, 37, &mut outlets);
        let phase = osc.phase();
        assert!(phase > 0.0);

        osc.ports_mut().set_connection_count(0, 1);
        osc.on_inlet_connection_update(0);
        assert_eq!(osc.phase(), phase);

        // a silent signal input holds the phase still
        osc.process(&ctx, 37, BLOCK_SIZE, &mut outlets);
        assert_eq!(osc.phase(), phase);
        let held = osc.ports().outlet(0)[37];
        assert!(osc.ports().outlet(0)[37..].iter().all(|&s| s == held));
    }
}
