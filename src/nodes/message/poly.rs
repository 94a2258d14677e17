//! Polyphonic voice allocation

use crate::message::{Atom, Message};
use crate::node::{MessageUnit, Outlets};

/// One voice slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Voice {
    pub used: bool,
    pub pitch: f32,
    /// Age stamp; smaller is older.
    pub serial: u64,
}

/// `[poly]`: assigns incoming notes to a fixed number of voices.
///
/// Inlet 0 takes pitches, inlet 1 the velocity applied to the next pitch.
/// A pitch with positive velocity starts a note on the oldest free voice, or,
/// if none is free and stealing is enabled, on the oldest busy one (whose note
/// is ended first). A pitch with velocity `<= 0` ends the oldest voice
/// playing that pitch.
///
/// Output on outlet 0 is `voice pitch velocity`, with voices numbered from 1
/// and the timestamp of the message that caused it.
#[derive(Clone, Debug)]
pub struct Poly {
    voices: Vec<Voice>,
    serial: u64,
    velocity: f32,
    steal: bool,
}

/// Most voices a [`Poly`] will allocate. Larger counts are clamped.
pub const MAX_VOICES: usize = 1024;

impl Poly {
    /// `num_voices` is clamped to `1..=MAX_VOICES`.
    pub fn new(num_voices: usize, steal: bool) -> Self {
        Self {
            voices: vec![Voice::default(); num_voices.clamp(1, MAX_VOICES)],
            serial: 0,
            velocity: 0.0,
            steal,
        }
    }

    /// Build from creation arguments: `[voices [steal]]`.
    ///
    /// The count is truncated to an integer. Fewer than two voices, or a
    /// non-number, gives one voice; more than [`MAX_VOICES`] gives
    /// `MAX_VOICES`. Stealing is on only if the second argument is exactly 1.
    pub fn from_init(init: &Message) -> Self {
        let n = match init.float_at(0) {
            // saturating; NaN becomes 0
            Some(x) if x as i32 > 1 => x as i32 as usize,
            _ => 1,
        };
        let steal = init.float_at(1) == Some(1.0);
        Self::new(n, steal)
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    #[inline]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    #[inline]
    pub fn steals(&self) -> bool {
        self.steal
    }

    fn next_serial(&mut self) -> u64 {
        self.serial = self.serial.wrapping_add(1);
        self.serial
    }

    /// Index of the oldest voice satisfying `pred`. Ties go to the lowest
    /// index.
    fn oldest(&self, pred: impl Fn(&Voice) -> bool) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|&(_, v)| pred(v))
            .min_by_key(|(_, v)| v.serial)
            .map(|(i, _)| i)
    }

    fn emit(timestamp: f64, voice: usize, pitch: f32, velocity: f32, outlets: &mut Outlets) {
        let atoms = vec![
            Atom::Float((voice + 1) as f32),
            Atom::Float(pitch),
            Atom::Float(velocity),
        ];
        outlets.send(0, Message::new(timestamp, atoms));
    }

    fn note_on(&mut self, timestamp: f64, pitch: f32, outlets: &mut Outlets) {
        if let Some(i) = self.oldest(|v| !v.used) {
            Self::emit(timestamp, i, pitch, self.velocity, outlets);
            let serial = self.next_serial();
            self.voices[i] = Voice { used: true, pitch, serial };
        } else if self.steal {
            // every voice is busy, so there is always an oldest
            if let Some(i) = self.oldest(|v| v.used) {
                let old = self.voices[i].pitch;
                Self::emit(timestamp, i, old, 0.0, outlets);
                Self::emit(timestamp, i, pitch, self.velocity, outlets);
                let serial = self.next_serial();
                self.voices[i] = Voice { used: true, pitch, serial };
            }
        } else {
            tracing::trace!(pitch, "poly: no free voice, note dropped");
        }
    }

    fn note_off(&mut self, timestamp: f64, pitch: f32, outlets: &mut Outlets) {
        if let Some(i) = self.oldest(|v| v.used && v.pitch == pitch) {
            let serial = self.next_serial();
            self.voices[i].used = false;
            self.voices[i].serial = serial;
            Self::emit(timestamp, i, pitch, 0.0, outlets);
        }
    }
}

impl MessageUnit for Poly {
    fn label(&self) -> &'static str {
        "poly"
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
                if let Some(pitch) = message.float_at(0) {
                    if self.velocity > 0.0 {
                        self.note_on(message.timestamp(), pitch, outlets);
                    } else {
                        self.note_off(message.timestamp(), pitch, outlets);
                    }
                }
            }
            1 => {
                if let Some(velocity) = message.float_at(0) {
                    self.velocity = velocity;
                } else if message.is_symbol(0, "stop") || message.is_symbol(0, "clear") {
                    tracing::trace!(%message, "poly: not implemented");
                }
            }
            _ => {}
        }
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.label(), self.voices.len(), self.steal as u8)
    }
}
