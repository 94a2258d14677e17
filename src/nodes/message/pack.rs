//! List builder

use itertools::Itertools;

use crate::message::{Atom, AtomType, Message};
use crate::node::{MessageUnit, Outlets};

/// `[pack]`: gathers one atom per inlet into a list.
///
/// Each creation argument declares a slot: `f`/`float` or a number for a float
/// slot, `s`/`symbol` for a symbol slot. Without arguments there are two
/// float slots. Inlet 0 is hot; the other inlets only store.
#[derive(Clone, Debug)]
pub struct Pack {
    slots: Vec<Atom>,
}

impl Pack {
    pub fn new(slots: Vec<Atom>) -> Self {
        Self { slots }
    }

    pub fn from_init(init: &Message) -> Self {
        if init.is_empty() {
            return Self::new(vec![Atom::Float(0.0); 2]);
        }
        let slots = init
            .atoms()
            .iter()
            .map(|atom| match atom {
                Atom::Float(f) => Atom::Float(*f),
                Atom::Symbol(s) if s == "s" || s == "symbol" => Atom::Symbol("symbol".into()),
                _ => Atom::Float(0.0),
            })
            .collect();
        Self::new(slots)
    }

    pub fn slots(&self) -> &[Atom] {
        &self.slots
    }

    /// Store `atom` in slot `index` if the types agree.
    fn fill(&mut self, index: usize, atom: &Atom) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.atom_type() == atom.atom_type() => {
                *slot = atom.clone();
                true
            }
            _ => {
                tracing::trace!(index, %atom, "pack: type mismatch");
                false
            }
        }
    }

    fn output(&self, timestamp: f64, outlets: &mut Outlets) {
        outlets.send(0, Message::new(timestamp, self.slots.clone()));
    }
}

impl MessageUnit for Pack {
    fn label(&self) -> &'static str {
        "pack"
    }

    fn num_inlets(&self) -> usize {
        self.slots.len()
    }

    fn num_outlets(&self) -> usize {
        1
    }

    fn process_message(&mut self, inlet: usize, message: &Message, outlets: &mut Outlets) {
        if inlet >= self.slots.len() {
            return;
        }
        if inlet > 0 {
            if let Some(atom) = message.atom(0) {
                self.fill(inlet, atom);
            }
            return;
        }

        match message.atoms() {
            [] => {}
            [Atom::Bang] => self.output(message.timestamp(), outlets),
            [atom] => {
                if self.fill(0, atom) {
                    self.output(message.timestamp(), outlets);
                }
            }
            atoms => {
                for (i, atom) in atoms.iter().enumerate().take(self.slots.len()) {
                    if atom.atom_type() != AtomType::Bang {
                        self.fill(i, atom);
                    }
                }
                self.output(message.timestamp(), outlets);
            }
        }
    }

    fn describe(&self) -> String {
        let kinds = self.slots.iter().map(|slot| match slot {
            Atom::Symbol(_) => "s",
            _ => "f",
        });
        format!("{} {}", self.label(), kinds.format(" "))
    }
}
