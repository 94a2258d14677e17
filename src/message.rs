//! Timestamped messages passed between units.

use core::fmt;

use itertools::Itertools;

/// A single element of a [`Message`].
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Float(f32),
    Symbol(String),
    Bang,
}

/// The type tag of an [`Atom`], for matching without borrowing its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomType {
    Float,
    Symbol,
    Bang,
}

impl Atom {
    pub fn atom_type(&self) -> AtomType {
        match self {
            Atom::Float(_) => AtomType::Float,
            Atom::Symbol(_) => AtomType::Symbol,
            Atom::Bang => AtomType::Bang,
        }
    }

    /// Parse one whitespace-free token: numbers become floats, `bang` a bang,
    /// anything else a symbol.
    ///
    /// Only tokens starting with a digit or `.`, after an optional sign, are
    /// numbers, so `inf` and `nan` stay symbols.
    pub fn parse(token: &str) -> Self {
        let unsigned = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
        let numeric = unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.');
        match token.parse::<f32>() {
            Ok(f) if numeric => Atom::Float(f),
            _ if token == "bang" => Atom::Bang,
            _ => Atom::Symbol(token.to_string()),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Float(v) => write!(f, "{}", v),
            Atom::Symbol(s) => f.write_str(s),
            Atom::Bang => f.write_str("bang"),
        }
    }
}

impl From<f32> for Atom {
    fn from(v: f32) -> Self {
        Atom::Float(v)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Symbol(s.to_string())
    }
}

/// An ordered list of atoms stamped with a logical time in milliseconds.
///
/// Messages are built by a sender, read by reference by every receiver of a
/// delivery, and dropped once the delivery returns. Units that need a value
/// later copy it out.
///
/// The timestamp is logical graph time, not wall-clock time. Units that emit
/// in response to a message stamp their output with the incoming timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    timestamp: f64,
    atoms: Vec<Atom>,
}

impl Message {
    pub fn new(timestamp: f64, atoms: Vec<Atom>) -> Self {
        Self { timestamp, atoms }
    }

    pub fn float(timestamp: f64, value: f32) -> Self {
        Self::new(timestamp, vec![Atom::Float(value)])
    }

    pub fn bang(timestamp: f64) -> Self {
        Self::new(timestamp, vec![Atom::Bang])
    }

    pub fn symbol(timestamp: f64, name: impl Into<String>) -> Self {
        Self::new(timestamp, vec![Atom::Symbol(name.into())])
    }

    pub fn floats(timestamp: f64, values: &[f32]) -> Self {
        Self::new(timestamp, values.iter().copied().map(Atom::Float).collect())
    }

    /// Build a message from whitespace-separated tokens, see [`Atom::parse`].
    pub fn parse(timestamp: f64, text: &str) -> Self {
        Self::new(timestamp, text.split_whitespace().map(Atom::parse).collect())
    }

    /// Same atoms, different time.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    #[inline]
    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_type(&self, index: usize) -> Option<AtomType> {
        self.atom(index).map(Atom::atom_type)
    }

    /// The float at `index`, if there is one.
    pub fn float_at(&self, index: usize) -> Option<f32> {
        match self.atom(index) {
            Some(Atom::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn symbol_at(&self, index: usize) -> Option<&str> {
        match self.atom(index) {
            Some(Atom::Symbol(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_float(&self, index: usize) -> bool {
        self.float_at(index).is_some()
    }

    #[inline]
    pub fn is_bang(&self, index: usize) -> bool {
        matches!(self.atom(index), Some(Atom::Bang))
    }

    /// True if the atom at `index` is the symbol `name`.
    pub fn is_symbol(&self, index: usize, name: &str) -> bool {
        self.symbol_at(index) == Some(name)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.atoms.iter().join(" "))
    }
}
