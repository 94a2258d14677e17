//! Built-in units.
//!
//! Units are organized into two categories:
//!
//! ## Message units ([`message`])
//!
//! React to messages only:
//! - [`Abs`] - Absolute value
//! - [`Float`] - Store and recall a number (`float`, `f`)
//! - [`Pack`] - Combine inlets into a list
//! - [`Poly`] - Polyphonic voice allocation with optional stealing
//!
//! ## Signal units ([`signal`])
//!
//! Also produce signal blocks:
//! - [`Osc`] - Cosine oscillator, frequency by message or signal
//! - [`Sig`] - Float to constant signal
//! - [`TabPlay`] - Play a named table, bang when done

pub mod message;
pub mod signal;

pub use message::{Abs, Float, Pack, Poly, Voice, MAX_VOICES};
pub use signal::{Osc, Sig, TabPlay};
