//! Errors returned by graph operations.

use thiserror::Error;

use crate::graph::UnitId;

/// Misuse of the [`Graph`](crate::Graph) API.
///
/// Units themselves never fail; these only come from building or editing a
/// graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown object `{0}`")]
    UnknownObject(String),

    #[error("empty object definition")]
    EmptyDefinition,

    #[error("no unit {0} in this graph")]
    NoSuchUnit(UnitId),

    #[error("unit {unit} has no inlet {inlet}")]
    NoSuchInlet { unit: UnitId, inlet: usize },

    #[error("unit {unit} has no outlet {outlet}")]
    NoSuchOutlet { unit: UnitId, outlet: usize },

    #[error("inlet {inlet} of unit {unit} does not accept a signal")]
    NotASignalInlet { unit: UnitId, inlet: usize },

    #[error("connecting {from} to {to} would close a signal cycle")]
    SignalCycle { from: UnitId, to: UnitId },

    #[error("no connection from {from}:{outlet} to {to}:{inlet}")]
    NoSuchConnection {
        from: UnitId,
        outlet: usize,
        to: UnitId,
        inlet: usize,
    },
}
