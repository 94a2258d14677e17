//! Numeric building blocks shared by signal units.

mod cos_table;
pub mod phase;

pub use cos_table::{CosineTable, COS_TABLE_SIZE};
