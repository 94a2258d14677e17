//! Named sample arrays read by table units.

use alloc::vec::Vec;

use hashbrown::HashMap;

/// Passive storage for named tables.
///
/// The graph owns one store and lends it to signal units through
/// [`ProcessContext::tables`](crate::ProcessContext). Units look tables up by
/// name on every block, so replacing a table takes effect on the next block.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, Vec<f32>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a table, returning the previous contents.
    pub fn insert(&mut self, name: impl Into<String>, samples: Vec<f32>) -> Option<Vec<f32>> {
        self.tables.insert(name.into(), samples)
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<f32>> {
        self.tables.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<f32>> {
        self.tables.remove(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
