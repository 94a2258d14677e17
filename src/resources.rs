//! Shared read-only data handed to units at construction.

use alloc::sync::{Arc, Weak};

use crate::dsp::CosineTable;

/// Arena for lookup tables shared by every unit of a graph.
///
/// The arena keeps only a weak reference: the cosine table lives as long as
/// some oscillator holds it, and is rebuilt on the next request after the
/// last one is dropped.
#[derive(Debug, Default)]
pub struct Resources {
    cos_table: Weak<CosineTable>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared cosine table, built on first use.
    pub fn cosine_table(&mut self) -> Arc<CosineTable> {
        if let Some(table) = self.cos_table.upgrade() {
            return table;
        }
        let table = Arc::new(CosineTable::new());
        self.cos_table = Arc::downgrade(&table);
        tracing::debug!("cosine table initialised");
        table
    }

    /// Number of live holders of the cosine table; 0 once it is released.
    pub fn cosine_table_refs(&self) -> usize {
        self.cos_table.strong_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_shared_and_released() {
        let mut resources = Resources::new();
        assert_eq!(resources.cosine_table_refs(), 0);

        let a = resources.cosine_table();
        let b = resources.cosine_table();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(resources.cosine_table_refs(), 2);

        drop(a);
        drop(b);
        assert_eq!(resources.cosine_table_refs(), 0);

        let c = resources.cosine_table();
        assert_eq!(c.samples()[0], 1.0);
        assert_eq!(resources.cosine_table_refs(), 1);
    }
}
