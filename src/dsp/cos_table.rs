use alloc::boxed::Box;

/// Entries per period of the cosine table. A power of two, so the phase index
/// reduces with a mask.
pub const COS_TABLE_SIZE: usize = 32768;

/// One period of `cos`, with a guard point.
///
/// Holds `COS_TABLE_SIZE + 1` entries; the last repeats the first so that
/// linear interpolation from index `COS_TABLE_SIZE - 1` never reads past the
/// end. Never mutated after construction, so instances are shared freely
/// behind an `Arc`.
#[derive(Debug)]
pub struct CosineTable {
    samples: Box<[f32]>,
}

impl CosineTable {
    pub const MASK: u32 = (COS_TABLE_SIZE - 1) as u32;

    pub fn new() -> Self {
        let samples = (0..=COS_TABLE_SIZE)
            .map(|i| (core::f64::consts::TAU * i as f64 / COS_TABLE_SIZE as f64).cos() as f32)
            .collect();
        Self { samples }
    }

    /// Linear interpolation between entry `index` and `index + 1`.
    #[inline(always)]
    pub fn interpolate(&self, index: usize, frac: f32) -> f32 {
        let a = self.samples[index];
        let b = self.samples[index + 1];
        a + frac * (b - a)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl Default for CosineTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn has_guard_point() {
        let table = CosineTable::new();
        assert_eq!(table.samples().len(), COS_TABLE_SIZE + 1);
        assert_eq!(table.samples()[0], 1.0);
        assert_eq!(table.samples()[COS_TABLE_SIZE], table.samples()[0]);
    }

    #[test]
    fn quarter_points() {
        let table = CosineTable::new();
        let s = table.samples();
        assert!(approx_eq!(f32, s[COS_TABLE_SIZE / 4], 0.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, s[COS_TABLE_SIZE / 2], -1.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, table.interpolate(COS_TABLE_SIZE - 1, 1.0), 1.0, epsilon = 1e-6));
    }
}
