//! Phase accumulation on a biased `f64`.
//!
//! A periodic generator keeps its phase in table units (`0..table_size` is one
//! period). Adding [`UNIT_BIT_32`] (3·2^19) to a phase in `[-2^19, 2^19)`
//! lands the sum in `[2^20, 2^21)`, where every double has the same exponent.
//! There the least significant bit of the high 32-bit word has place value 1
//! and the low 32-bit word is the fraction in units of 2^-32. So the integer
//! part (modulo any power of two up to 2^20) can be read straight from the
//! high word, and the fraction recovered by overwriting the high word with
//! that of the bias and subtracting the bias. No modulo and no float-to-int
//! conversion happen per sample.
//!
//! The same trick wraps the phase at the end of a block: re-bias by
//! `UNIT_BIT_32 * table_size`, where the bit of the high word with place value
//! 1 now stands for `table_size`, and overwrite the high word.
//!
//! `to_bits`/`from_bits` work on the IEEE-754 binary64 layout independent of
//! byte order, so no endian switch is needed.
//!
//! Precondition for [`split`]: `biased - UNIT_BIT_32` lies in `[-2^19, 2^19)`.
//! Precondition for [`wrap`]: the un-biased phase lies in
//! `[-2^19 * table_size, 2^19 * table_size)`.
//!
//! The `portable_phase` feature swaps both for plain `floor`/`rem_euclid`
//! arithmetic that produces the same bits.

/// 3·2^19. Biases a phase so that bit 32 of the double has place value 1.
pub const UNIT_BIT_32: f64 = 1_572_864.0;

/// High word of [`UNIT_BIT_32`].
const NORM_HIGH_WORD: u32 = 0x4138_0000;

#[inline(always)]
fn high_word(x: f64) -> u32 {
    (x.to_bits() >> 32) as u32
}

#[inline(always)]
fn with_high_word(x: f64, high: u32) -> f64 {
    f64::from_bits((x.to_bits() & 0xffff_ffff) | ((high as u64) << 32))
}

/// Table index (`integer part & mask`) and interpolation weight of a biased
/// phase, read from its bit pattern.
#[inline(always)]
pub fn split_bits(biased: f64, mask: u32) -> (usize, f32) {
    let index = (high_word(biased) & mask) as usize;
    let frac = with_high_word(biased, NORM_HIGH_WORD) - UNIT_BIT_32;
    (index, frac as f32)
}

/// [`split_bits`] with `floor` arithmetic.
#[inline(always)]
pub fn split_portable(biased: f64, mask: u32) -> (usize, f32) {
    // exact: both operands share a binade
    let phase = biased - UNIT_BIT_32;
    let whole = phase.floor();
    let index = ((whole as i64) & mask as i64) as usize;
    (index, (phase - whole) as f32)
}

/// Bring a biased accumulator back to an un-biased phase in
/// `[0, table_size)`. `table_size` must be a power of two.
#[inline]
pub fn wrap_bits(biased: f64, table_size: f64) -> f64 {
    let bias = UNIT_BIT_32 * table_size;
    let norm = high_word(bias);
    let rebiased = biased + (bias - UNIT_BIT_32);
    with_high_word(rebiased, norm) - bias
}

/// [`wrap_bits`] with `rem_euclid` arithmetic.
#[inline]
pub fn wrap_portable(biased: f64, table_size: f64) -> f64 {
    let bias = UNIT_BIT_32 * table_size;
    // the re-bias rounds the fraction exactly as `wrap_bits` does
    let rebiased = biased + (bias - UNIT_BIT_32);
    (rebiased - bias).rem_euclid(table_size)
}

#[cfg(not(feature = "portable_phase"))]
pub use self::{split_bits as split, wrap_bits as wrap};

#[cfg(feature = "portable_phase")]
pub use self::{split_portable as split, wrap_portable as wrap};
