//! Population count strategies.
//!
//! Interior nodes translate a slot to a dense child position by counting
//! the set bits of the bitmap below that slot. The counting strategy is a
//! type implementing [`PopCount`]; [`ActivePopCount`] is the one the trie
//! uses and is switched with the `popcount-table` feature.
//!
//! Both strategies return identical results for every word.

/// A population count strategy.
pub trait PopCount {
    /// Returns the number of set bits in `word`.
    fn count(word: u32) -> u32;
}

/// Counts bits with [`u32::count_ones`], which lowers to `popcnt` on targets
/// that have it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intrinsic;

impl PopCount for Intrinsic {
    #[inline]
    fn count(word: u32) -> u32 {
        word.count_ones()
    }
}

/// Counts bits one byte at a time through a 256-entry table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupTable;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut index = 1;
    while index < 256 {
        table[index] = (index & 1) as u8 + table[index >> 1];
        index += 1;
    }
    table
}

static BYTE_COUNTS: [u8; 256] = build_table();

impl PopCount for LookupTable {
    #[inline]
    fn count(word: u32) -> u32 {
        word.to_le_bytes()
            .iter()
            .map(|&byte| u32::from(BYTE_COUNTS[usize::from(byte)]))
            .sum()
    }
}

/// The strategy used by the trie.
#[cfg(not(feature = "popcount-table"))]
pub type ActivePopCount = Intrinsic;

/// The strategy used by the trie.
#[cfg(feature = "popcount-table")]
pub type ActivePopCount = LookupTable;
