//! Build-time tunables of the trie.
//!
//! Each level of the trie consumes [`BITS_PER_LEVEL`] bits of a key's
//! 64-bit hash, starting with the least-significant chunk:
//!
//! ```text
//! slot at level n = (hash >> (n * BITS_PER_LEVEL)) & MASK
//! ```
//!
//! The default of 4 bits (16-way nodes) trades a slightly deeper trie for
//! cheaper copy-on-write splices than Bagwell's 32-way nodes; the
//! `branch-32` feature restores 5 bits per level.

/// Width of a key hash in bits.
pub const HASH_BITS: u32 = u64::BITS;

/// Hash bits consumed per trie level.
#[cfg(not(feature = "branch-32"))]
pub const BITS_PER_LEVEL: u32 = 4;

/// Hash bits consumed per trie level.
#[cfg(feature = "branch-32")]
pub const BITS_PER_LEVEL: u32 = 5;

/// Maximum number of children of an interior node (`2^BITS_PER_LEVEL`).
pub const BRANCHING_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Mask selecting one level's chunk of a hash.
pub const MASK: u64 = (BRANCHING_FACTOR - 1) as u64;

/// Bitmap of an interior node with every slot populated.
#[allow(clippy::cast_possible_truncation)]
pub const FULL_BITMAP: u32 = u32::MAX >> (u32::BITS - BRANCHING_FACTOR as u32);

/// Maximum number of interior levels, `ceil(HASH_BITS / BITS_PER_LEVEL)`.
pub const MAX_DEPTH: usize = HASH_BITS.div_ceil(BITS_PER_LEVEL) as usize;

static_assertions::const_assert!(BITS_PER_LEVEL >= 2 && BITS_PER_LEVEL <= 5);
static_assertions::const_assert_eq!(FULL_BITMAP.count_ones() as usize, BRANCHING_FACTOR);
