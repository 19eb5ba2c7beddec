//! # persistent-hamt
//!
//! A persistent (immutable, structurally shared) hash map built on a
//! hash-array mapped trie.
//!
//! ## Overview
//!
//! - **[`PersistentHashMap`](persistent::PersistentHashMap)**: every update
//!   returns a new map and leaves the old one valid; unchanged subtrees are
//!   shared between versions.
//! - **[`TransientHashMap`](persistent::TransientHashMap)**: a temporarily
//!   mutable builder that grows nodes in place and is then frozen into a
//!   persistent map.
//! - **Tunables**: branching factor, popcount strategy and hash function are
//!   selected at build time (see [`config`], [`popcount`], [`hasher`]).
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes with `Arc` so maps are `Send + Sync`
//! - `serde`: `Serialize`/`Deserialize` for `PersistentHashMap`
//! - `rayon`: parallel iterators (implies `arc`)
//! - `fxhash` / `ahash`: faster default hash functions
//! - `popcount-table`: lookup-table population count instead of `count_ones`
//! - `branch-32`: 32-way nodes instead of 16-way
//!
//! ## Example
//!
//! ```rust
//! use persistent_hamt::prelude::*;
//!
//! let map = PersistentHashMap::new()
//!     .insert("a", 1)
//!     .insert("b", 2)
//!     .insert("c", 3);
//! assert_eq!(map.get("b"), Some(&2));
//!
//! let without_b = map.remove("b");
//! assert_eq!(without_b.get("b"), None);
//! assert_eq!(without_b.get("a"), Some(&1));
//! assert_eq!(map.get("b"), Some(&2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// ```rust
/// use persistent_hamt::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::TransientError;
    pub use crate::persistent::*;
}

pub mod config;
pub mod error;
pub mod hasher;
pub mod persistent;
pub mod popcount;

pub use error::TransientError;
pub use persistent::{PersistentHashMap, TransientHashMap};
