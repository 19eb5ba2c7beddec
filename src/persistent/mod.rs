//! Persistent (immutable) hash map and its transient builder.
//!
//! - [`PersistentHashMap`]: persistent hash map (HAMT)
//! - [`TransientHashMap`]: mutable builder that freezes into a
//!   `PersistentHashMap`
//!
//! # Structural Sharing
//!
//! Every update rebuilds only the path from the root to the touched entry;
//! all other subtrees are shared with the previous version.
//!
//! ```rust
//! use persistent_hamt::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! # Bulk Construction
//!
//! ```rust
//! use persistent_hamt::persistent::{PersistentHashMap, TransientHashMap};
//!
//! let mut transient = TransientHashMap::new();
//! for index in 0..1_000 {
//!     transient.insert(index, index * 2);
//! }
//! let map: PersistentHashMap<i32, i32> = transient.persistent();
//! assert_eq!(map.len(), 1_000);
//! assert_eq!(map.get(&500), Some(&1_000));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod collision;
mod hashmap;
mod node;
mod sparse_array;
mod transient;

pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIntoIterator;
pub use hashmap::PersistentHashMapIterator;
pub use transient::TransientHashMap;

#[cfg(feature = "rayon")]
pub use hashmap::PersistentHashMapParallelIterator;
#[cfg(feature = "rayon")]
pub use hashmap::PersistentHashMapParallelRefIterator;

// =============================================================================
// Tests
// =============================================================================
