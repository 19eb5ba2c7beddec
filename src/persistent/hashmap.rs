//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentHashMap` is a Hash Array Mapped Trie. Each level of the trie
//! consumes [`BITS_PER_LEVEL`](crate::config::BITS_PER_LEVEL) bits of the
//! key hash to pick one of up to
//! [`BRANCHING_FACTOR`](crate::config::BRANCHING_FACTOR) children.
//!
//! - O(log N) get, with a base of `BRANCHING_FACTOR` (a handful of hops in
//!   practice)
//! - O(log N) insert
//! - O(log N) remove
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original,
//! and structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use persistent_hamt::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("a".to_string(), 1)
//!     .insert("b".to_string(), 2)
//!     .insert("c".to_string(), 3);
//!
//! assert_eq!(map.get("a"), Some(&1));
//! assert_eq!(map.get("b"), Some(&2));
//! assert_eq!(map.get("c"), Some(&3));
//!
//! // Structural sharing: the original map is preserved
//! let without_b = map.remove("b");
//! assert_eq!(map.get("b"), Some(&2));
//! assert_eq!(without_b.get("b"), None);
//! assert_eq!(without_b.len(), 2);
//! ```
//!
//! # Internal Structure
//!
//! The HAMT uses:
//! - Bitmap-indexed interior nodes storing only populated slots
//! - Full interior nodes indexed directly by slot
//! - Collision nodes for keys whose full hashes are equal
//! - Structural sharing via `Rc` (or `Arc` with the `arc` feature)
//!
//! An empty map has no root node at all, so creating one never allocates.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use super::TransientHashMap;
use super::node::{Child, Node, Removal};
use crate::config::MAX_DEPTH;
use crate::hasher::{DefaultHashBuilder, hash_key};

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// `PersistentHashMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// The map is generic over its [`BuildHasher`]. Keys that compare equal must
/// hash identically under it; this is not checked.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `contains_key` | O(log N)          |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
/// | `clone`        | O(1)              |
///
/// # Examples
///
/// ```rust
/// use persistent_hamt::persistent::PersistentHashMap;
///
/// let map = PersistentHashMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct PersistentHashMap<K, V, S = DefaultHashBuilder> {
    /// Root node of the trie, `None` when the map is empty
    root: Option<Child<K, V>>,
    /// Number of entries
    length: usize,
    hash_builder: S,
}

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentHashMap<String, i32>: Send, Sync);

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }
}

impl<K, V, S> PersistentHashMap<K, V, S> {
    /// Creates a new empty map that hashes keys with `hash_builder`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::hash_map::RandomState;
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::with_hasher(RandomState::new())
    ///     .insert("key", 1);
    /// assert_eq!(map.get("key"), Some(&1));
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_hasher(hash_builder: S) -> Self {
        Self {
            root: None,
            length: 0,
            hash_builder,
        }
    }

    /// Wraps a trie built elsewhere. An `Empty` root becomes the empty map.
    pub(crate) fn from_parts(root: Child<K, V>, length: usize, hash_builder: S) -> Self {
        if matches!(*root, Node::Empty) {
            return Self::with_hasher(hash_builder);
        }
        Self {
            root: Some(root),
            length,
            hash_builder,
        }
    }

    /// Returns the map's hash builder.
    #[inline]
    #[must_use]
    pub const fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let empty: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(empty.is_empty());
    ///
    /// let non_empty = empty.insert("key".to_string(), 42);
    /// assert!(!non_empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// Sharing a root implies equal contents. The converse does not hold:
    /// maps built independently compare equal with `==` but not here. All
    /// empty maps share the absent root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("a".to_string(), 1);
    /// assert!(map.ptr_eq(&map.clone()));
    /// assert!(map.ptr_eq(&map.remove("missing")));
    /// assert!(!map.ptr_eq(&map.insert("a".to_string(), 1)));
    /// assert!(map.remove("a").ptr_eq(&PersistentHashMap::new()));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// The order is determined by the key hashes and is otherwise
    /// unspecified. The iterator walks the trie lazily and does not allocate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let mut entries: Vec<_> = map.iter().collect();
    /// entries.sort();
    /// assert_eq!(entries, vec![(&"a".to_string(), &1), (&"b".to_string(), &2)]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator {
            stack: ArrayVec::new(),
            collision: std::slice::Iter::default(),
            pending: self.root.as_deref(),
            remaining: self.length,
        }
    }

    /// Returns an iterator over keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let mut keys: Vec<_> = map.keys().cloned().collect();
    /// keys.sort();
    /// assert_eq!(keys, vec!["a", "b"]);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> Option<&Child<K, V>> {
        self.root.as_ref()
    }

    /// Checks the trie shape and returns the entry count it holds.
    #[cfg(test)]
    pub(crate) fn validate(&self) -> Result<usize, String> {
        self.root.as_ref().map_or(Ok(0), |root| root.validate(0, 0))
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> PersistentHashMap<K, V, S> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and
    /// `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to look up
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and its value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("key".to_string(), 42);
    /// assert_eq!(map.get_key_value("key"), Some((&"key".to_string(), &42)));
    /// ```
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let root = self.root.as_ref()?;
        let hash = hash_key(&self.hash_builder, key);
        root.get_entry(hash, key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to check
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> PersistentHashMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Arguments
    ///
    /// * `key` - The key
    /// * `value` - The value
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get("key"), Some(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone, S: BuildHasher + Clone> PersistentHashMap<K, V, S> {
    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced. Only the
    /// nodes on the path to the key are copied.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert
    /// * `value` - The value to insert
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// assert_eq!(map2.len(), 1);
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = hash_key(&self.hash_builder, &key);
        let (root, added) = match &self.root {
            Some(root) => Node::insert(root, hash, key, value, 0),
            None => (Node::leaf(hash, key, value), true),
        };
        Self::from_parts(
            root,
            if added { self.length + 1 } else { self.length },
            self.hash_builder.clone(),
        )
    }

    /// Removes a key from the map.
    ///
    /// If the key is absent the result shares the original root, so
    /// [`ptr_eq`](Self::ptr_eq) holds between the two.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to remove
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(removed.get("a"), None);
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let hash = hash_key(&self.hash_builder, key);
        match Node::remove(root, hash, key, 0) {
            Removal::Absent => self.clone(),
            Removal::Emptied => Self::with_hasher(self.hash_builder.clone()),
            Removal::Replaced(root) => {
                Self::from_parts(root, self.length - 1, self.hash_builder.clone())
            }
        }
    }

    /// Updates the value for a key by applying a function.
    ///
    /// Returns `None` if the key does not exist.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to update
    /// * `function` - The function to apply to the value
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    /// let updated = map.update("count", |value| value + 1);
    ///
    /// assert_eq!(updated.unwrap().get("count"), Some(&11));
    /// assert!(map.update("missing", |value| value + 1).is_none());
    /// ```
    #[must_use]
    pub fn update<Q, F>(&self, key: &Q, function: F) -> Option<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> V,
    {
        let (stored_key, value) = self.get_key_value(key)?;
        Some(self.insert(stored_key.clone(), function(value)))
    }

    /// Updates or removes a value for a key using an updater function.
    ///
    /// The updater function receives `Some(&V)` if the key exists, or `None` if it doesn't.
    /// If the updater returns `Some(V)`, the value is inserted or updated.
    /// If the updater returns `None`, the key is removed (if it exists).
    ///
    /// # Arguments
    ///
    /// * `key` - The key to update
    /// * `updater` - A function that receives the current value (or None) and returns
    ///   the new value (or None to remove)
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let updated = map.update_with("count", |maybe_value| {
    ///     maybe_value.map(|value| value + 1)
    /// });
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// // Insert if not exists
    /// let inserted = map.update_with("new_key", |maybe_value| {
    ///     Some(maybe_value.copied().unwrap_or(100))
    /// });
    /// assert_eq!(inserted.get("new_key"), Some(&100));
    ///
    /// // Remove by returning None
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.get_key_value(key);
        match (current, updater(current.map(|(_, value)| value))) {
            (Some((stored_key, _)), Some(value)) => self.insert(stored_key.clone(), value),
            (Some(_), None) => self.remove(key),
            (None, Some(value)) => self.insert(key.to_owned(), value),
            (None, None) => self.clone(),
        }
    }

    /// Merges two maps, with values from `other` taking precedence on key conflicts.
    ///
    /// Subtrees of `self` that no key of `other` reaches stay shared.
    ///
    /// # Arguments
    ///
    /// * `other` - The map to merge with
    ///
    /// # Complexity
    ///
    /// O(m log N) where m is the size of `other`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = PersistentHashMap::new()
    ///     .insert("b".to_string(), 20)
    ///     .insert("c".to_string(), 3);
    ///
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&20)); // From map2
    /// assert_eq!(merged.get("c"), Some(&3));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        let mut transient = self.clone().transient();
        transient.extend(
            other
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        transient.persistent()
    }

    /// Converts this map into a transient map for batch updates.
    ///
    /// The transient shares every node with this map and copies a node only
    /// when it first modifies it, so other versions stay untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("a".to_string(), 1);
    /// let mut transient = map.clone().transient();
    /// transient.insert("b".to_string(), 2);
    /// transient.remove("a");
    /// let updated = transient.persistent();
    ///
    /// assert_eq!(map.get("a"), Some(&1));
    /// assert_eq!(updated.get("a"), None);
    /// assert_eq!(updated.get("b"), Some(&2));
    /// ```
    #[must_use]
    pub fn transient(self) -> TransientHashMap<K, V, S> {
        TransientHashMap::from_parts(
            self.root.unwrap_or_else(Node::empty),
            self.length,
            self.hash_builder,
        )
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentHashMap`].
///
/// Keeps one slice iterator per interior level on an inline stack, so it
/// never allocates.
pub struct PersistentHashMapIterator<'a, K, V> {
    stack: ArrayVec<std::slice::Iter<'a, Child<K, V>>, MAX_DEPTH>,
    collision: std::slice::Iter<'a, (K, V)>,
    pending: Option<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.collision.next() {
                self.remaining -= 1;
                return Some((key, value));
            }
            let node = match self.pending.take() {
                Some(node) => node,
                None => {
                    let level = self.stack.last_mut()?;
                    if let Some(child) = level.next() {
                        &**child
                    } else {
                        self.stack.pop();
                        continue;
                    }
                }
            };
            match node {
                Node::Empty => {}
                Node::Leaf { key, value, .. } => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Node::Collision { entries, .. } => self.collision = entries.as_slice().iter(),
                Node::BitmapIndexed { children, .. } | Node::Full { children } => {
                    self.stack.push(children.iter());
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for PersistentHashMapIterator<'_, K, V> {}

/// An owning iterator over key-value pairs of a [`PersistentHashMap`].
pub struct PersistentHashMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentHashMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> FusedIterator for PersistentHashMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, S: Clone> Clone for PersistentHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S: Default> Default for PersistentHashMap<K, V, S> {
    #[inline]
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> FromIterator<(K, V)> for PersistentHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientHashMap::with_hasher(S::default());
        transient.extend(iter);
        transient.persistent()
    }
}

impl<K: Clone, V: Clone, S> IntoIterator for PersistentHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = PersistentHashMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentHashMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a PersistentHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq, S: BuildHasher> PartialEq for PersistentHashMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.length != other.length {
            return false;
        }

        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher> Eq for PersistentHashMap<K, V, S> {}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for PersistentHashMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, S> serde::Serialize for PersistentHashMap<K, V, S>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentHashMapVisitor<K, V, S> {
    marker: std::marker::PhantomData<fn() -> PersistentHashMap<K, V, S>>,
}

#[cfg(feature = "serde")]
impl<K, V, S> PersistentHashMapVisitor<K, V, S> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::de::Visitor<'de> for PersistentHashMapVisitor<K, V, S>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
    S: BuildHasher + Default,
{
    type Value = PersistentHashMap<K, V, S>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        // Later duplicates win, as with repeated insert.
        let mut transient = TransientHashMap::with_hasher(S::default());
        while let Some((key, value)) = access.next_entry()? {
            transient.insert(key, value);
        }
        Ok(transient.persistent())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::Deserialize<'de> for PersistentHashMap<K, V, S>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentHashMapVisitor::new())
    }
}

// =============================================================================
// Rayon Support
// =============================================================================

#[cfg(feature = "rayon")]
mod parallel {
    use rayon::iter::plumbing::{Consumer, ProducerCallback, UnindexedConsumer};
    use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

    use super::PersistentHashMap;

    /// A parallel iterator over references to the entries of a
    /// [`PersistentHashMap`].
    pub struct PersistentHashMapParallelRefIterator<'a, K, V> {
        inner: rayon::vec::IntoIter<(&'a K, &'a V)>,
    }

    /// A parallel iterator over the owned entries of a [`PersistentHashMap`].
    pub struct PersistentHashMapParallelIterator<K, V> {
        inner: rayon::vec::IntoIter<(K, V)>,
    }

    impl<K: Sync, V: Sync, S> PersistentHashMap<K, V, S> {
        /// Returns a parallel iterator over key-value pairs.
        ///
        /// # Examples
        ///
        /// ```rust
        /// use persistent_hamt::persistent::PersistentHashMap;
        /// use rayon::prelude::*;
        ///
        /// let map: PersistentHashMap<i32, i32> = (0..100).map(|key| (key, key * 2)).collect();
        /// let sum: i32 = map.par_iter().map(|(_, value)| *value).sum();
        /// assert_eq!(sum, 9900);
        /// ```
        #[must_use]
        pub fn par_iter(&self) -> PersistentHashMapParallelRefIterator<'_, K, V> {
            PersistentHashMapParallelRefIterator {
                inner: self.iter().collect::<Vec<_>>().into_par_iter(),
            }
        }
    }

    impl<'a, K: Sync, V: Sync, S> IntoParallelIterator for &'a PersistentHashMap<K, V, S> {
        type Item = (&'a K, &'a V);
        type Iter = PersistentHashMapParallelRefIterator<'a, K, V>;

        fn into_par_iter(self) -> Self::Iter {
            self.par_iter()
        }
    }

    impl<K: Clone + Send, V: Clone + Send, S> IntoParallelIterator for PersistentHashMap<K, V, S> {
        type Item = (K, V);
        type Iter = PersistentHashMapParallelIterator<K, V>;

        fn into_par_iter(self) -> Self::Iter {
            PersistentHashMapParallelIterator {
                inner: self.into_iter().collect::<Vec<_>>().into_par_iter(),
            }
        }
    }

    impl<'a, K: Sync, V: Sync> ParallelIterator for PersistentHashMapParallelRefIterator<'a, K, V> {
        type Item = (&'a K, &'a V);

        fn drive_unindexed<C>(self, consumer: C) -> C::Result
        where
            C: UnindexedConsumer<Self::Item>,
        {
            self.inner.drive_unindexed(consumer)
        }

        fn opt_len(&self) -> Option<usize> {
            Some(self.inner.len())
        }
    }

    impl<K: Sync, V: Sync> IndexedParallelIterator for PersistentHashMapParallelRefIterator<'_, K, V> {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn drive<C: Consumer<Self::Item>>(self, consumer: C) -> C::Result {
            self.inner.drive(consumer)
        }

        fn with_producer<CB: ProducerCallback<Self::Item>>(self, callback: CB) -> CB::Output {
            self.inner.with_producer(callback)
        }
    }

    impl<K: Send, V: Send> ParallelIterator for PersistentHashMapParallelIterator<K, V> {
        type Item = (K, V);

        fn drive_unindexed<C>(self, consumer: C) -> C::Result
        where
            C: UnindexedConsumer<Self::Item>,
        {
            self.inner.drive_unindexed(consumer)
        }

        fn opt_len(&self) -> Option<usize> {
            Some(self.inner.len())
        }
    }

    impl<K: Send, V: Send> IndexedParallelIterator for PersistentHashMapParallelIterator<K, V> {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn drive<C: Consumer<Self::Item>>(self, consumer: C) -> C::Result {
            self.inner.drive(consumer)
        }

        fn with_producer<CB: ProducerCallback<Self::Item>>(self, callback: CB) -> CB::Output {
            self.inner.with_producer(callback)
        }
    }
}

#[cfg(feature = "rayon")]
pub use parallel::{PersistentHashMapParallelIterator, PersistentHashMapParallelRefIterator};

// =============================================================================
// Tests
// =============================================================================
