//! Transient (temporarily mutable) hash map for batch construction.
//!
//! A [`TransientHashMap`] owns its trie and updates nodes in place instead
//! of copying the path on every operation. Nodes it shares with a
//! [`PersistentHashMap`] (after [`PersistentHashMap::transient`]) are copied
//! the first time they are modified, so no persistent version ever changes.
//!
//! There are two ways to finish a batch:
//!
//! - [`TransientHashMap::persistent`] consumes the builder; the compiler
//!   rejects any later use.
//! - [`TransientHashMap::freeze`] takes `&mut self` for builders that cannot
//!   be moved out of. The builder is left frozen: updates and conversions
//!   fail with [`TransientError::UsedAfterFreeze`] from the `try_` methods
//!   and panic from the infallible ones.
//!
//! Reads on a frozen builder do not fail. [`get`](TransientHashMap::get),
//! [`contains_key`](TransientHashMap::contains_key) and
//! [`len`](TransientHashMap::len) see no entries, since those went to the
//! frozen map. Check [`is_frozen`](TransientHashMap::is_frozen) to tell a
//! frozen builder from an empty one.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::rc::Rc;

use super::PersistentHashMap;
use super::node::{Child, Node};
use crate::error::TransientError;
use crate::hasher::{DefaultHashBuilder, hash_key};

// =============================================================================
// TransientHashMap Definition
// =============================================================================

/// A transient (temporarily mutable) hash map for efficient batch updates.
///
/// # Design
///
/// - Nodes are updated in place while the transient is their only owner
/// - `PhantomData<Rc<()>>` ensures `!Send` and `!Sync`
/// - Clone/Copy traits are not implemented
///
/// # Examples
///
/// ```rust
/// use persistent_hamt::persistent::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// transient.insert("a".to_string(), 1);
/// transient.insert("b".to_string(), 2);
/// assert_eq!(transient.insert("a".to_string(), 10), Some(1));
///
/// let map = transient.persistent();
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("a"), Some(&10));
/// ```
///
/// A transient cannot leave its thread:
///
/// ```rust,compile_fail
/// use persistent_hamt::persistent::TransientHashMap;
///
/// let transient: TransientHashMap<i32, i32> = TransientHashMap::new();
/// std::thread::spawn(move || drop(transient));
/// ```
pub struct TransientHashMap<K, V, S = DefaultHashBuilder> {
    /// Root node of the trie, `None` once frozen
    root: Option<Child<K, V>>,
    /// Number of entries
    length: usize,
    hash_builder: S,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHashMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashMap<String, String>: Send, Sync);

// Arc feature verification: even with Arc nodes, the transient stays !Send/!Sync
#[cfg(feature = "arc")]
mod arc_send_sync_verification {
    use super::TransientHashMap;
    use std::sync::Arc;

    static_assertions::assert_not_impl_any!(TransientHashMap<Arc<i32>, i32>: Send, Sync);
    static_assertions::assert_not_impl_any!(TransientHashMap<Arc<String>, String>: Send, Sync);
}

fn used_after_freeze(operation: &'static str) -> TransientError {
    tracing::warn!(operation, "transient used after freeze");
    TransientError::UsedAfterFreeze { operation }
}

// =============================================================================
// TransientHashMap Implementation
// =============================================================================

impl<K, V> TransientHashMap<K, V> {
    /// Creates a new empty `TransientHashMap`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let transient: TransientHashMap<String, i32> = TransientHashMap::new();
    /// assert!(transient.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }
}

impl<K, V, S> TransientHashMap<K, V, S> {
    /// Creates a new empty `TransientHashMap` that hashes keys with
    /// `hash_builder`.
    #[must_use]
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::from_parts(Node::empty(), 0, hash_builder)
    }

    pub(crate) const fn from_parts(root: Child<K, V>, length: usize, hash_builder: S) -> Self {
        Self {
            root: Some(root),
            length,
            hash_builder,
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries in the map, or 0 once frozen.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// assert_eq!(transient.len(), 0);
    /// transient.insert("key".to_string(), 42);
    /// assert_eq!(transient.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries. A frozen transient
    /// reports `true`; see [`is_frozen`](Self::is_frozen).
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` once [`freeze`](Self::freeze) has been called.
    #[inline]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.root.is_none()
    }

    /// Converts this transient map into a persistent map.
    ///
    /// Consumes the transient, so it cannot be used afterwards:
    ///
    /// ```rust,compile_fail
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("a", 1);
    /// let map = transient.persistent();
    /// transient.insert("b", 2);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the transient has been frozen. Use
    /// [`try_persistent`](Self::try_persistent) to get an error instead.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("a", 1);
    /// let map = transient.persistent();
    /// assert_eq!(map.get("a"), Some(&1));
    /// ```
    #[must_use]
    pub fn persistent(self) -> PersistentHashMap<K, V, S> {
        self.convert_as("persistent")
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Converts this transient map into a persistent map, failing if the
    /// transient has been frozen.
    ///
    /// # Errors
    ///
    /// Returns [`TransientError::UsedAfterFreeze`] after [`freeze`](Self::freeze).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::TransientError;
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("a", 1);
    /// let _map = transient.freeze().unwrap();
    /// assert_eq!(
    ///     transient.try_persistent().unwrap_err(),
    ///     TransientError::UsedAfterFreeze { operation: "try_persistent" }
    /// );
    /// ```
    pub fn try_persistent(self) -> Result<PersistentHashMap<K, V, S>, TransientError> {
        self.convert_as("try_persistent")
    }

    fn convert_as(
        self,
        operation: &'static str,
    ) -> Result<PersistentHashMap<K, V, S>, TransientError> {
        let root = self.root.ok_or_else(|| used_after_freeze(operation))?;
        tracing::debug!(entries = self.length, "transient made persistent");
        Ok(PersistentHashMap::from_parts(
            root,
            self.length,
            self.hash_builder,
        ))
    }

    fn live_root(&mut self, operation: &'static str) -> Result<&mut Child<K, V>, TransientError> {
        self.root
            .as_mut()
            .ok_or_else(|| used_after_freeze(operation))
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> TransientHashMap<K, V, S> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// Returns `None` for every key once the transient is frozen.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("hello".to_string(), 42);
    /// assert_eq!(transient.get("hello"), Some(&42));
    /// assert_eq!(transient.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let root = self.root.as_ref()?;
        let hash = hash_key(&self.hash_builder, key);
        root.get_entry(hash, key).map(|(_, value)| value)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone, S: BuildHasher> TransientHashMap<K, V, S> {
    /// Inserts a key-value pair into the map.
    ///
    /// Returns the previous value if the key was present.
    ///
    /// # Panics
    ///
    /// Panics if the transient has been frozen. Use
    /// [`try_insert`](Self::try_insert) to get an error instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// assert_eq!(transient.insert("key".to_string(), 1), None);
    /// assert_eq!(transient.insert("key".to_string(), 2), Some(1));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.insert_as("insert", key, value)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Inserts a key-value pair, failing if the transient has been frozen.
    ///
    /// # Errors
    ///
    /// Returns [`TransientError::UsedAfterFreeze`] after [`freeze`](Self::freeze).
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, TransientError> {
        self.insert_as("try_insert", key, value)
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// # Panics
    ///
    /// Panics if the transient has been frozen. Use
    /// [`try_remove`](Self::try_remove) to get an error instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("key".to_string(), 42);
    /// assert_eq!(transient.remove("key"), Some(42));
    /// assert_eq!(transient.remove("key"), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_as("remove", key)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Removes a key, failing if the transient has been frozen.
    ///
    /// # Errors
    ///
    /// Returns [`TransientError::UsedAfterFreeze`] after [`freeze`](Self::freeze).
    pub fn try_remove<Q>(&mut self, key: &Q) -> Result<Option<V>, TransientError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_as("try_remove", key)
    }

    fn insert_as(
        &mut self,
        operation: &'static str,
        key: K,
        value: V,
    ) -> Result<Option<V>, TransientError> {
        let hash = hash_key(&self.hash_builder, &key);
        let root = self.live_root(operation)?;
        let previous = Node::insert_mut(root, hash, key, value, 0);
        if previous.is_none() {
            self.length += 1;
        }
        Ok(previous)
    }

    fn remove_as<Q>(&mut self, operation: &'static str, key: &Q) -> Result<Option<V>, TransientError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_key(&self.hash_builder, key);
        let root = self.live_root(operation)?;
        // an absent key must not unshare the path
        if root.get_entry(hash, key).is_none() {
            return Ok(None);
        }
        let removed = Node::remove_mut(root, hash, key, 0);
        if removed.is_some() {
            self.length -= 1;
        }
        Ok(removed)
    }
}

impl<K, V, S: Clone> TransientHashMap<K, V, S> {
    /// Produces the persistent map and leaves this transient frozen.
    ///
    /// # Errors
    ///
    /// Returns [`TransientError::UsedAfterFreeze`] if called twice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_hamt::TransientError;
    /// use persistent_hamt::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// transient.insert("a", 1);
    ///
    /// let map = transient.freeze().unwrap();
    /// assert_eq!(map.get("a"), Some(&1));
    /// assert!(transient.is_frozen());
    /// assert_eq!(transient.get("a"), None);
    /// assert_eq!(
    ///     transient.freeze().unwrap_err(),
    ///     TransientError::UsedAfterFreeze { operation: "freeze" }
    /// );
    /// ```
    pub fn freeze(&mut self) -> Result<PersistentHashMap<K, V, S>, TransientError> {
        let root = self.root.take().ok_or_else(|| used_after_freeze("freeze"))?;
        let length = std::mem::take(&mut self.length);
        tracing::debug!(entries = length, "transient frozen");
        Ok(PersistentHashMap::from_parts(
            root,
            length,
            self.hash_builder.clone(),
        ))
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, S: Default> Default for TransientHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K: Clone + Hash + Eq, V: Clone, S: BuildHasher> Extend<(K, V)> for TransientHashMap<K, V, S> {
    /// # Panics
    ///
    /// Panics if the transient has been frozen.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for TransientHashMap<K, V, S>
where
    K: Clone + Hash + Eq,
    V: Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = Self::default();
        transient.extend(iter);
        transient
    }
}

impl<K, V, S> fmt::Debug for TransientHashMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransientHashMap")
            .field("len", &self.length)
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
