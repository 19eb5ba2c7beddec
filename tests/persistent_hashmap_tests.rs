//! Unit tests for PersistentHashMap.
//!
//! Covers the public operations end to end, including keys with colliding
//! hashes and keys whose hashes only differ deep in the trie.

use persistent_hamt::persistent::PersistentHashMap;
use rstest::rstest;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasherDefault, Hash, Hasher};

// =============================================================================
// Test Keys and Hashers
// =============================================================================

/// A type that always produces the same hash value for collision testing.
#[derive(Clone, PartialEq, Eq, Debug)]
struct CollidingKey {
    value: u32,
}

impl CollidingKey {
    fn new(value: u32) -> Self {
        CollidingKey { value }
    }
}

impl Hash for CollidingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Always hash to the same value to force collisions
        42u64.hash(state);
    }
}

/// Hashes a `u64` to itself, so tests choose the trie path of every key.
#[derive(Default)]
struct IdentityHasher {
    hash: u64,
}

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.hash = (self.hash << 8) | u64::from(*byte);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.hash = value;
    }
}

type IdentityMap<V> = PersistentHashMap<u64, V, BuildHasherDefault<IdentityHasher>>;

/// A key whose hash under [`IdentityHasher`] is `hash`; keys with equal
/// `hash` and different `id` collide.
#[derive(Clone, PartialEq, Eq, Debug)]
struct PathKey {
    hash: u64,
    id: u32,
}

impl PathKey {
    fn new(hash: u64, id: u32) -> Self {
        PathKey { hash, id }
    }
}

impl Hash for PathKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

type PathMap = PersistentHashMap<PathKey, u32, BuildHasherDefault<IdentityHasher>>;

// =============================================================================
// Empty Map
// =============================================================================

#[rstest]
fn test_new_creates_empty_map() {
    let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
    assert_eq!(map.get("key"), None);
    assert!(!map.contains_key("key"));
}

#[rstest]
fn test_default_equals_new() {
    let map: PersistentHashMap<String, i32> = PersistentHashMap::default();
    assert_eq!(map, PersistentHashMap::new());
}

#[rstest]
fn test_remove_on_empty_map_is_noop() {
    let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    let removed = map.remove("key");
    assert!(removed.is_empty());
    assert!(removed.ptr_eq(&map));
}

// =============================================================================
// Insert, Lookup and Delete
// =============================================================================

#[rstest]
fn test_insert_lookup_delete_scenario() {
    let map = PersistentHashMap::new()
        .insert("a", 1)
        .insert("b", 2)
        .insert("c", 3);

    assert_eq!(map.get("b"), Some(&2));
    assert_eq!(map.len(), 3);

    let without_b = map.remove("b");
    assert_eq!(without_b.get("b"), None);
    assert_eq!(without_b.get("a"), Some(&1));
    assert_eq!(without_b.get("c"), Some(&3));
    assert_eq!(without_b.len(), 2);

    assert_eq!(map.get("b"), Some(&2));
    assert_eq!(map.len(), 3);
}

#[rstest]
fn test_insert_does_not_modify_original() {
    let map1 = PersistentHashMap::new().insert("key".to_string(), 1);
    let map2 = map1.insert("key2".to_string(), 2);

    assert_eq!(map1.len(), 1);
    assert_eq!(map1.get("key2"), None);
    assert_eq!(map2.len(), 2);
    assert_eq!(map2.get("key2"), Some(&2));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn test_insert_overwrites_existing_key(#[case] overwrites: i32) {
    let map = PersistentHashMap::new()
        .insert("key".to_string(), 0)
        .insert("other".to_string(), -1);
    let updated = (1..=overwrites).fold(map.clone(), |map, value| {
        map.insert("key".to_string(), value)
    });

    assert_eq!(updated.get("key"), Some(&overwrites));
    assert_eq!(updated.len(), 2);
    assert_eq!(map.get("key"), Some(&0));
}

#[rstest]
fn test_remove_absent_key_returns_same_map() {
    let map: PersistentHashMap<i32, i32> = (0..1_000).map(|key| (key, key)).collect();
    let same = map.remove(&5_000);

    assert!(same.ptr_eq(&map));
    assert_eq!(same.len(), 1_000);
}

#[rstest]
fn test_remove_all_entries() {
    let keys = ["a", "b", "c", "d"];
    let map: PersistentHashMap<&str, usize> =
        keys.iter().enumerate().map(|(index, key)| (*key, index)).collect();

    let emptied = keys.iter().fold(map, |map, key| map.remove(key));
    assert!(emptied.is_empty());
    assert_eq!(emptied.iter().count(), 0);
}

#[rstest]
fn test_lookup_by_borrowed_form() {
    let map = PersistentHashMap::new()
        .insert("hello".to_string(), 1)
        .insert(String::new(), 2);

    assert_eq!(map.get("hello"), Some(&1));
    assert_eq!(map.get(""), Some(&2));
    assert_eq!(
        map.get_key_value("hello"),
        Some((&"hello".to_string(), &1))
    );
    assert_eq!(map.remove("hello").len(), 1);
}

#[rstest]
#[case(100)]
#[case(10_000)]
fn test_large_map(#[case] size: i64) {
    let map: PersistentHashMap<i64, i64> = (0..size).map(|key| (key, key * key)).collect();
    assert_eq!(map.len(), size as usize);
    assert!((0..size).all(|key| map.get(&key) == Some(&(key * key))));
    assert_eq!(map.get(&size), None);

    let evens = (0..size)
        .filter(|key| key % 2 == 1)
        .fold(map.clone(), |map, key| map.remove(&key));
    assert_eq!(evens.len(), (size / 2) as usize);
    assert!((0..size).all(|key| evens.contains_key(&key) == (key % 2 == 0)));
    assert_eq!(map.len(), size as usize);
}

// =============================================================================
// Hash Collisions
// =============================================================================

#[rstest]
fn test_hash_collision_insert() {
    let key1 = CollidingKey::new(1);
    let key2 = CollidingKey::new(2);
    let key3 = CollidingKey::new(3);

    let map = PersistentHashMap::new()
        .insert(key1.clone(), "one".to_string())
        .insert(key2.clone(), "two".to_string())
        .insert(key3.clone(), "three".to_string());

    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&key1), Some(&"one".to_string()));
    assert_eq!(map.get(&key2), Some(&"two".to_string()));
    assert_eq!(map.get(&key3), Some(&"three".to_string()));
    assert_eq!(map.get(&CollidingKey::new(4)), None);
}

#[rstest]
fn test_hash_collision_overwrite() {
    let key = CollidingKey::new(1);

    let map1 = PersistentHashMap::new()
        .insert(key.clone(), "first".to_string())
        .insert(CollidingKey::new(2), "other".to_string());
    let map2 = map1.insert(key.clone(), "second".to_string());

    assert_eq!(map1.get(&key), Some(&"first".to_string()));
    assert_eq!(map2.get(&key), Some(&"second".to_string()));
    assert_eq!(map2.len(), 2);
}

#[rstest]
fn test_hash_collision_remove_down_to_empty() {
    let keys: Vec<CollidingKey> = (0..4).map(CollidingKey::new).collect();
    let map: PersistentHashMap<CollidingKey, u32> =
        keys.iter().map(|key| (key.clone(), key.value)).collect();

    let mut current = map.clone();
    for (removed, key) in keys.iter().enumerate() {
        assert_eq!(current.remove(&CollidingKey::new(99)).len(), current.len());
        current = current.remove(key);
        assert_eq!(current.len(), keys.len() - removed - 1);
        assert_eq!(current.get(key), None);
        for survivor in &keys[removed + 1..] {
            assert_eq!(current.get(survivor), Some(&survivor.value));
        }
    }
    assert!(current.is_empty());
    assert_eq!(map.len(), 4);
}

#[rstest]
fn test_collision_next_to_ordinary_keys() {
    // 0x21 and 0x01 share their lowest chunk; 0x21 holds a collision
    let keys = [
        PathKey::new(0x21, 0),
        PathKey::new(0x21, 1),
        PathKey::new(0x01, 2),
        PathKey::new(0x31, 3),
    ];
    let map: PathMap = keys.iter().map(|key| (key.clone(), key.id)).collect();
    for key in &keys {
        assert_eq!(map.get(key), Some(&key.id));
    }
    assert_eq!(map.get(&PathKey::new(0x21, 9)), None);

    let collision_only = map.remove(&keys[2]).remove(&keys[3]);
    assert_eq!(collision_only.len(), 2);
    assert_eq!(collision_only.get(&keys[0]), Some(&0));
    assert_eq!(collision_only.get(&keys[1]), Some(&1));

    let single = collision_only.remove(&keys[0]);
    assert_eq!(single.len(), 1);
    assert_eq!(single.get(&keys[1]), Some(&1));
    assert_eq!(single.iter().count(), 1);
}

// =============================================================================
// Trie Shape
// =============================================================================

#[rstest]
fn test_keys_differing_only_in_high_bits() {
    let keys: Vec<u64> = (0..16).map(|index| index << 60).collect();
    let map: IdentityMap<u64> = keys.iter().map(|key| (*key, *key >> 60)).collect();

    assert_eq!(map.len(), 16);
    for key in &keys {
        assert_eq!(map.get(key), Some(&(key >> 60)));
    }
    assert_eq!(map.get(&(1 << 59)), None);

    let thinned = keys.iter().skip(1).fold(map, |map, key| map.remove(key));
    assert_eq!(thinned.len(), 1);
    assert_eq!(thinned.get(&0), Some(&0));
}

#[rstest]
fn test_extreme_hashes() {
    let map: IdentityMap<&str> = [(0, "zero"), (u64::MAX, "max"), (u64::MAX - 1, "max-1")]
        .into_iter()
        .collect();

    assert_eq!(map.get(&0), Some(&"zero"));
    assert_eq!(map.get(&u64::MAX), Some(&"max"));
    assert_eq!(map.get(&(u64::MAX - 1)), Some(&"max-1"));
    assert_eq!(map.remove(&u64::MAX).get(&(u64::MAX - 1)), Some(&"max-1"));
}

#[rstest]
fn test_with_hasher_keeps_builder() {
    let hasher = RandomState::new();
    let map = PersistentHashMap::with_hasher(hasher.clone())
        .insert("a", 1)
        .insert("b", 2);

    assert_eq!(map.get("a"), Some(&1));
    assert_eq!(map.remove("a").get("b"), Some(&2));
    let _: &RandomState = map.hasher();
}

// =============================================================================
// Update and Merge
// =============================================================================

#[rstest]
fn test_update_existing_key() {
    let map = PersistentHashMap::new().insert("count".to_string(), 10);
    let updated = map.update("count", |value| value * 3).unwrap();

    assert_eq!(updated.get("count"), Some(&30));
    assert_eq!(map.get("count"), Some(&10));
}

#[rstest]
fn test_update_nonexistent_key_returns_none() {
    let map = PersistentHashMap::new().insert("count".to_string(), 10);
    assert!(map.update("missing", |value| value + 1).is_none());
}

#[rstest]
#[case::update(Some(5), Some(6))]
#[case::remove(Some(5), None)]
#[case::insert(None, Some(100))]
#[case::untouched(None, None)]
fn test_update_with_cases(#[case] initial: Option<i32>, #[case] replacement: Option<i32>) {
    let map: PersistentHashMap<String, i32> = match initial {
        Some(value) => PersistentHashMap::singleton("key".to_string(), value),
        None => PersistentHashMap::new(),
    };
    let mut seen = None;
    let updated = map.update_with("key", |current| {
        seen = current.copied();
        replacement
    });

    assert_eq!(seen, initial);
    assert_eq!(updated.get("key").copied(), replacement);
    assert_eq!(updated.len(), usize::from(replacement.is_some()));
}

#[rstest]
fn test_merge_overlapping_maps_prefers_other() {
    let left: PersistentHashMap<i32, &str> = (0..100).map(|key| (key, "left")).collect();
    let right: PersistentHashMap<i32, &str> = (50..150).map(|key| (key, "right")).collect();

    let merged = left.merge(&right);
    assert_eq!(merged.len(), 150);
    assert!((0..50).all(|key| merged.get(&key) == Some(&"left")));
    assert!((50..150).all(|key| merged.get(&key) == Some(&"right")));
    assert_eq!(left.len(), 100);
    assert!(left.values().all(|value| *value == "left"));
}

// =============================================================================
// Iteration and Standard Traits
// =============================================================================

#[rstest]
fn test_iter_yields_every_entry_once() {
    let map: PersistentHashMap<String, usize> = (0..300)
        .map(|index| (format!("key-{index}"), index))
        .collect();

    let mut values: Vec<usize> = map.values().copied().collect();
    values.sort_unstable();
    assert_eq!(values, (0..300).collect::<Vec<_>>());
    assert_eq!(map.keys().count(), 300);
    assert_eq!(map.iter().len(), 300);
    assert!(map.iter().all(|(key, value)| *key == format!("key-{value}")));
}

#[rstest]
fn test_iter_includes_colliding_entries() {
    let map: PersistentHashMap<CollidingKey, u32> = (0..5)
        .map(|value| (CollidingKey::new(value), value))
        .collect();
    let mut values: Vec<u32> = (&map).into_iter().map(|(_, value)| *value).collect();
    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
}

#[rstest]
fn test_owned_into_iter() {
    let map: PersistentHashMap<String, i32> =
        [("x".to_string(), 1), ("y".to_string(), 2)].into_iter().collect();
    let mut entries: Vec<(String, i32)> = map.into_iter().collect();
    entries.sort();
    assert_eq!(entries, vec![("x".to_string(), 1), ("y".to_string(), 2)]);
}

#[rstest]
fn test_equality_is_by_entries() {
    let forwards: PersistentHashMap<i32, i32> = (0..200).map(|key| (key, key)).collect();
    let backwards: PersistentHashMap<i32, i32> = (0..200).rev().map(|key| (key, key)).collect();

    assert_eq!(forwards, backwards);
    assert!(!forwards.ptr_eq(&backwards));
    assert_ne!(forwards, backwards.insert(0, -1));
    assert_ne!(forwards, backwards.remove(&0));
}

#[rstest]
fn test_clone_shares_root() {
    let map: PersistentHashMap<i32, i32> = (0..10).map(|key| (key, key)).collect();
    let clone = map.clone();
    assert!(clone.ptr_eq(&map));
    assert_eq!(clone, map);
}

#[rstest]
fn test_debug_format() {
    let map = PersistentHashMap::new().insert(1, "one");
    assert_eq!(format!("{map:?}"), r#"{1: "one"}"#);
    let empty: PersistentHashMap<i32, i32> = PersistentHashMap::new();
    assert_eq!(format!("{empty:?}"), "{}");
}
