//! Entries whose keys share one full 64-bit hash.

use std::borrow::Borrow;

use smallvec::{SmallVec, smallvec};

/// The entries of a collision node.
///
/// Invariant: holds at least two entries with pairwise distinct keys. Two
/// entries fit inline, which is the common case for a genuine collision.
#[derive(Clone, Debug)]
pub(crate) struct CollisionList<K, V> {
    entries: SmallVec<[(K, V); 2]>,
}

/// Result of removing a key from a [`CollisionList`].
pub(crate) enum CollisionRemoval<K, V> {
    /// Two or more entries remain.
    Shrunk(CollisionList<K, V>),
    /// Exactly one entry remains; the node degrades to a leaf.
    Single(K, V),
}

impl<K, V> CollisionList<K, V> {
    /// Creates a list from two entries with distinct keys.
    pub(crate) fn pair(first: (K, V), second: (K, V)) -> Self {
        Self {
            entries: smallvec![first, second],
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn as_slice(&self) -> &[(K, V)] {
        &self.entries
    }

    pub(crate) fn get_entry<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key.borrow() == key)
            .map(|(entry_key, value)| (entry_key, value))
    }

    fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .position(|(entry_key, _)| entry_key.borrow() == key)
    }
}

impl<K: Eq, V> CollisionList<K, V> {
    /// Inserts or replaces in place. A replaced entry takes the new key as
    /// well as the new value. Returns the replaced value.
    pub(crate) fn insert_in_place(&mut self, key: K, value: V) -> Option<V> {
        match self.index_of(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index], (key, value)).1),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Removes in place. The caller must degrade the node once one entry is
    /// left.
    pub(crate) fn remove_in_place<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.index_of(key)?;
        Some(self.entries.remove(index).1)
    }

    /// Removes and returns the only remaining entry.
    pub(crate) fn take_single(&mut self) -> Option<(K, V)> {
        if self.entries.len() == 1 {
            self.entries.pop()
        } else {
            None
        }
    }
}

impl<K: Clone + Eq, V: Clone> CollisionList<K, V> {
    /// Returns a copy with `key` inserted or replaced, and whether the key
    /// was new.
    pub(crate) fn inserted(&self, key: K, value: V) -> (Self, bool) {
        match self.index_of(&key) {
            Some(index) => {
                let mut entries = self.entries.clone();
                entries[index] = (key, value);
                (Self { entries }, false)
            }
            None => {
                let mut entries = SmallVec::with_capacity(self.entries.len() + 1);
                entries.extend(self.entries.iter().cloned());
                entries.push((key, value));
                (Self { entries }, true)
            }
        }
    }

    /// Returns the list without `key`, or `None` if `key` is absent.
    pub(crate) fn removed<Q>(&self, key: &Q) -> Option<CollisionRemoval<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.index_of(key)?;
        if self.entries.len() == 2 {
            let (key, value) = self.entries[1 - index].clone();
            return Some(CollisionRemoval::Single(key, value));
        }
        let entries = self
            .entries
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != index)
            .map(|(_, entry)| entry.clone())
            .collect();
        Some(CollisionRemoval::Shrunk(Self { entries }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn three() -> CollisionList<String, i32> {
        let pair = CollisionList::pair(("a".to_string(), 1), ("b".to_string(), 2));
        let (list, _) = pair.inserted("c".to_string(), 3);
        list
    }

    #[rstest]
    fn test_get_by_borrowed_key() {
        let list = three();
        assert_eq!(list.get_entry("a"), Some((&"a".to_string(), &1)));
        assert_eq!(list.get_entry("c"), Some((&"c".to_string(), &3)));
        assert_eq!(list.get_entry("z"), None);
        assert_eq!(list.len(), 3);
    }

    #[rstest]
    fn test_inserted_replaces_existing_key() {
        let list = three();
        let (replaced, added) = list.inserted("b".to_string(), 20);
        assert!(!added);
        assert_eq!(replaced.len(), 3);
        assert_eq!(replaced.get_entry("b").map(|(_, value)| *value), Some(20));
        assert_eq!(list.get_entry("b").map(|(_, value)| *value), Some(2));
    }

    #[rstest]
    fn test_removed_from_pair_degrades_to_single() {
        let pair = CollisionList::pair(("a".to_string(), 1), ("b".to_string(), 2));
        match pair.removed("a") {
            Some(CollisionRemoval::Single(key, value)) => {
                assert_eq!(key, "b");
                assert_eq!(value, 2);
            }
            _ => panic!("expected a single survivor"),
        }
        assert!(pair.removed("z").is_none());
    }

    #[rstest]
    fn test_removed_from_three_shrinks() {
        match three().removed("b") {
            Some(CollisionRemoval::Shrunk(list)) => {
                assert_eq!(list.len(), 2);
                assert!(list.get_entry("b").is_none());
                assert!(list.get_entry("a").is_some());
                assert!(list.get_entry("c").is_some());
            }
            _ => panic!("expected two survivors"),
        }
    }

    /// Equal when the ids match; `tag` tells equal keys apart.
    #[derive(Clone, Debug)]
    struct Tagged {
        id: u32,
        tag: &'static str,
    }

    impl PartialEq for Tagged {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for Tagged {}

    #[rstest]
    fn test_replacing_an_entry_stores_the_new_key() {
        let first = Tagged { id: 1, tag: "first" };
        let second = Tagged { id: 1, tag: "second" };
        let other = Tagged { id: 2, tag: "other" };

        let (copied, added) =
            CollisionList::pair((first.clone(), 1), (other.clone(), 2)).inserted(second.clone(), 10);
        assert!(!added);

        let mut in_place = CollisionList::pair((first, 1), (other, 2));
        assert_eq!(in_place.insert_in_place(second.clone(), 10), Some(1));

        for list in [&copied, &in_place] {
            let (key, value) = list.get_entry(&second).unwrap();
            assert_eq!(key.tag, "second");
            assert_eq!(*value, 10);
        }
    }

    #[rstest]
    fn test_in_place_insert_remove() {
        let mut list = CollisionList::pair(("a".to_string(), 1), ("b".to_string(), 2));
        assert_eq!(list.insert_in_place("a".to_string(), 10), Some(1));
        assert_eq!(list.insert_in_place("c".to_string(), 3), None);
        assert_eq!(list.remove_in_place("b"), Some(2));
        assert_eq!(list.remove_in_place("b"), None);
        assert!(list.take_single().is_none());
        assert_eq!(list.remove_in_place("c"), Some(3));
        assert_eq!(list.take_single(), Some(("a".to_string(), 10)));
    }
}
