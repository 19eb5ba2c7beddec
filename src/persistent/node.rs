//! Trie nodes and the operations on them.
//!
//! A map is a tree of [`Node`]s joined by reference-counted [`Child`]
//! pointers. Level `n` of the tree consumes bits `n * BITS_PER_LEVEL ..`
//! of the key hash, least significant chunk first.
//!
//! The persistent operations ([`Node::insert`], [`Node::remove`]) take a
//! shared child and return a new one; everything off the updated path is
//! shared with the input by pointer. The `_mut` variants are used by the
//! transient builder and update nodes in place through
//! `ReferenceCounter::make_mut`, which copies a node only while it is still
//! shared with some persistent map.
//!
//! Both families keep the same canonical shape:
//!
//! - no interior node has an `Empty` child
//! - a `BitmapIndexed` node never holds all `BRANCHING_FACTOR` slots (that is
//!   a `Full` node) and never holds a single leaf or collision child (that
//!   child is pulled up in its place)
//! - a `Collision` node holds at least two entries

use std::borrow::Borrow;

use super::ReferenceCounter;
use super::collision::{CollisionList, CollisionRemoval};
use super::sparse_array::{SparseArray, next_shift, position, slot_bit, slot_of};
use crate::config::FULL_BITMAP;

/// A shared pointer to a subtree.
pub(crate) type Child<K, V> = ReferenceCounter<Node<K, V>>;

/// A trie node.
#[derive(Clone, Debug)]
pub(crate) enum Node<K, V> {
    /// The root of an empty transient builder. Never appears below the root,
    /// and a persistent map stores no root instead.
    Empty,
    /// A single entry.
    Leaf { hash: u64, key: K, value: V },
    /// Two or more entries whose keys share the full hash.
    Collision {
        hash: u64,
        entries: CollisionList<K, V>,
    },
    /// An interior node with some of its slots populated.
    BitmapIndexed {
        bitmap: u32,
        children: SparseArray<Child<K, V>>,
    },
    /// An interior node with every slot populated. Indexed directly by slot.
    Full { children: SparseArray<Child<K, V>> },
}

/// Outcome of a persistent removal on one subtree.
pub(crate) enum Removal<K, V> {
    /// The key is not in the subtree; the caller keeps the original.
    Absent,
    /// The subtree held only the removed entry.
    Emptied,
    /// The subtree to put in place of the original.
    Replaced(Child<K, V>),
}

// =============================================================================
// Lookup
// =============================================================================

impl<K, V> Node<K, V> {
    pub(crate) fn empty() -> Child<K, V> {
        ReferenceCounter::new(Self::Empty)
    }

    pub(crate) fn leaf(hash: u64, key: K, value: V) -> Child<K, V> {
        ReferenceCounter::new(Self::Leaf { hash, key, value })
    }

    /// Returns `true` for nodes that hold entries directly.
    pub(crate) const fn is_terminal(&self) -> bool {
        matches!(self, Self::Leaf { .. } | Self::Collision { .. })
    }

    /// Finds the stored key and value for `key`, whose hash is `hash`.
    pub(crate) fn get_entry<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = 0;
        loop {
            match node {
                Self::Empty => return None,
                Self::Leaf {
                    hash: leaf_hash,
                    key: leaf_key,
                    value,
                } => {
                    return (*leaf_hash == hash && leaf_key.borrow() == key)
                        .then_some((leaf_key, value));
                }
                Self::Collision {
                    hash: collision_hash,
                    entries,
                } => {
                    return if *collision_hash == hash {
                        entries.get_entry(key)
                    } else {
                        None
                    };
                }
                Self::BitmapIndexed { bitmap, children } => {
                    let child = children.get(*bitmap, slot_of(hash, shift))?;
                    node = &**child;
                }
                Self::Full { children } => {
                    node = &*children[slot_of(hash, shift) as usize];
                }
            }
            shift = next_shift(shift);
        }
    }

    /// Builds the smallest subtree at level `shift` that separates two
    /// terminal nodes with different hashes.
    fn branch_two(
        shift: u32,
        first: Child<K, V>,
        first_hash: u64,
        second: Child<K, V>,
        second_hash: u64,
    ) -> Self {
        debug_assert_ne!(first_hash, second_hash);
        let first_slot = slot_of(first_hash, shift);
        let second_slot = slot_of(second_hash, shift);
        if first_slot == second_slot {
            let child = Self::branch_two(next_shift(shift), first, first_hash, second, second_hash);
            return Self::BitmapIndexed {
                bitmap: slot_bit(first_slot),
                children: SparseArray::from_vec(vec![ReferenceCounter::new(child)]),
            };
        }
        let children = if first_slot < second_slot {
            vec![first, second]
        } else {
            vec![second, first]
        };
        Self::BitmapIndexed {
            bitmap: slot_bit(first_slot) | slot_bit(second_slot),
            children: SparseArray::from_vec(children),
        }
    }

    fn interior(bitmap: u32, children: SparseArray<Child<K, V>>) -> Self {
        if bitmap == FULL_BITMAP {
            Self::Full { children }
        } else {
            Self::BitmapIndexed { bitmap, children }
        }
    }

    /// Rebuilds an interior node after one of its children changed,
    /// collapsing it when it is empty or holds a single terminal child.
    fn compact(bitmap: u32, children: SparseArray<Child<K, V>>) -> Removal<K, V> {
        if bitmap == 0 {
            return Removal::Emptied;
        }
        if children.len() == 1 && children[0].is_terminal() {
            return Removal::Replaced(children[0].clone());
        }
        Removal::Replaced(ReferenceCounter::new(Self::interior(bitmap, children)))
    }
}

// =============================================================================
// Persistent Updates
// =============================================================================

impl<K: Clone + Eq, V: Clone> Node<K, V> {
    /// Returns the subtree with `key` bound to `value`, and whether the key
    /// was new.
    pub(crate) fn insert(
        this: &Child<K, V>,
        hash: u64,
        key: K,
        value: V,
        shift: u32,
    ) -> (Child<K, V>, bool) {
        match &**this {
            Self::Empty => (Self::leaf(hash, key, value), true),
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value: leaf_value,
            } => {
                if *leaf_hash != hash {
                    let branch = Self::branch_two(
                        shift,
                        this.clone(),
                        *leaf_hash,
                        Self::leaf(hash, key, value),
                        hash,
                    );
                    (ReferenceCounter::new(branch), true)
                } else if *leaf_key == key {
                    (Self::leaf(hash, key, value), false)
                } else {
                    tracing::trace!(hash, "hash collision, creating collision node");
                    let entries =
                        CollisionList::pair((leaf_key.clone(), leaf_value.clone()), (key, value));
                    (ReferenceCounter::new(Self::Collision { hash, entries }), true)
                }
            }
            Self::Collision {
                hash: collision_hash,
                entries,
            } => {
                if *collision_hash == hash {
                    let (entries, added) = entries.inserted(key, value);
                    (ReferenceCounter::new(Self::Collision { hash, entries }), added)
                } else {
                    let branch = Self::branch_two(
                        shift,
                        this.clone(),
                        *collision_hash,
                        Self::leaf(hash, key, value),
                        hash,
                    );
                    (ReferenceCounter::new(branch), true)
                }
            }
            Self::BitmapIndexed { bitmap, children } => {
                let slot = slot_of(hash, shift);
                let bit = slot_bit(slot);
                let position = position(*bitmap, slot);
                if bitmap & bit == 0 {
                    let children = children.inserted(position, Self::leaf(hash, key, value));
                    (ReferenceCounter::new(Self::interior(bitmap | bit, children)), true)
                } else {
                    let (child, added) =
                        Self::insert(&children[position], hash, key, value, next_shift(shift));
                    let node = Self::BitmapIndexed {
                        bitmap: *bitmap,
                        children: children.replaced(position, child),
                    };
                    (ReferenceCounter::new(node), added)
                }
            }
            Self::Full { children } => {
                let position = slot_of(hash, shift) as usize;
                let (child, added) =
                    Self::insert(&children[position], hash, key, value, next_shift(shift));
                let node = Self::Full {
                    children: children.replaced(position, child),
                };
                (ReferenceCounter::new(node), added)
            }
        }
    }

    /// Removes `key` from the subtree.
    pub(crate) fn remove<Q>(this: &Child<K, V>, hash: u64, key: &Q, shift: u32) -> Removal<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match &**this {
            Self::Empty => Removal::Absent,
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                ..
            } => {
                if *leaf_hash == hash && leaf_key.borrow() == key {
                    Removal::Emptied
                } else {
                    Removal::Absent
                }
            }
            Self::Collision {
                hash: collision_hash,
                entries,
            } => {
                if *collision_hash != hash {
                    return Removal::Absent;
                }
                match entries.removed(key) {
                    None => Removal::Absent,
                    Some(CollisionRemoval::Single(key, value)) => {
                        Removal::Replaced(Self::leaf(hash, key, value))
                    }
                    Some(CollisionRemoval::Shrunk(entries)) => {
                        Removal::Replaced(ReferenceCounter::new(Self::Collision { hash, entries }))
                    }
                }
            }
            Self::BitmapIndexed { bitmap, children } => {
                let slot = slot_of(hash, shift);
                let bit = slot_bit(slot);
                if bitmap & bit == 0 {
                    return Removal::Absent;
                }
                let position = position(*bitmap, slot);
                match Self::remove(&children[position], hash, key, next_shift(shift)) {
                    Removal::Absent => Removal::Absent,
                    Removal::Emptied => Self::compact(bitmap & !bit, children.removed(position)),
                    Removal::Replaced(child) => {
                        Self::compact(*bitmap, children.replaced(position, child))
                    }
                }
            }
            Self::Full { children } => {
                let slot = slot_of(hash, shift);
                let position = slot as usize;
                match Self::remove(&children[position], hash, key, next_shift(shift)) {
                    Removal::Absent => Removal::Absent,
                    Removal::Emptied => {
                        Self::compact(FULL_BITMAP & !slot_bit(slot), children.removed(position))
                    }
                    Removal::Replaced(child) => Removal::Replaced(ReferenceCounter::new(
                        Self::Full {
                            children: children.replaced(position, child),
                        },
                    )),
                }
            }
        }
    }

    // =========================================================================
    // In-place Updates
    // =========================================================================

    /// Binds `key` to `value` in place. Returns the previous value.
    pub(crate) fn insert_mut(
        this: &mut Child<K, V>,
        hash: u64,
        key: K,
        value: V,
        shift: u32,
    ) -> Option<V> {
        let node = ReferenceCounter::make_mut(this);
        match node {
            Self::Empty => {
                *node = Self::Leaf { hash, key, value };
                None
            }
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value: leaf_value,
            } => {
                if *leaf_hash == hash && *leaf_key == key {
                    *leaf_key = key;
                    return Some(std::mem::replace(leaf_value, value));
                }
                let existing_hash = *leaf_hash;
                if existing_hash == hash {
                    tracing::trace!(hash, "hash collision, creating collision node");
                    let entries =
                        CollisionList::pair((leaf_key.clone(), leaf_value.clone()), (key, value));
                    *node = Self::Collision { hash, entries };
                } else {
                    let existing = ReferenceCounter::new(std::mem::replace(node, Self::Empty));
                    *node = Self::branch_two(
                        shift,
                        existing,
                        existing_hash,
                        Self::leaf(hash, key, value),
                        hash,
                    );
                }
                None
            }
            Self::Collision {
                hash: collision_hash,
                entries,
            } => {
                if *collision_hash == hash {
                    return entries.insert_in_place(key, value);
                }
                let existing_hash = *collision_hash;
                let existing = ReferenceCounter::new(std::mem::replace(node, Self::Empty));
                *node = Self::branch_two(
                    shift,
                    existing,
                    existing_hash,
                    Self::leaf(hash, key, value),
                    hash,
                );
                None
            }
            Self::BitmapIndexed { bitmap, children } => {
                let slot = slot_of(hash, shift);
                let bit = slot_bit(slot);
                let position = position(*bitmap, slot);
                if *bitmap & bit != 0 {
                    return Self::insert_mut(
                        children.get_mut(position),
                        hash,
                        key,
                        value,
                        next_shift(shift),
                    );
                }
                children.insert_at(position, Self::leaf(hash, key, value));
                *bitmap |= bit;
                if *bitmap == FULL_BITMAP {
                    let children = std::mem::replace(children, SparseArray::from_vec(Vec::new()));
                    *node = Self::Full { children };
                }
                None
            }
            Self::Full { children } => {
                let position = slot_of(hash, shift) as usize;
                Self::insert_mut(
                    children.get_mut(position),
                    hash,
                    key,
                    value,
                    next_shift(shift),
                )
            }
        }
    }

    /// Removes `key` in place. Returns the removed value.
    ///
    /// Nodes on the path are unshared even when the key turns out to be
    /// absent, so callers check membership first.
    pub(crate) fn remove_mut<Q>(this: &mut Child<K, V>, hash: u64, key: &Q, shift: u32) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let node = ReferenceCounter::make_mut(this);
        let removed = match node {
            Self::Empty => return None,
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                ..
            } => {
                if *leaf_hash != hash || (*leaf_key).borrow() != key {
                    return None;
                }
                let Self::Leaf { value, .. } = std::mem::replace(node, Self::Empty) else {
                    return None;
                };
                return Some(value);
            }
            Self::Collision {
                hash: collision_hash,
                entries,
            } => {
                if *collision_hash != hash {
                    return None;
                }
                let removed = entries.remove_in_place(key)?;
                if let Some((key, value)) = entries.take_single() {
                    *node = Self::Leaf { hash, key, value };
                }
                return Some(removed);
            }
            Self::BitmapIndexed { bitmap, children } => {
                let slot = slot_of(hash, shift);
                let bit = slot_bit(slot);
                if *bitmap & bit == 0 {
                    return None;
                }
                let position = position(*bitmap, slot);
                let child = children.get_mut(position);
                let removed = Self::remove_mut(child, hash, key, next_shift(shift))?;
                if matches!(**child, Self::Empty) {
                    children.remove_at(position);
                    *bitmap &= !bit;
                    if *bitmap == 0 {
                        *node = Self::Empty;
                    }
                }
                removed
            }
            Self::Full { children } => {
                let slot = slot_of(hash, shift);
                let position = slot as usize;
                let child = children.get_mut(position);
                let removed = Self::remove_mut(child, hash, key, next_shift(shift))?;
                if matches!(**child, Self::Empty) {
                    children.remove_at(position);
                    let children = std::mem::replace(children, SparseArray::from_vec(Vec::new()));
                    *node = Self::BitmapIndexed {
                        bitmap: FULL_BITMAP & !slot_bit(slot),
                        children,
                    };
                }
                removed
            }
        };

        if let Self::BitmapIndexed { children, .. } = &**this
            && children.len() == 1
            && children[0].is_terminal()
        {
            let survivor = children[0].clone();
            *this = survivor;
        }
        Some(removed)
    }
}

// =============================================================================
// Invariant Checks
// =============================================================================

#[cfg(test)]
impl<K, V> Node<K, V> {
    /// Checks the canonical shape of the subtree at level `shift`, whose
    /// hashes all agree with `prefix` on their low `shift` bits. Returns the
    /// number of entries.
    pub(crate) fn validate(&self, shift: u32, prefix: u64) -> Result<usize, String> {
        use crate::config::{BITS_PER_LEVEL, BRANCHING_FACTOR, HASH_BITS};

        let prefix_mask = if shift >= HASH_BITS {
            u64::MAX
        } else {
            (1_u64 << shift) - 1
        };
        let check_prefix = |hash: u64| {
            if hash & prefix_mask == prefix {
                Ok(())
            } else {
                Err(format!("hash {hash:#x} misplaced below prefix {prefix:#x}"))
            }
        };
        let check_children = |children: &SparseArray<Child<K, V>>, slots: Vec<u32>| {
            let mut total = 0;
            for (child, slot) in children.iter().zip(slots) {
                if matches!(**child, Self::Empty) {
                    return Err(format!("empty child at slot {slot}"));
                }
                let child_prefix = prefix | (u64::from(slot) << shift);
                total += child.validate(shift + BITS_PER_LEVEL, child_prefix)?;
            }
            Ok(total)
        };

        match self {
            Self::Empty => Ok(0),
            Self::Leaf { hash, .. } => check_prefix(*hash).map(|()| 1),
            Self::Collision { hash, entries } => {
                check_prefix(*hash)?;
                if entries.len() < 2 {
                    return Err("collision node with fewer than two entries".to_string());
                }
                Ok(entries.len())
            }
            Self::BitmapIndexed { bitmap, children } => {
                if *bitmap == 0 || *bitmap == FULL_BITMAP || bitmap & !FULL_BITMAP != 0 {
                    return Err(format!("bad bitmap {bitmap:#b}"));
                }
                if bitmap.count_ones() as usize != children.len() {
                    return Err(format!(
                        "bitmap {bitmap:#b} disagrees with {} children",
                        children.len()
                    ));
                }
                if children.len() == 1 && children[0].is_terminal() {
                    return Err("uncollapsed single terminal child".to_string());
                }
                let slots = (0..BRANCHING_FACTOR as u32)
                    .filter(|slot| bitmap & slot_bit(*slot) != 0)
                    .collect();
                check_children(children, slots)
            }
            Self::Full { children } => {
                if children.len() != BRANCHING_FACTOR {
                    return Err(format!("full node with {} children", children.len()));
                }
                check_children(children, (0..BRANCHING_FACTOR as u32).collect())
            }
        }
    }
}
