//! Bitmap-indexed dense arrays.
//!
//! An interior node records which of its `BRANCHING_FACTOR` slots are
//! populated in a bitmap and keeps only the populated children, in slot
//! order, in a [`SparseArray`]. Slot `i` lives at position
//! `popcount(bitmap & ((1 << i) - 1))`.
//!
//! The persistent splices (`inserted`, `replaced`, `removed`) allocate a
//! fresh array of the exact target length and copy each contiguous run with
//! one `extend_from_slice`, never aliasing the input. The in-place variants
//! exist for [`TransientHashMap`](super::TransientHashMap) only.

use std::ops::Index;

use crate::config::{BITS_PER_LEVEL, MASK};
use crate::popcount::{ActivePopCount, PopCount};

/// Extracts the slot of `hash` at the level starting at bit `shift`.
#[inline]
pub(crate) const fn slot_of(hash: u64, shift: u32) -> u32 {
    ((hash >> shift) & MASK) as u32
}

/// Returns the bitmap bit of `slot`.
#[inline]
pub(crate) const fn slot_bit(slot: u32) -> u32 {
    1 << slot
}

/// Returns the dense position of `slot` within a node whose bitmap is
/// `bitmap`.
#[inline]
pub(crate) fn position(bitmap: u32, slot: u32) -> usize {
    ActivePopCount::count(bitmap & (slot_bit(slot) - 1)) as usize
}

/// Returns the shift of the level below the one at `shift`.
#[inline]
pub(crate) const fn next_shift(shift: u32) -> u32 {
    shift + BITS_PER_LEVEL
}

/// Dense storage of the populated slots of an interior node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SparseArray<T> {
    items: Vec<T>,
}

impl<T> SparseArray<T> {
    /// Builds an array from items already in slot order.
    pub(crate) const fn from_vec(items: Vec<T>) -> Self {
        Self { items }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the item stored for `slot`, or `None` if `bitmap` marks it
    /// empty.
    #[inline]
    pub(crate) fn get(&self, bitmap: u32, slot: u32) -> Option<&T> {
        if bitmap & slot_bit(slot) == 0 {
            None
        } else {
            Some(&self.items[position(bitmap, slot)])
        }
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> &mut T {
        &mut self.items[position]
    }

    pub(crate) fn insert_at(&mut self, position: usize, item: T) {
        self.items.insert(position, item);
    }

    pub(crate) fn remove_at(&mut self, position: usize) -> T {
        self.items.remove(position)
    }
}

impl<T: Clone> SparseArray<T> {
    /// Returns a copy with `item` inserted at `position`.
    pub(crate) fn inserted(&self, position: usize, item: T) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend_from_slice(&self.items[..position]);
        items.push(item);
        items.extend_from_slice(&self.items[position..]);
        Self { items }
    }

    /// Returns a copy with the item at `position` replaced by `item`.
    pub(crate) fn replaced(&self, position: usize, item: T) -> Self {
        let mut items = Vec::with_capacity(self.items.len());
        items.extend_from_slice(&self.items[..position]);
        items.push(item);
        items.extend_from_slice(&self.items[position + 1..]);
        Self { items }
    }

    /// Returns a copy without the item at `position`.
    pub(crate) fn removed(&self, position: usize) -> Self {
        let mut items = Vec::with_capacity(self.items.len() - 1);
        items.extend_from_slice(&self.items[..position]);
        items.extend_from_slice(&self.items[position + 1..]);
        Self { items }
    }
}

impl<T> Index<usize> for SparseArray<T> {
    type Output = T;

    fn index(&self, position: usize) -> &T {
        &self.items[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> (u32, SparseArray<char>) {
        // slots 1, 4 and 9 populated
        let bitmap = slot_bit(1) | slot_bit(4) | slot_bit(9);
        (bitmap, SparseArray::from_vec(vec!['a', 'b', 'c']))
    }

    #[cfg(not(feature = "branch-32"))]
    #[rstest]
    #[case(0, 0x0, 0)]
    #[case(0x1234, 0, 0x4)]
    #[case(0x1234, 4, 0x3)]
    #[case(u64::MAX, 60, 0xF)]
    fn test_slot_of_low_chunk_first(#[case] hash: u64, #[case] shift: u32, #[case] expected: u32) {
        assert_eq!(slot_of(hash, shift), expected);
    }

    #[rstest]
    fn test_position_counts_lower_bits() {
        let (bitmap, _) = sample();
        assert_eq!(position(bitmap, 1), 0);
        assert_eq!(position(bitmap, 4), 1);
        assert_eq!(position(bitmap, 9), 2);
        assert_eq!(position(bitmap, 12), 3);
    }

    #[rstest]
    fn test_get_present_and_absent() {
        let (bitmap, array) = sample();
        assert_eq!(array.get(bitmap, 4), Some(&'b'));
        assert_eq!(array.get(bitmap, 9), Some(&'c'));
        assert_eq!(array.get(bitmap, 0), None);
        assert_eq!(array.get(bitmap, 5), None);
    }

    #[rstest]
    #[case(0, vec!['x', 'a', 'b', 'c'])]
    #[case(2, vec!['a', 'b', 'x', 'c'])]
    #[case(3, vec!['a', 'b', 'c', 'x'])]
    fn test_inserted_leaves_source_untouched(#[case] at: usize, #[case] expected: Vec<char>) {
        let (_, array) = sample();
        let grown = array.inserted(at, 'x');
        assert_eq!(grown.as_slice(), expected.as_slice());
        assert_eq!(array.as_slice(), &['a', 'b', 'c']);
    }

    #[rstest]
    fn test_replaced_and_removed() {
        let (_, array) = sample();
        assert_eq!(array.replaced(1, 'x').as_slice(), &['a', 'x', 'c']);
        assert_eq!(array.removed(0).as_slice(), &['b', 'c']);
        assert_eq!(array.removed(2).as_slice(), &['a', 'b']);
        assert_eq!(array.len(), 3);
    }

    #[rstest]
    fn test_splices_allocate_exact_length() {
        let (_, array) = sample();
        assert_eq!(array.inserted(1, 'x').items.capacity(), 4);
        assert_eq!(array.removed(1).items.capacity(), 2);
    }

    #[rstest]
    fn test_in_place_operations() {
        let (_, mut array) = sample();
        array.insert_at(1, 'x');
        assert_eq!(array.remove_at(3), 'c');
        *array.get_mut(2) = 'z';
        assert_eq!(array.as_slice(), &['a', 'x', 'z']);
    }
}
