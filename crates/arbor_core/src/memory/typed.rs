//! # Owned Stores
//!
//! Safe owners of a [`ContiguousStore`]. Each one remembers the layout the
//! store was created with and passes it on every call, so the size/alignment
//! contract is enforced once, here, instead of at every call site.

// SAFETY: every unsafe call below passes the layout the store was created with.
#![allow(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use bytemuck::Pod;

use super::store::{ContiguousStore, ElementLayout};

#[inline]
#[track_caller]
fn check_index(index: usize, len: usize) {
    assert!(index < len, "index {index} out of range ({len})");
}

/// A [`ContiguousStore`] of `T`.
///
/// Used for entity columns and hierarchy index lists.
pub struct TypedStore<T: Pod> {
    raw: ContiguousStore,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedStore<T> {
    const LAYOUT: ElementLayout = ElementLayout::of::<T>();

    /// Creates an empty store with room for `count_hint` elements.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn new(count_hint: usize) -> Self {
        assert!(Self::LAYOUT.size() > 0, "TypedStore does not hold zero-sized types");
        Self {
            raw: ContiguousStore::new(Self::LAYOUT, count_hint),
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.count()
    }

    /// True if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Allocated capacity in elements.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Appends a value and returns its index.
    pub fn push(&mut self, value: T) -> usize {
        let index = self.len();
        *self.add() = value;
        index
    }

    /// Appends a zeroed element and returns it.
    pub fn add(&mut self) -> &mut T {
        // SAFETY: the store was created with `Self::LAYOUT`.
        bytemuck::from_bytes_mut(unsafe { self.raw.add(Self::LAYOUT) })
    }

    /// Appends `n` zeroed elements and returns them.
    pub fn add_n(&mut self, n: usize) -> &mut [T] {
        // SAFETY: the store was created with `Self::LAYOUT`.
        bytemuck::cast_slice_mut(unsafe { self.raw.add_n(Self::LAYOUT, n) })
    }

    /// Element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> &T {
        check_index(index, self.len());
        // SAFETY: the store was created with `Self::LAYOUT`; `index` is in range.
        bytemuck::from_bytes(unsafe { self.raw.get(Self::LAYOUT, index) })
    }

    /// Mutable element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        check_index(index, self.len());
        // SAFETY: the store was created with `Self::LAYOUT`; `index` is in range.
        bytemuck::from_bytes_mut(unsafe { self.raw.get_mut(Self::LAYOUT, index) })
    }

    /// Last element, if any.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// All elements.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the store was created with `Self::LAYOUT`.
        bytemuck::cast_slice(unsafe { self.raw.as_bytes(Self::LAYOUT) })
    }

    /// All elements, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the store was created with `Self::LAYOUT`.
        bytemuck::cast_slice_mut(unsafe { self.raw.as_bytes_mut(Self::LAYOUT) })
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Swap-removes `index`. Returns the new length.
    pub fn remove_index_swap_last(&mut self, index: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.remove_index_swap_last(Self::LAYOUT, index) }
    }

    /// Drops the last element.
    pub fn remove_last(&mut self) {
        self.raw.remove_last();
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        let value = self.last().copied()?;
        self.raw.remove_last();
        Some(value)
    }

    /// Drops every element.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Zero-fills every element, keeping the length.
    pub fn zero(&mut self) {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.zero(Self::LAYOUT) }
    }

    /// Grows capacity to at least `size`.
    pub fn set_min_size(&mut self, size: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.set_min_size(Self::LAYOUT, size) }
    }

    /// Sets capacity to exactly `size`, truncating if needed.
    pub fn set_size(&mut self, size: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.set_size(Self::LAYOUT, size) }
    }

    /// Raises the length to at least `count` with zeroed elements.
    pub fn set_min_count(&mut self, count: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.set_min_count(Self::LAYOUT, count) }
    }

    /// Sets the length, zero-filling new elements.
    pub fn set_count(&mut self, count: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.set_count(Self::LAYOUT, count) }
    }

    /// Adds `additional` to the capacity.
    pub fn grow(&mut self, additional: usize) -> usize {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.grow(Self::LAYOUT, additional) }
    }

    /// Shrinks the allocation to the length.
    pub fn reclaim(&mut self) {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.reclaim(Self::LAYOUT) }
    }

    /// Sorts in place with a comparator.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.as_mut_slice().sort_unstable_by(compare);
    }

    /// Moves `src[index]` to the end of `self`. Returns its new index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range for `src`.
    pub fn move_index(&mut self, src: &mut Self, index: usize) -> usize {
        check_index(index, src.len());
        // SAFETY: both stores were created with `Self::LAYOUT`; `index` is in range.
        unsafe { ContiguousStore::move_index(&mut self.raw, &mut src.raw, Self::LAYOUT, index) }
    }

    /// `(allocated, used)` bytes.
    #[must_use]
    pub fn memory(&self) -> (usize, usize) {
        // SAFETY: the store was created with `Self::LAYOUT`.
        unsafe { self.raw.memory(Self::LAYOUT) }
    }
}

impl<T: Pod> TypedStore<T> {
    /// Creates a store holding a copy of `values`, with no spare capacity.
    #[must_use]
    pub fn from_slice(values: &[T]) -> Self {
        let mut store = Self::new(values.len());
        store.add_n(values.len()).copy_from_slice(values);
        store
    }
}

impl<T: Pod> FromIterator<T> for TypedStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut store = Self::new(iter.size_hint().0);
        for value in iter {
            store.push(value);
        }
        store
    }
}

impl<T: Pod> Default for TypedStore<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Pod> Clone for TypedStore<T> {
    fn clone(&self) -> Self {
        Self {
            // SAFETY: the store was created with `Self::LAYOUT`.
            raw: unsafe { self.raw.copy(Self::LAYOUT) },
            _marker: PhantomData,
        }
    }
}

impl<T: Pod> Drop for TypedStore<T> {
    fn drop(&mut self) {
        // SAFETY: `self.raw` is never touched again, and the store was created
        // with `Self::LAYOUT`.
        unsafe { ptr::read(&self.raw).free(Self::LAYOUT) };
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for TypedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T: Pod> IntoIterator for &'a TypedStore<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A type-erased [`ContiguousStore`] that carries its element layout.
///
/// Table component columns are columns of this kind: the element type is only
/// known at runtime, through the component registry.
pub struct Column {
    layout: ElementLayout,
    raw: ContiguousStore,
}

impl Column {
    /// Creates an empty column.
    ///
    /// # Panics
    ///
    /// Panics if `layout` is zero-sized.
    #[must_use]
    pub fn new(layout: ElementLayout, count_hint: usize) -> Self {
        assert!(!layout.is_zero_sized(), "zero-sized components have no column");
        Self {
            layout,
            raw: ContiguousStore::new(layout, count_hint),
        }
    }

    /// Element layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> ElementLayout {
        self.layout
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.count()
    }

    /// True if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Allocated capacity in elements.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Appends a zeroed element and returns its bytes.
    pub fn add(&mut self) -> &mut [u8] {
        // SAFETY: the store was created with `self.layout`.
        unsafe { self.raw.add(self.layout) }
    }

    /// Bytes of element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> &[u8] {
        check_index(index, self.len());
        // SAFETY: the store was created with `self.layout`; `index` is in range.
        unsafe { self.raw.get(self.layout, index) }
    }

    /// Mutable bytes of element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn get_mut(&mut self, index: usize) -> &mut [u8] {
        check_index(index, self.len());
        // SAFETY: the store was created with `self.layout`; `index` is in range.
        unsafe { self.raw.get_mut(self.layout, index) }
    }

    /// Typed view of the column, if `T` has the column's layout.
    #[must_use]
    pub fn as_slice<T: Pod>(&self) -> Option<&[T]> {
        if ElementLayout::of::<T>() != self.layout {
            return None;
        }
        // SAFETY: the store was created with `self.layout`.
        Some(bytemuck::cast_slice(unsafe { self.raw.as_bytes(self.layout) }))
    }

    /// Mutable typed view of the column, if `T` has the column's layout.
    pub fn as_mut_slice<T: Pod>(&mut self) -> Option<&mut [T]> {
        if ElementLayout::of::<T>() != self.layout {
            return None;
        }
        // SAFETY: the store was created with `self.layout`.
        Some(bytemuck::cast_slice_mut(unsafe { self.raw.as_bytes_mut(self.layout) }))
    }

    /// Swap-removes `index`. Returns the new length.
    pub fn remove_index_swap_last(&mut self, index: usize) -> usize {
        // SAFETY: the store was created with `self.layout`.
        unsafe { self.raw.remove_index_swap_last(self.layout, index) }
    }

    /// Shrinks the allocation to the length.
    pub fn reclaim(&mut self) {
        // SAFETY: the store was created with `self.layout`.
        unsafe { self.raw.reclaim(self.layout) }
    }

    /// `(allocated, used)` bytes.
    #[must_use]
    pub fn memory(&self) -> (usize, usize) {
        // SAFETY: the store was created with `self.layout`.
        unsafe { self.raw.memory(self.layout) }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        // SAFETY: `self.raw` is never touched again, and the store was created
        // with `self.layout`.
        unsafe { ptr::read(&self.raw).free(self.layout) };
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("layout", &self.layout)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic xorshift sequence.
    fn xorshift(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    #[test]
    fn test_count_tracks_adds_minus_removes() {
        let mut store: TypedStore<u64> = TypedStore::new(0);
        let mut live: Vec<u64> = Vec::new();
        let mut state = 0xDEAD_BEEF;

        for step in 0..2_000u64 {
            let roll = xorshift(&mut state);
            if live.is_empty() || roll % 3 != 0 {
                store.push(step);
                live.push(step);
            } else {
                let index = (roll as usize / 3) % live.len();
                store.remove_index_swap_last(index);
                live.swap_remove(index);
            }
            assert_eq!(store.len(), live.len());
        }

        let mut stored = store.as_slice().to_vec();
        stored.sort_unstable();
        live.sort_unstable();
        assert_eq!(stored, live);
    }

    #[test]
    fn test_reallocations_are_logarithmic() {
        let mut store: TypedStore<u32> = TypedStore::new(0);
        let mut reallocations = 0;
        let mut capacity = store.capacity();

        for i in 0..100_000u32 {
            store.push(i);
            if store.capacity() != capacity {
                reallocations += 1;
                capacity = store.capacity();
            }
        }

        // 0 -> 1 -> 2 -> ... -> 131072
        assert_eq!(reallocations, 18);
        assert_eq!(*store.get(99_999), 99_999);
    }

    #[test]
    fn test_slot_stable_until_growth() {
        let mut store: TypedStore<u64> = TypedStore::new(8);
        store.push(7);
        let before = store.get(0) as *const u64;
        store.push(8);
        let after = store.get(0) as *const u64;
        assert_eq!(before, after);
        assert_eq!(*store.get(0), 7);
    }

    #[test]
    fn test_pop_sort_and_clone() {
        let mut store: TypedStore<i32> = TypedStore::new(0);
        for v in [5, -1, 3, 9] {
            store.push(v);
        }
        store.sort_by(|a, b| a.cmp(b));
        assert_eq!(store.as_slice(), &[-1, 3, 5, 9]);

        let copy = store.clone();
        assert_eq!(store.pop(), Some(9));
        assert_eq!(copy.len(), 4);
        assert_eq!(store.len(), 3);

        store.clear();
        assert_eq!(store.pop(), None);
    }

    #[test]
    fn test_add_n_and_move_index() {
        let mut a: TypedStore<u16> = TypedStore::default();
        a.add_n(3).copy_from_slice(&[1, 2, 3]);
        let mut b: TypedStore<u16> = TypedStore::default();

        let at = b.move_index(&mut a, 0);
        assert_eq!(at, 0);
        assert_eq!(b.as_slice(), &[1]);
        assert_eq!(a.as_slice(), &[3, 2]);
    }

    #[test]
    fn test_from_slice_collect_and_zero() {
        let mut store = TypedStore::from_slice(&[4u32, 5, 6]);
        assert_eq!(store.as_slice(), &[4, 5, 6]);
        assert_eq!(store.capacity(), 3);

        let collected: TypedStore<u32> = (1..=5).collect();
        assert_eq!(collected.as_slice(), &[1, 2, 3, 4, 5]);

        store.zero();
        assert_eq!(store.as_slice(), &[0, 0, 0]);
        assert!(TypedStore::<u64>::from_slice(&[]).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_typed_get_checks_bounds() {
        let store = TypedStore::from_slice(&[1u8, 2]);
        let _ = store.get(2);
    }

    #[test]
    fn test_column_reclaim_and_memory() {
        let mut column = Column::new(ElementLayout::of::<u64>(), 8);
        column.add();
        column.add();
        assert_eq!(column.capacity(), 8);
        let (allocated, used) = column.memory();
        assert_eq!(allocated - used, 6 * 8);

        column.reclaim();
        assert_eq!(column.capacity(), 2);
        let (allocated, used) = column.memory();
        assert_eq!(allocated, used);
        assert_eq!(column.len(), 2);
    }

    #[test]
    fn test_column_typed_views() {
        let mut column = Column::new(ElementLayout::of::<f32>(), 2);
        column.add().copy_from_slice(&1.5f32.to_ne_bytes());
        column.add();

        assert!(column.as_slice::<u64>().is_none());
        assert!(column.as_mut_slice::<u16>().is_none());
        let values = column.as_slice::<f32>().unwrap();
        assert_eq!(values, &[1.5, 0.0]);

        column.as_mut_slice::<f32>().unwrap()[1] = 2.5;
        column.remove_index_swap_last(0);
        assert_eq!(column.as_slice::<f32>().unwrap(), &[2.5]);
    }
}
