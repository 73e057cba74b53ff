//! # Contiguous Store
//!
//! One heap block per store: a small header followed by the elements.
//!
//! ```text
//! | count: i32 | capacity: i32 | [debug] elem_size: i64 | [debug] elem_align: i64 | pad | E0 | ... |
//! ^ block start (aligned to max(header align, element align))
//! ```
//!
//! The store itself is untyped. Every operation that touches element memory
//! takes the [`ElementLayout`] the store was created with; debug builds check
//! both halves of it against the header. Release builds check nothing, so raw
//! indexing is unchecked there and the owners below do the bounds checks.
//! [`TypedStore`](super::TypedStore) and [`Column`](super::Column) own a store
//! together with its layout and are the safe way in.

// SAFETY: This module owns raw allocations. Every unsafe block states the
// invariant it relies on.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error, realloc, Layout};
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

/// Size and alignment of one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementLayout {
    size: usize,
    align: usize,
}

impl ElementLayout {
    /// Creates an element layout.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or `size` is not a multiple of it.
    #[must_use]
    pub const fn new(size: usize, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        assert!(size % align == 0, "size must be a multiple of alignment");
        Self { size, align }
    }

    /// Layout of a statically known type.
    #[inline]
    #[must_use]
    pub const fn of<T>() -> Self {
        Self {
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Element size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// Element alignment in bytes.
    #[inline]
    #[must_use]
    pub const fn align(self) -> usize {
        self.align
    }

    /// True for tag-like elements that occupy no storage.
    #[inline]
    #[must_use]
    pub const fn is_zero_sized(self) -> bool {
        self.size == 0
    }
}

#[repr(C)]
struct StoreHeader {
    count: i32,
    capacity: i32,
    #[cfg(debug_assertions)]
    elem_size: i64,
    #[cfg(debug_assertions)]
    elem_align: i64,
}

#[cold]
fn capacity_overflow() -> ! {
    panic!("ContiguousStore capacity overflow");
}

#[inline]
fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or_else(|_| capacity_overflow())
}

/// Offset of element 0 from the block start.
#[inline]
const fn data_offset(align: usize) -> usize {
    let header = size_of::<StoreHeader>();
    (header + align - 1) & !(align - 1)
}

/// Allocation layout of a block holding `capacity` elements.
fn block_layout(layout: ElementLayout, capacity: usize) -> Layout {
    let bytes = layout
        .size
        .checked_mul(capacity)
        .and_then(|b| b.checked_add(data_offset(layout.align)))
        .unwrap_or_else(|| capacity_overflow());
    let align = align_of::<StoreHeader>().max(layout.align);
    Layout::from_size_align(bytes, align).unwrap_or_else(|_| capacity_overflow())
}

/// Untyped growable array in a single allocation.
///
/// Growth doubles to the next power of two above the current capacity with one
/// `realloc`, so `N` appends cost `O(log N)` reallocations. A growing call moves
/// the block: slots handed out earlier are borrows of the store and cannot
/// outlive it.
///
/// The store does not free itself. Its owner calls [`ContiguousStore::free`]
/// with the creation layout, which is what [`TypedStore`](super::TypedStore) and
/// [`Column`](super::Column) do on drop.
pub struct ContiguousStore {
    header: NonNull<StoreHeader>,
}

impl ContiguousStore {
    /// Creates an empty store with capacity for at least `count_hint` elements.
    ///
    /// # Panics
    ///
    /// Panics if the requested capacity overflows `i32` or `isize` bytes.
    #[must_use]
    pub fn new(layout: ElementLayout, count_hint: usize) -> Self {
        let block = block_layout(layout, count_hint);
        // SAFETY: the block always contains the header, so its size is non-zero.
        let raw = unsafe { alloc(block) };
        let Some(header) = NonNull::new(raw.cast::<StoreHeader>()) else {
            handle_alloc_error(block)
        };
        // SAFETY: freshly allocated, sized and aligned for the header.
        unsafe {
            header.as_ptr().write(StoreHeader {
                count: 0,
                capacity: to_i32(count_hint),
                #[cfg(debug_assertions)]
                elem_size: layout.size as i64,
                #[cfg(debug_assertions)]
                elem_align: layout.align as i64,
            });
        }
        Self { header }
    }

    #[inline]
    fn header(&self) -> &StoreHeader {
        // SAFETY: the header is written at creation and lives as long as the block.
        unsafe { self.header.as_ref() }
    }

    #[inline]
    fn header_mut(&mut self) -> &mut StoreHeader {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { self.header.as_mut() }
    }

    /// Number of live elements.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.header().count as usize
    }

    /// Number of elements the block can hold without growing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    /// True if the store holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header().count == 0
    }

    /// Checks `layout` against the one recorded at creation (debug only).
    #[inline]
    fn assert_layout(&self, layout: ElementLayout) {
        #[cfg(debug_assertions)]
        {
            let recorded = self.header().elem_size;
            assert!(
                recorded == layout.size as i64,
                "element size mismatch: store holds {recorded}-byte elements, caller passed {}",
                layout.size
            );
            let recorded = self.header().elem_align;
            assert!(
                recorded == layout.align as i64,
                "element alignment mismatch: store holds {recorded}-aligned elements, caller passed {}",
                layout.align
            );
        }
        #[cfg(not(debug_assertions))]
        let _ = layout;
    }

    #[inline]
    fn data_ptr(&self, layout: ElementLayout) -> *mut u8 {
        // SAFETY: the offset stays inside the block (the header precedes it).
        unsafe { self.header.as_ptr().cast::<u8>().add(data_offset(layout.align)) }
    }

    /// Moves the block to hold exactly `capacity` elements.
    fn reallocate(&mut self, layout: ElementLayout, capacity: usize) {
        let old = block_layout(layout, self.capacity());
        let new = block_layout(layout, capacity);
        // SAFETY: `old` is the layout the block was allocated with (caller
        // contract on `layout`), and `new` has the same alignment.
        let raw = unsafe { realloc(self.header.as_ptr().cast::<u8>(), old, new.size()) };
        let Some(header) = NonNull::new(raw.cast::<StoreHeader>()) else {
            handle_alloc_error(new)
        };
        self.header = header;
        self.header_mut().capacity = to_i32(capacity);
    }

    /// Ensures room for `additional` more elements, doubling when needed.
    fn reserve(&mut self, layout: ElementLayout, additional: usize) {
        let needed = self
            .count()
            .checked_add(additional)
            .unwrap_or_else(|| capacity_overflow());
        if needed > self.capacity() {
            self.reallocate(layout, needed.next_power_of_two());
        }
    }

    /// Extends the count by `n` zeroed elements, returning the first new index.
    fn extend_zeroed(&mut self, layout: ElementLayout, n: usize) -> usize {
        self.reserve(layout, n);
        let first = self.count();
        // SAFETY: `reserve` made room for `first + n` elements.
        unsafe {
            ptr::write_bytes(self.data_ptr(layout).add(first * layout.size), 0, n * layout.size);
        }
        self.header_mut().count = to_i32(first + n);
        first
    }

    /// Frees the block.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn free(self, layout: ElementLayout) {
        self.assert_layout(layout);
        let block = block_layout(layout, self.capacity());
        dealloc(self.header.as_ptr().cast::<u8>(), block);
    }

    /// Appends one zeroed element and returns its bytes.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn add(&mut self, layout: ElementLayout) -> &mut [u8] {
        self.add_n(layout, 1)
    }

    /// Appends `n` zeroed elements and returns their bytes.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn add_n(&mut self, layout: ElementLayout, n: usize) -> &mut [u8] {
        self.assert_layout(layout);
        let first = self.extend_zeroed(layout, n);
        let start = first * layout.size;
        &mut self.as_bytes_mut(layout)[start..]
    }

    /// All live elements as bytes.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn as_bytes(&self, layout: ElementLayout) -> &[u8] {
        self.assert_layout(layout);
        std::slice::from_raw_parts(self.data_ptr(layout), self.count() * layout.size)
    }

    /// All live elements as mutable bytes.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn as_bytes_mut(&mut self, layout: ElementLayout) -> &mut [u8] {
        self.assert_layout(layout);
        std::slice::from_raw_parts_mut(self.data_ptr(layout), self.count() * layout.size)
    }

    /// Bytes of the element at `index`.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with, and `index`
    /// must be below the count. Debug builds assert both; release builds
    /// check neither.
    pub unsafe fn get(&self, layout: ElementLayout, index: usize) -> &[u8] {
        self.assert_layout(layout);
        debug_assert!(index < self.count(), "index {index} out of range ({})", self.count());
        std::slice::from_raw_parts(self.data_ptr(layout).add(index * layout.size), layout.size)
    }

    /// Mutable bytes of the element at `index`.
    ///
    /// # Safety
    ///
    /// Same contract as [`get`](Self::get).
    pub unsafe fn get_mut(&mut self, layout: ElementLayout, index: usize) -> &mut [u8] {
        self.assert_layout(layout);
        debug_assert!(index < self.count(), "index {index} out of range ({})", self.count());
        std::slice::from_raw_parts_mut(self.data_ptr(layout).add(index * layout.size), layout.size)
    }

    /// Overwrites `index` with the last element and drops the last slot.
    ///
    /// Returns the new count. The element previously at the last position now
    /// lives at `index`; any index held for it is stale.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn remove_index_swap_last(&mut self, layout: ElementLayout, index: usize) -> usize {
        self.assert_layout(layout);
        let count = self.count();
        assert!(index < count, "index {index} out of range ({count})");
        let last = count - 1;
        if index != last {
            let base = self.data_ptr(layout);
            ptr::copy_nonoverlapping(
                base.add(last * layout.size),
                base.add(index * layout.size),
                layout.size,
            );
        }
        self.header_mut().count = to_i32(last);
        last
    }

    /// Drops the last element without moving data.
    pub fn remove_last(&mut self) {
        let header = self.header_mut();
        debug_assert!(header.count > 0, "remove_last on empty store");
        if header.count > 0 {
            header.count -= 1;
        }
    }

    /// Drops every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.header_mut().count = 0;
    }

    /// Zero-fills every live element. The count is unchanged.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn zero(&mut self, layout: ElementLayout) {
        self.as_bytes_mut(layout).fill(0);
    }

    /// Grows capacity to at least `size`. Returns the capacity.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn set_min_size(&mut self, layout: ElementLayout, size: usize) -> usize {
        self.assert_layout(layout);
        if size > self.capacity() {
            self.reallocate(layout, size);
        }
        self.capacity()
    }

    /// Sets capacity to exactly `size`, truncating the count if needed.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn set_size(&mut self, layout: ElementLayout, size: usize) -> usize {
        self.assert_layout(layout);
        if size < self.count() {
            self.header_mut().count = to_i32(size);
        }
        if size != self.capacity() {
            self.reallocate(layout, size);
        }
        self.capacity()
    }

    /// Sets the count, zero-filling new elements. Returns the count.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn set_count(&mut self, layout: ElementLayout, count: usize) -> usize {
        self.assert_layout(layout);
        let current = self.count();
        if count > current {
            self.extend_zeroed(layout, count - current);
        } else {
            self.header_mut().count = to_i32(count);
        }
        self.count()
    }

    /// Raises the count to at least `count`. Returns the count.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn set_min_count(&mut self, layout: ElementLayout, count: usize) -> usize {
        if count > self.count() {
            self.set_count(layout, count);
        }
        self.count()
    }

    /// Adds `additional` to the capacity. Returns the capacity.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn grow(&mut self, layout: ElementLayout, additional: usize) -> usize {
        self.assert_layout(layout);
        let capacity = self
            .capacity()
            .checked_add(additional)
            .unwrap_or_else(|| capacity_overflow());
        self.reallocate(layout, capacity);
        self.capacity()
    }

    /// Shrinks the allocation to the live count.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    pub unsafe fn reclaim(&mut self, layout: ElementLayout) {
        self.assert_layout(layout);
        let count = self.count();
        if count < self.capacity() {
            self.reallocate(layout, count);
        }
    }

    /// Copies the store into a new block sized to its count.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    #[must_use]
    pub unsafe fn copy(&self, layout: ElementLayout) -> Self {
        let mut copy = Self::new(layout, self.count());
        copy.add_n(layout, self.count()).copy_from_slice(self.as_bytes(layout));
        copy
    }

    /// Appends `src[index]` to `dst` and swap-removes it from `src`.
    ///
    /// Returns the index of the element in `dst`.
    ///
    /// # Safety
    ///
    /// Both stores must have been created with `layout`, and `index` must be
    /// below the count of `src`.
    pub unsafe fn move_index(
        dst: &mut Self,
        src: &mut Self,
        layout: ElementLayout,
        index: usize,
    ) -> usize {
        let dst_index = dst.count();
        dst.add(layout).copy_from_slice(src.get(layout, index));
        src.remove_index_swap_last(layout, index);
        dst_index
    }

    /// Returns `(allocated, used)` bytes, headers included.
    ///
    /// # Safety
    ///
    /// `layout` must be the layout the store was created with.
    #[must_use]
    pub unsafe fn memory(&self, layout: ElementLayout) -> (usize, usize) {
        self.assert_layout(layout);
        let offset = data_offset(layout.align);
        (
            offset + self.capacity() * layout.size,
            offset + self.count() * layout.size,
        )
    }
}

// SAFETY: the store exclusively owns plain bytes.
unsafe impl Send for ContiguousStore {}
// SAFETY: shared access only reads.
unsafe impl Sync for ContiguousStore {}
