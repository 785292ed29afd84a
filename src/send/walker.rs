// This module provides the two cursors the linear covering advances in lockstep. MemoryWalker
// answers questions about the next elements of the view in view order: whether they form one
// contiguous in-bounds run, how many are left in the current innermost row, how the next address
// is aligned and which of them are in bounds. LayoutWalker follows the same elements through a
// candidate register layout and reports their register byte offsets, so the builder can check
// granule alignment, slot strides and whether a payload overlaps the next element.

//! Cursors over the memory view and the register layout.
//!
//! The access builder covers a view front to back. [`MemoryWalker`] tracks
//! how many view elements have been consumed and answers questions about the
//! next few (contiguity, alignment, bounds); [`LayoutWalker`] follows the
//! same elements through the candidate register layout. Both walk in view
//! order (last dimension fastest) and always advance together.

use crate::tensor::{MemoryView, RegisterLayout};

pub struct MemoryWalker<'a> {
    view: &'a MemoryView,
    pos: u64,
    total: u64,
}

impl<'a> MemoryWalker<'a> {
    pub fn new(view: &'a MemoryView) -> Self {
        Self {
            view,
            pos: 0,
            total: view.nelems(),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.total
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Linear index of the next element.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Element offset (relative to the view base) of the element `i` places
    /// past the cursor.
    pub fn elem_offset(&self, i: u64) -> i64 {
        self.view.elem_offset(&self.view.coord_of(self.pos + i))
    }

    /// The next `count` elements are consecutive in memory, lie in one
    /// innermost row and are all in bounds.
    pub fn is_run(&self, count: u64) -> bool {
        if count == 0 || count > self.remaining() || !self.view.is_innermost_contiguous() {
            return false;
        }
        let coord = self.view.coord_of(self.pos);
        let last = coord.len() - 1;
        let inner = &self.view.dims()[last];
        if coord[last] + count > inner.extent {
            return false;
        }
        let mut end = coord.clone();
        end[last] += count - 1;
        self.view.in_bounds(&coord) && self.view.in_bounds(&end)
    }

    /// Elements left in the innermost row of the cursor.
    pub fn row_remaining(&self) -> u64 {
        let inner = self.view.dims()[self.view.ndims() - 1].extent;
        (inner - self.pos % inner).min(self.remaining())
    }

    /// The address of the next element is aligned to `align` bytes.
    pub fn is_aligned(&self, align: u32) -> bool {
        self.view.alignment_at(self.elem_offset(0)) >= align
    }

    /// Mask with bit `i` set for each of the next `count` elements that is in
    /// bounds. Bits at and above `slots` are never set.
    pub fn in_bounds_mask(&self, count: u64, slots: u32) -> u32 {
        let n = count.min(slots as u64).min(self.remaining());
        (0..n)
            .filter(|&i| self.view.in_bounds(&self.view.coord_of(self.pos + i)))
            .fold(0u32, |mask, i| mask | (1 << i))
    }

    pub fn advance(&mut self, count: u64) {
        assert!(count <= self.remaining(), "Memory walker overrun");
        self.pos += count;
    }
}

pub struct LayoutWalker<'a> {
    layout: &'a RegisterLayout,
    view: &'a MemoryView,
    pos: u64,
}

impl<'a> LayoutWalker<'a> {
    pub fn new(layout: &'a RegisterLayout, view: &'a MemoryView) -> Self {
        assert_eq!(layout.ndims(), view.ndims(), "Layout does not match view");
        Self {
            layout,
            view,
            pos: 0,
        }
    }

    /// Register byte offset of the element `i` places past the cursor.
    pub fn offset_bytes_at(&self, i: u64) -> u64 {
        self.layout.offset_bytes(&self.view.coord_of(self.pos + i))
    }

    pub fn offset_bytes(&self) -> u64 {
        self.offset_bytes_at(0)
    }

    pub fn is_aligned(&self, granule: u32) -> bool {
        self.offset_bytes() % granule as u64 == 0
    }

    /// The next `count` elements sit `stride_bytes` apart in registers.
    pub fn can_access(&self, count: u64, stride_bytes: u32) -> bool {
        self.max_extent(stride_bytes, count) >= count
    }

    /// How many of the next elements (at most `limit`) sit `stride_bytes`
    /// apart in registers.
    pub fn max_extent(&self, stride_bytes: u32, limit: u64) -> u64 {
        let limit = limit.min(self.view.nelems() - self.pos);
        if limit == 0 {
            return 0;
        }
        let base = self.offset_bytes();
        (1..limit)
            .find(|&i| self.offset_bytes_at(i) != base + i * stride_bytes as u64)
            .unwrap_or(limit)
    }

    pub fn advance(&mut self, count: u64) {
        self.pos += count;
    }
}
