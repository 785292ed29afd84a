// This module implements RegisterLayout, the placement of view elements in the register buffer.
// A layout is a list of (dim, size, stride) blocks, which is enough to express dense and
// strided layouts, rows padded to the register granule and the split dimensions produced by 2D
// block loads (VNNI packing, transposition, multi-block messages).

//! Register-file layouts.
//!
//! A [`RegisterLayout`] places every element of a view inside the register
//! buffer. It is a list of blocks `(dim, size, stride)`; a view dimension may
//! be split across several blocks, listed from its innermost digit outwards.
//! Strides are in elements of the layout type.

use std::fmt;

use super::view::MemoryView;
use crate::ir::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBlock {
    pub dim: usize,
    pub size: u64,
    pub stride: u64,
}

impl LayoutBlock {
    pub fn new(dim: usize, size: u64, stride: u64) -> Self {
        Self { dim, size, stride }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterLayout {
    elem_type: DataType,
    ndims: usize,
    blocks: Vec<LayoutBlock>,
}

impl RegisterLayout {
    pub fn new(elem_type: DataType, ndims: usize, blocks: Vec<LayoutBlock>) -> Self {
        assert!(
            blocks.iter().all(|b| b.dim < ndims && b.size > 0),
            "Layout block out of range"
        );
        Self {
            elem_type,
            ndims,
            blocks,
        }
    }

    /// Packed layout following the view's element order.
    pub fn dense(view: &MemoryView) -> Self {
        Self::rows(view, 1, 1)
    }

    /// Like [`dense`](Self::dense) but with `elem_stride` elements between
    /// neighbours of the innermost dimension.
    pub fn strided(view: &MemoryView, elem_stride: u64) -> Self {
        Self::rows(view, elem_stride, 1)
    }

    /// Innermost rows start on a `granule`-byte boundary.
    pub fn padded_rows(view: &MemoryView, elem_stride: u64, granule: u32) -> Self {
        Self::rows(view, elem_stride, granule)
    }

    fn rows(view: &MemoryView, elem_stride: u64, granule: u32) -> Self {
        let esize = view.elem_size() as u64;
        let granule = granule as u64;
        assert!(granule % esize == 0 || granule == 1, "Granule must hold whole elements");

        let ndims = view.ndims();
        let mut blocks = Vec::with_capacity(ndims);
        let mut stride = elem_stride;
        for (idx, d) in view.dims().iter().enumerate().rev() {
            blocks.push(LayoutBlock::new(idx, d.extent, stride));
            stride *= d.extent;
            if idx == ndims - 1 && granule > 1 {
                stride = (stride * esize).next_multiple_of(granule) / esize;
            }
        }
        Self::new(view.elem_type(), ndims, blocks)
    }

    pub fn elem_type(&self) -> DataType {
        self.elem_type
    }

    pub fn ndims(&self) -> usize {
        self.ndims
    }

    pub fn blocks(&self) -> &[LayoutBlock] {
        &self.blocks
    }

    /// Offset of `coord` in elements.
    pub fn offset_of(&self, coord: &[u64]) -> u64 {
        debug_assert_eq!(coord.len(), self.ndims);
        let mut rem = coord.to_vec();
        let mut off = 0;
        for b in &self.blocks {
            let digit = rem[b.dim] % b.size;
            rem[b.dim] /= b.size;
            off += digit * b.stride;
        }
        off
    }

    pub fn offset_bytes(&self, coord: &[u64]) -> u64 {
        self.offset_of(coord) * self.elem_type.size() as u64
    }

    /// Bytes from the buffer start to the end of the last element.
    pub fn size_bytes(&self) -> u64 {
        let last: u64 = self.blocks.iter().map(|b| (b.size - 1) * b.stride).sum();
        (last + 1) * self.elem_type.size() as u64
    }

    /// Number of distinct elements.
    pub fn elems(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).product()
    }
}

impl fmt::Display for RegisterLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <", self.elem_type)?;
        for (i, b) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "d{}:{}@{}", b.dim, b.size, b.stride)?;
        }
        write!(f, ">")
    }
}
