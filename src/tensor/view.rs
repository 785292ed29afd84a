// This module implements MemoryView, the strided region of memory touched by one access site.
// It converts between linear view indices, coordinates and element offsets, answers bounds
// queries against the optional static bounds, and computes the byte alignment of any element from
// the guaranteed base alignment. normalized merges adjacent unbounded dimensions that are
// contiguous and drops inner unit dimensions; callers opt in, the builder never normalizes.

//! Strided memory views.
//!
//! A [`MemoryView`] describes the region an access site touches: an ordered
//! list of `(extent, stride)` dimensions (outermost first, strides in
//! elements), the element type, a symbolic base element offset and the byte
//! alignment guaranteed for the base address. A dimension may carry a static
//! bound; coordinates at or past it are out of bounds and must be masked.

use std::fmt;

use crate::ir::{DataType, Expr};

/// Byte alignment assumed for a view whose base was not specified.
pub const DEFAULT_BASE_ALIGN: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDim {
    pub extent: u64,
    /// Stride in elements.
    pub stride: i64,
    /// Coordinates `>= bound` are out of bounds.
    pub bound: Option<u64>,
}

impl ViewDim {
    pub fn new(extent: u64, stride: i64) -> Self {
        Self {
            extent,
            stride,
            bound: None,
        }
    }

    /// Number of in-bounds coordinates.
    pub fn real_extent(&self) -> u64 {
        self.bound.map_or(self.extent, |b| b.min(self.extent))
    }

    pub fn is_bounded(&self) -> bool {
        self.real_extent() < self.extent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryView {
    dims: Vec<ViewDim>,
    elem_type: DataType,
    base: Expr,
    base_align: u32,
}

impl MemoryView {
    /// View with a zero base offset and the default base alignment.
    pub fn new(elem_type: DataType, dims: &[(u64, i64)]) -> Self {
        assert!(!dims.is_empty(), "Memory view needs at least one dimension");
        assert!(
            !elem_type.is_block_unit() && elem_type != DataType::Bool,
            "Memory views hold data types, not message units"
        );
        Self {
            dims: dims.iter().map(|&(e, s)| ViewDim::new(e, s)).collect(),
            elem_type,
            base: Expr::int(0),
            base_align: DEFAULT_BASE_ALIGN,
        }
    }

    /// Set the base element offset and the byte alignment known for
    /// `mem_buf + base * elem_size`.
    pub fn with_base(mut self, base: Expr, base_align: u32) -> Self {
        assert!(base_align.is_power_of_two(), "Alignment must be a power of two");
        self.base = base;
        self.base_align = base_align;
        self
    }

    pub fn with_bound(mut self, dim: usize, bound: u64) -> Self {
        self.dims[dim].bound = Some(bound);
        self
    }

    pub fn dims(&self) -> &[ViewDim] {
        &self.dims
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn elem_type(&self) -> DataType {
        self.elem_type
    }

    pub fn elem_size(&self) -> u32 {
        self.elem_type.size()
    }

    pub fn base(&self) -> &Expr {
        &self.base
    }

    pub fn base_align(&self) -> u32 {
        self.base_align
    }

    pub fn nelems(&self) -> u64 {
        self.dims.iter().map(|d| d.extent).product()
    }

    pub fn has_bounds(&self) -> bool {
        self.dims.iter().any(ViewDim::is_bounded)
    }

    /// Coordinate of the `idx`-th element in view order (last dim fastest).
    pub fn coord_of(&self, mut idx: u64) -> Vec<u64> {
        let mut coord = vec![0; self.dims.len()];
        for (c, d) in coord.iter_mut().zip(&self.dims).rev() {
            *c = idx % d.extent;
            idx /= d.extent;
        }
        coord
    }

    /// Linear index of `coord` in view order; inverse of `coord_of`.
    pub fn index_of(&self, coord: &[u64]) -> u64 {
        coord
            .iter()
            .zip(&self.dims)
            .fold(0, |idx, (&c, d)| idx * d.extent + c)
    }

    /// Element offset of `coord` relative to the base.
    pub fn elem_offset(&self, coord: &[u64]) -> i64 {
        coord
            .iter()
            .zip(&self.dims)
            .map(|(&c, d)| c as i64 * d.stride)
            .sum()
    }

    pub fn in_bounds(&self, coord: &[u64]) -> bool {
        coord
            .iter()
            .zip(&self.dims)
            .all(|(&c, d)| c < d.real_extent())
    }

    pub fn is_innermost_contiguous(&self) -> bool {
        self.dims.last().is_some_and(|d| d.stride == 1)
    }

    /// Byte alignment guaranteed for the element at `elem_off`.
    pub fn alignment_at(&self, elem_off: i64) -> u32 {
        let bytes = elem_off * self.elem_size() as i64;
        if bytes == 0 {
            return self.base_align;
        }
        let low = 1u64 << bytes.unsigned_abs().trailing_zeros().min(31);
        (low as u32).min(self.base_align)
    }

    /// Merge adjacent unbounded dimensions that are contiguous in memory.
    ///
    /// The access builder never does this on its own; callers opt in when they
    /// do not need per-row coverings.
    pub fn normalized(&self) -> MemoryView {
        let mut dims: Vec<ViewDim> = Vec::with_capacity(self.dims.len());
        for d in &self.dims {
            if d.extent == 1 && !dims.is_empty() {
                continue;
            }
            match dims.last_mut() {
                Some(outer)
                    if outer.bound.is_none()
                        && d.bound.is_none()
                        && outer.stride == d.stride * d.extent as i64 =>
                {
                    outer.extent *= d.extent;
                    outer.stride = d.stride;
                }
                _ => dims.push(*d),
            }
        }
        MemoryView {
            dims,
            elem_type: self.elem_type,
            base: self.base.clone(),
            base_align: self.base_align,
        }
    }
}

impl fmt::Display for MemoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.elem_type)?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", d.extent, d.stride)?;
            if let Some(bound) = d.bound {
                write!(f, "<{bound}")?;
            }
        }
        write!(f, "]")?;
        if self.base != Expr::Int(0) {
            write!(f, " @ {}", self.base)?;
        }
        Ok(())
    }
}
