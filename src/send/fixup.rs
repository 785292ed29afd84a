// This module contains the hardware rules that turn a requested 2D block transfer into legal
// tile parameters. The limits of the block messages (row bytes, load and store heights, block
// counts, payload registers, surface width, height and pitch) are named constants, and every
// rounding or validation step is a separate pure function with its own tests. The access builder
// only calls fixup_tile_params, which chains the steps and either returns TileParams or a reason
// the transfer cannot be expressed as 2D messages.

//! Hardware fix-up rules for 2D block transfers.
//!
//! Each rule is a small pure function so it can be checked on its own; the
//! access builder only calls [`fixup_tile_params`], which chains them:
//!
//! 1. narrow VNNI surfaces are reinterpreted as wider ones
//!    ([`vnni_permute_factor`]),
//! 2. surface width, height and pitch are validated,
//! 3. the requested tile width and height are rounded down to the largest
//!    legal divisor of the view extents,
//! 4. the block count is clamped to what the row and payload limits allow.

use log::debug;

use super::message::{SendOp, TileGeometry};
use crate::core::hw::HwConfig;
use crate::ir::DataType;

/// Widest tile row in bytes (all blocks of a message together).
pub const MAX_ROW_BYTES: u32 = 64;
pub const MAX_LOAD_HEIGHT: u32 = 32;
pub const MAX_STORE_HEIGHT: u32 = 8;
/// Transposed loads move at most 8 columns of 4- or 8-byte elements.
pub const MAX_TRANSPOSE_WIDTH: u32 = 8;
pub const MAX_COUNT: u32 = 4;
/// Payload limit of one 2D message, in registers.
pub const MAX_TILE_PAYLOAD_REGS: u32 = 32;
pub const MIN_SURFACE_BYTES: u64 = 64;
pub const MAX_SURFACE_DIM: u64 = 1 << 24;
/// Required alignment of the surface base address.
pub const TILE_BASE_ALIGN: u32 = 64;

/// A 2D transfer as derived from a memory view, before fix-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub op: SendOp,
    pub elem_type: DataType,
    pub vnni: bool,
    pub transpose: bool,
    /// Surface width in bytes.
    pub surface_width: u64,
    /// Surface height in rows.
    pub surface_height: u64,
    /// Surface pitch in bytes.
    pub surface_pitch: u64,
    /// View extent along the surface width, in elements.
    pub extent_w: u64,
    /// View extent along the surface height, in rows.
    pub extent_h: u64,
    /// Preferred tile width in elements, 0 for no preference.
    pub hint_width: u32,
    /// Preferred tile height in rows, 0 for no preference.
    pub hint_height: u32,
}

/// Legal 2D transfer parameters.
///
/// When `vnni_permute_factor > 1` the surface and view extents are the
/// reinterpreted ones: `factor` view rows form one surface row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileParams {
    pub surface_width: u32,
    pub surface_height: u32,
    pub surface_pitch: u32,
    pub width: u32,
    pub height: u32,
    pub count: u32,
    pub vnni: bool,
    pub transpose: bool,
    pub vnni_permute_factor: u32,
    pub view_width: u64,
    pub view_height: u64,
}

impl TileParams {
    pub fn geometry(&self) -> TileGeometry {
        TileGeometry {
            surface_width: self.surface_width,
            surface_height: self.surface_height,
            surface_pitch: self.surface_pitch,
            width: self.width,
            height: self.height,
            count: self.count,
            vnni: self.vnni,
            transpose: self.transpose,
        }
    }

    /// Messages along the surface width.
    pub fn tiles_x(&self) -> u64 {
        self.view_width / (self.width * self.count) as u64
    }

    /// Messages along the surface height.
    pub fn tiles_y(&self) -> u64 {
        self.view_height / self.height as u64
    }
}

/// Register bytes of one block: the non-transposed row length (or the
/// transposed column length) is padded to a power of two.
pub fn block_payload_size(
    esize: u32,
    width: u32,
    height: u32,
    transpose: bool,
    grf_size: u32,
) -> u32 {
    let (w, h) = if transpose {
        (width, height.next_power_of_two())
    } else {
        (width.next_power_of_two(), height)
    };
    (esize * w * h).next_multiple_of(grf_size)
}

pub fn max_width(esize: u32, transpose: bool) -> u32 {
    if transpose {
        MAX_TRANSPOSE_WIDTH
    } else {
        MAX_ROW_BYTES / esize
    }
}

pub fn max_height(op: SendOp) -> u32 {
    if op.is_store() {
        MAX_STORE_HEIGHT
    } else {
        MAX_LOAD_HEIGHT
    }
}

/// Blocks per message; stores and transposed loads move a single block.
pub fn max_count(op: SendOp, transpose: bool, width: u32, esize: u32) -> u32 {
    if op.is_store() || transpose {
        return 1;
    }
    (MAX_ROW_BYTES / (width * esize).max(1)).clamp(1, MAX_COUNT)
}

/// Rows interleaved by a VNNI repack of `esize`-byte elements.
pub fn vnni_rows(esize: u32) -> u32 {
    (4 / esize).max(1)
}

/// Largest width not above the request that divides `extent` and keeps rows
/// dword-sized.
pub fn round_width(requested: u32, extent: u64, esize: u32, transpose: bool) -> Option<u32> {
    let start = preferred(requested, extent).min(max_width(esize, transpose) as u64);
    (1..=start)
        .rev()
        .find(|&w| extent % w == 0 && (w * esize as u64) % 4 == 0)
        .map(|w| w as u32)
}

/// Largest height not above the request that divides `extent` and is a
/// multiple of the VNNI row group.
pub fn round_height(requested: u32, extent: u64, op: SendOp, vnni_rows: u32) -> Option<u32> {
    let start = preferred(requested, extent).min(max_height(op) as u64);
    (1..=start)
        .rev()
        .find(|&h| extent % h == 0 && h % vnni_rows as u64 == 0)
        .map(|h| h as u32)
}

fn preferred(requested: u32, extent: u64) -> u64 {
    if requested == 0 {
        extent
    } else {
        extent.min(requested as u64)
    }
}

/// Largest block count within `max` that splits `tiles` evenly and keeps the
/// payload within [`MAX_TILE_PAYLOAD_REGS`].
pub fn clamp_count(max: u32, tiles: u64, block_payload: u32, grf_size: u32) -> Option<u32> {
    [4, 2, 1].into_iter().find(|&c| {
        c <= max && tiles % c as u64 == 0 && block_payload * c <= MAX_TILE_PAYLOAD_REGS * grf_size
    })
}

pub fn surface_width_ok(bytes: u64, esize: u32) -> bool {
    (MIN_SURFACE_BYTES..=MAX_SURFACE_DIM).contains(&bytes) && bytes % esize.max(4) as u64 == 0
}

pub fn surface_height_ok(rows: u64) -> bool {
    (1..=MAX_SURFACE_DIM).contains(&rows)
}

pub fn surface_pitch_ok(pitch: u64, width: u64) -> bool {
    (MIN_SURFACE_BYTES..=MAX_SURFACE_DIM).contains(&pitch) && pitch % 16 == 0 && pitch >= width
}

/// Factor by which a dense VNNI surface narrower than 64 bytes is widened.
///
/// `factor` consecutive rows are read as one row of a `64`-byte surface; the
/// tile must span the full surface width. Returns 1 when not applicable.
pub fn vnni_permute_factor(req: &TileRequest) -> u32 {
    let w = req.surface_width;
    let esize = req.elem_type.size() as u64;
    if !req.vnni || req.transpose || !req.op.is_load() {
        return 1;
    }
    if w == 0 || w >= MIN_SURFACE_BYTES || MIN_SURFACE_BYTES % w != 0 {
        return 1;
    }
    if req.surface_pitch != w || req.extent_w * esize != w {
        return 1;
    }
    let factor = MIN_SURFACE_BYTES / w;
    if req.surface_height % factor != 0 || req.extent_h % factor != 0 {
        return 1;
    }
    factor as u32
}

/// Hardware limits on the block shape of a 2D message.
pub fn tile_shape_ok(
    op: SendOp,
    elem_type: DataType,
    width: u32,
    height: u32,
    count: u32,
    vnni: bool,
    transpose: bool,
) -> bool {
    let esize = elem_type.size();
    if !op.is_tile() || elem_type.is_block_unit() || !matches!(esize, 1 | 2 | 4 | 8) {
        return false;
    }
    if width == 0 || width > max_width(esize, transpose) || (width * esize) % 4 != 0 {
        return false;
    }
    if height == 0 || height > max_height(op) {
        return false;
    }
    if transpose && (vnni || !matches!(esize, 4 | 8)) {
        return false;
    }
    if vnni && (esize >= 4 || height % vnni_rows(esize) != 0) {
        return false;
    }
    matches!(count, 1 | 2 | 4) && count <= max_count(op, transpose, width, esize)
}

/// Round a 2D request to legal parameters, or `None` if no legal tile covers
/// the view.
pub fn fixup_tile_params(hw: &HwConfig, req: &TileRequest) -> Option<TileParams> {
    let esize = req.elem_type.size();
    let factor = vnni_permute_factor(req);
    let f = factor as u64;

    let surface_width = req.surface_width * f;
    let surface_height = req.surface_height / f;
    let surface_pitch = req.surface_pitch * f;
    let view_width = req.extent_w * f;
    let view_height = req.extent_h / f;

    if !surface_width_ok(surface_width, esize) {
        debug!("2D surface width {surface_width} bytes is not legal");
        return None;
    }
    if !surface_height_ok(surface_height) {
        debug!("2D surface height {surface_height} is not legal");
        return None;
    }
    if !surface_pitch_ok(surface_pitch, surface_width) {
        debug!("2D surface pitch {surface_pitch} bytes is not legal");
        return None;
    }

    let vnni_rows = if req.vnni && esize < 4 { vnni_rows(esize) } else { 1 };
    let (hint_width, hint_height) = if factor > 1 {
        (0, req.hint_height / factor)
    } else {
        (req.hint_width, req.hint_height)
    };
    let width = round_width(hint_width, view_width, esize, req.transpose)?;
    let height = round_height(hint_height, view_height, req.op, vnni_rows)?;
    let block = block_payload_size(esize, width, height, req.transpose, hw.grf_size);
    let count = clamp_count(
        max_count(req.op, req.transpose, width, esize),
        view_width / width as u64,
        block,
        hw.grf_size,
    )?;

    if !tile_shape_ok(req.op, req.elem_type, width, height, count, req.vnni, req.transpose) {
        debug!("2D block {count}x{height}x{width} is not legal");
        return None;
    }

    Some(TileParams {
        surface_width: surface_width as u32,
        surface_height: surface_height as u32,
        surface_pitch: surface_pitch as u32,
        width,
        height,
        count,
        vnni: req.vnni,
        transpose: req.transpose,
        vnni_permute_factor: factor,
        view_width,
        view_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hw::HwGen;

    fn request(elem_type: DataType, width_elems: u64, height: u64) -> TileRequest {
        let bytes = width_elems * elem_type.size() as u64;
        TileRequest {
            op: SendOp::LoadTile,
            elem_type,
            vnni: false,
            transpose: false,
            surface_width: bytes,
            surface_height: height,
            surface_pitch: bytes,
            extent_w: width_elems,
            extent_h: height,
            hint_width: 0,
            hint_height: 0,
        }
    }

    #[test]
    fn test_round_width() {
        assert_eq!(round_width(0, 64, 4, false), Some(16));
        assert_eq!(round_width(8, 64, 4, false), Some(8));
        assert_eq!(round_width(0, 100, 4, false), Some(10));
        // Byte rows must stay dword-sized.
        assert_eq!(round_width(0, 6, 1, false), None);
        assert_eq!(round_width(0, 32, 8, true), Some(8));
    }

    #[test]
    fn test_round_height() {
        assert_eq!(round_height(0, 64, SendOp::LoadTile, 1), Some(32));
        assert_eq!(round_height(0, 64, SendOp::StoreTile, 1), Some(8));
        assert_eq!(round_height(12, 24, SendOp::LoadTile, 4), Some(12));
        assert_eq!(round_height(0, 6, SendOp::LoadTile, 4), None);
    }

    #[test]
    fn test_count_limits() {
        assert_eq!(max_count(SendOp::LoadTile, false, 8, 2), 4);
        assert_eq!(max_count(SendOp::LoadTile, false, 8, 4), 2);
        assert_eq!(max_count(SendOp::LoadTile, false, 16, 4), 1);
        assert_eq!(max_count(SendOp::StoreTile, false, 4, 4), 1);
        assert_eq!(max_count(SendOp::LoadTile, true, 4, 4), 1);

        assert_eq!(clamp_count(4, 8, 256, 64), Some(4));
        assert_eq!(clamp_count(4, 6, 256, 64), Some(2));
        assert_eq!(clamp_count(2, 3, 256, 64), Some(1));
        assert_eq!(clamp_count(4, 4, 1024, 64), Some(2));
    }

    #[test]
    fn test_surface_rules() {
        assert!(surface_width_ok(64, 4));
        assert!(!surface_width_ok(32, 4));
        assert!(!surface_width_ok(100, 8));
        assert!(surface_height_ok(1));
        assert!(!surface_height_ok(0));
        assert!(surface_pitch_ok(128, 100));
        assert!(!surface_pitch_ok(72, 64));
        assert!(!surface_pitch_ok(64, 128));
    }

    #[test]
    fn test_block_payload() {
        assert_eq!(block_payload_size(4, 8, 4, false, 64), 128);
        assert_eq!(block_payload_size(2, 10, 8, false, 64), 256);
        assert_eq!(block_payload_size(4, 8, 3, true, 64), 128);
    }

    #[test]
    fn test_vnni_permute_factor() {
        let mut req = request(DataType::BF16, 16, 64);
        req.vnni = true;
        assert_eq!(vnni_permute_factor(&req), 2);

        req.surface_pitch = 64;
        assert_eq!(vnni_permute_factor(&req), 1);

        let mut wide = request(DataType::BF16, 32, 64);
        wide.vnni = true;
        assert_eq!(vnni_permute_factor(&wide), 1);
    }

    #[test]
    fn test_fixup_plain_load() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let mut req = request(DataType::F32, 64, 16);
        req.hint_width = 8;
        req.hint_height = 8;
        let p = fixup_tile_params(&hw, &req).unwrap();
        assert_eq!((p.width, p.height, p.count), (8, 8, 2));
        assert_eq!(p.tiles_x(), 4);
        assert_eq!(p.tiles_y(), 2);
        assert_eq!(p.vnni_permute_factor, 1);
    }

    #[test]
    fn test_fixup_vnni_permute() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let mut req = request(DataType::BF16, 16, 64);
        req.vnni = true;
        req.hint_height = 32;
        let p = fixup_tile_params(&hw, &req).unwrap();
        assert_eq!(p.vnni_permute_factor, 2);
        assert_eq!(p.surface_width, 64);
        assert_eq!(p.surface_height, 32);
        assert_eq!((p.width, p.height, p.count), (32, 16, 1));
    }

    #[test]
    fn test_fixup_rejects_narrow_surface() {
        let hw = HwConfig::new(HwGen::XeHpc);
        assert!(fixup_tile_params(&hw, &request(DataType::F32, 8, 16)).is_none());
    }

    #[test]
    fn test_shape_rules() {
        let ok = |op, ty, w, h, c, v, t| tile_shape_ok(op, ty, w, h, c, v, t);
        assert!(ok(SendOp::LoadTile, DataType::F16, 16, 32, 2, true, false));
        assert!(!ok(SendOp::LoadTile, DataType::F32, 16, 32, 1, true, false));
        assert!(!ok(SendOp::StoreTile, DataType::F32, 16, 16, 1, false, false));
        assert!(ok(SendOp::LoadTile, DataType::F32, 8, 32, 1, false, true));
        assert!(!ok(SendOp::LoadTile, DataType::F16, 8, 32, 1, false, true));
        assert!(!ok(SendOp::Load, DataType::F32, 8, 8, 1, false, false));
        assert!(!ok(SendOp::LoadTile, DataType::U8, 3, 8, 1, false, false));
    }
}
