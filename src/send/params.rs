// This module decides the transfer policy of one access site before any message is built.
// SendParams bundles the target hardware, the memory element type, the operation, the address
// space, the cache hint, the 2D tile hint and three policy switches (prefer a dense register
// layout, attempt a 2D transfer, fall back to linear messages when the 2D attempt fails).
// resolve_send_params is the one-shot resolver: it keeps the caller's address space, drops cache
// hints the hardware cannot honour, and rewrites a plain load/store/prefetch to its 2D variant
// only when the tile hint is enabled and the view and hardware are eligible. TileHint also
// provides the standard hints for the operands of a systolic (DPAS) multiply.

//! Send parameter resolution.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use super::fixup::{self, TileRequest, MAX_LOAD_HEIGHT, MAX_ROW_BYTES};
use super::message::{AddressSpace, CacheHint, SendOp};
use crate::core::error::{enum_name, parse_enum, ParseError};
use crate::core::hw::HwConfig;
use crate::ir::DataType;
use crate::tensor::MemoryView;

/// Operand of a systolic multiply `C += A * B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandRole {
    A,
    B,
    C,
}

const OPERAND_ROLE_NAMES: [(OperandRole, &str); 3] = [
    (OperandRole::A, "a"),
    (OperandRole::B, "b"),
    (OperandRole::C, "c"),
];

impl fmt::Display for OperandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(enum_name(&OPERAND_ROLE_NAMES, *self))
    }
}

impl FromStr for OperandRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&OPERAND_ROLE_NAMES, "operand role", s)
    }
}

/// Requested 2D transfer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHint {
    pub elem_type: DataType,
    pub enable: bool,
    pub vnni: bool,
    pub transpose: bool,
    /// Rows combined by a VNNI surface permute; 1 when not permuted, 0 when
    /// not computed yet.
    pub vnni_permute_factor: u32,
    /// Tile width in elements, 0 for no preference.
    pub width: u32,
    /// Tile height in rows, 0 for no preference.
    pub height: u32,
}

impl TileHint {
    /// Disabled hint.
    pub fn new(elem_type: DataType) -> Self {
        Self {
            elem_type,
            enable: false,
            vnni: false,
            transpose: false,
            vnni_permute_factor: 0,
            width: 0,
            height: 0,
        }
    }

    pub fn enabled(elem_type: DataType, width: u32, height: u32) -> Self {
        Self {
            enable: true,
            width,
            height,
            ..Self::new(elem_type)
        }
    }

    pub fn with_vnni(mut self, vnni: bool) -> Self {
        self.vnni = vnni;
        self
    }

    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    /// Hint for loading one operand of a systolic multiply. `B` is repacked to
    /// VNNI when its elements are narrower than a dword.
    pub fn for_dpas_operand(role: OperandRole, elem_type: DataType) -> Self {
        let esize = elem_type.size();
        match role {
            OperandRole::A => Self::enabled(elem_type, 32 / esize, 32),
            OperandRole::B if esize < 4 => Self::enabled(elem_type, 16, 32).with_vnni(true),
            OperandRole::B | OperandRole::C => Self::enabled(elem_type, 16, 8),
        }
    }
}

/// Transfer policy of one access site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendParams {
    pub hw: HwConfig,
    pub mem_type: DataType,
    pub send_op: SendOp,
    pub address: AddressSpace,
    pub cache_hint: CacheHint,
    pub tile_hint: TileHint,
    /// Prefer packed register layouts over dword-strided ones.
    pub prefer_dense: bool,
    /// Attempt a 2D covering first.
    pub allow_tile: bool,
    /// Fall back to block/scattered messages when the 2D attempt fails.
    pub allow_legacy: bool,
}

impl SendParams {
    pub fn new(hw: HwConfig, mem_type: DataType, send_op: SendOp) -> Self {
        Self {
            hw,
            mem_type,
            send_op,
            address: AddressSpace::A64,
            cache_hint: CacheHint::Undef,
            tile_hint: TileHint::new(mem_type),
            prefer_dense: false,
            allow_tile: false,
            allow_legacy: true,
        }
    }

    /// `op` rewritten to its 2D variant when the tile hint is enabled.
    pub fn convert(&self, op: SendOp) -> SendOp {
        if self.tile_hint.enable {
            op.to_tile()
        } else {
            op
        }
    }

    pub fn is_slm(&self) -> bool {
        self.address == AddressSpace::Slm
    }

    pub fn is_prefetch(&self) -> bool {
        self.send_op.is_prefetch()
    }
}

/// 2D request for the two innermost dimensions of `view`.
pub fn tile_request(view: &MemoryView, op: SendOp, hint: &TileHint) -> TileRequest {
    let nd = view.ndims();
    assert!(nd >= 2, "2D transfer needs at least two dimensions");
    let esize = view.elem_size() as u64;
    let w = &view.dims()[nd - 1];
    let h = &view.dims()[nd - 2];
    TileRequest {
        op,
        elem_type: view.elem_type(),
        vnni: hint.vnni,
        transpose: hint.transpose,
        surface_width: w.real_extent() * esize,
        surface_height: h.real_extent(),
        surface_pitch: h.stride.max(0) as u64 * esize,
        extent_w: w.extent,
        extent_h: h.extent,
        hint_width: hint.width,
        hint_height: hint.height,
    }
}

fn tile_ineligibility(
    hw: &HwConfig,
    op: SendOp,
    address: AddressSpace,
    view: &MemoryView,
    hint: &TileHint,
) -> Option<&'static str> {
    if !hint.enable {
        return Some("no 2D hint");
    }
    if address != AddressSpace::A64 {
        return Some("2D messages need global memory");
    }
    if !hw.has_tile_transfer {
        return Some("hardware has no 2D messages");
    }
    if !matches!(op, SendOp::Load | SendOp::Store | SendOp::Prefetch) {
        return Some("operation has no 2D variant");
    }
    if view.ndims() < 2 || !view.is_innermost_contiguous() {
        return Some("innermost dimension is not contiguous");
    }
    if view.dims()[view.ndims() - 2].stride <= 0 {
        return Some("rows do not advance in memory");
    }
    let esize = view.elem_size();
    if !matches!(esize, 1 | 2 | 4 | 8) || hint.elem_type.size() != esize {
        return Some("element size not supported by 2D messages");
    }
    if hint.width > MAX_ROW_BYTES / esize || hint.height > MAX_LOAD_HEIGHT {
        return Some("hinted tile exceeds 2D limits");
    }
    if (hint.vnni || hint.transpose) && op != SendOp::Load {
        return Some("only loads can repack or transpose");
    }
    None
}

/// Fix the transfer policy for an access to `view`.
///
/// Deterministic and side-effect free apart from logging. The address space
/// is taken as given.
pub fn resolve_send_params(
    hw: &HwConfig,
    op: SendOp,
    address: AddressSpace,
    view: &MemoryView,
    cache_hint: CacheHint,
    hint: TileHint,
) -> SendParams {
    let op = op.to_linear();
    let mut params = SendParams::new(*hw, view.elem_type(), op);
    params.address = address;
    params.cache_hint = cache_hint;
    if cache_hint != CacheHint::Undef && !hw.has_cache_hints {
        warn!("Dropping {cache_hint}: {} has no cache control", hw.gen);
        params.cache_hint = CacheHint::Undef;
    }

    match tile_ineligibility(hw, op, address, view, &hint) {
        None => {
            let mut hint = hint;
            hint.vnni_permute_factor =
                fixup::vnni_permute_factor(&tile_request(view, op.to_tile(), &hint));
            params.tile_hint = hint;
            params.send_op = params.convert(op);
            params.allow_tile = true;
            debug!("Using {} for {view}", params.send_op);
        }
        Some(reason) => {
            if hint.enable {
                debug!("2D messages disabled for {view}: {reason}");
            }
            params.tile_hint = TileHint {
                enable: false,
                ..hint
            };
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hw::HwGen;

    fn matrix(ty: DataType, rows: u64, cols: u64) -> MemoryView {
        MemoryView::new(ty, &[(rows, cols as i64), (cols, 1)])
    }

    fn resolve(
        hw: &HwConfig,
        op: SendOp,
        address: AddressSpace,
        view: &MemoryView,
        hint: TileHint,
    ) -> SendParams {
        resolve_send_params(hw, op, address, view, CacheHint::Undef, hint)
    }

    #[test]
    fn test_tile_rewrite() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = matrix(DataType::F32, 32, 64);
        let hint = TileHint::enabled(DataType::F32, 16, 8);
        let p = resolve(&hw, SendOp::Load, AddressSpace::A64, &view, hint);
        assert_eq!(p.send_op, SendOp::LoadTile);
        assert!(p.allow_tile);
        assert!(p.allow_legacy);
        assert!(p.tile_hint.enable);
        assert_eq!(p.tile_hint.vnni_permute_factor, 1);

        let p = resolve(&hw, SendOp::Prefetch, AddressSpace::A64, &view, hint);
        assert_eq!(p.send_op, SendOp::PrefetchTile);
        assert!(p.is_prefetch());
    }

    #[test]
    fn test_ineligible_keeps_plain_op() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = matrix(DataType::BF16, 32, 64);
        let hint = TileHint::enabled(DataType::BF16, 16, 16);

        let p = resolve(&hw, SendOp::Load, AddressSpace::Slm, &view, hint);
        assert_eq!(p.send_op, SendOp::Load);
        assert!(p.is_slm());
        assert!(!p.allow_tile);
        assert!(!p.tile_hint.enable);

        let p = resolve(&hw, SendOp::Store, AddressSpace::A64, &view, hint.with_vnni(true));
        assert_eq!(p.send_op, SendOp::Store);

        let gen12 = HwConfig::new(HwGen::XeHpg);
        let p = resolve(&gen12, SendOp::Load, AddressSpace::A64, &view, hint);
        assert_eq!(p.send_op, SendOp::Load);

        let column = MemoryView::new(DataType::BF16, &[(64, 1), (32, 64)]);
        let p = resolve(&hw, SendOp::Load, AddressSpace::A64, &column, hint);
        assert!(!p.allow_tile);

        let wide = TileHint::enabled(DataType::BF16, 64, 8);
        let p = resolve(&hw, SendOp::Load, AddressSpace::A64, &view, wide);
        assert!(!p.allow_tile);
    }

    #[test]
    fn test_huge_width_hint_is_ineligible() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = matrix(DataType::F32, 16, 64);
        let hint = TileHint::enabled(DataType::F32, 0x4000_0000, 8);
        assert_eq!(
            tile_ineligibility(&hw, SendOp::Load, AddressSpace::A64, &view, &hint),
            Some("hinted tile exceeds 2D limits")
        );

        let p = resolve(&hw, SendOp::Load, AddressSpace::A64, &view, hint);
        assert_eq!(p.send_op, SendOp::Load);
        assert!(!p.allow_tile);

        let widest = TileHint::enabled(DataType::F32, MAX_ROW_BYTES / 4, 8);
        assert_eq!(
            tile_ineligibility(&hw, SendOp::Load, AddressSpace::A64, &view, &widest),
            None
        );
    }

    #[test]
    fn test_cache_hint_dropped() {
        let view = matrix(DataType::F32, 4, 64);
        let hint = TileHint::new(DataType::F32);
        let gen9 = HwConfig::new(HwGen::Gen9);
        let p = resolve_send_params(
            &gen9,
            SendOp::Load,
            AddressSpace::A64,
            &view,
            CacheHint::LoadOnce,
            hint,
        );
        assert_eq!(p.cache_hint, CacheHint::Undef);

        let hpg = HwConfig::new(HwGen::XeHpg);
        let p = resolve_send_params(
            &hpg,
            SendOp::Load,
            AddressSpace::A64,
            &view,
            CacheHint::LoadOnce,
            hint,
        );
        assert_eq!(p.cache_hint, CacheHint::LoadOnce);
    }

    #[test]
    fn test_dpas_hints() {
        let b = TileHint::for_dpas_operand(OperandRole::B, DataType::BF16);
        assert!(b.enable && b.vnni && !b.transpose);
        assert_eq!((b.width, b.height), (16, 32));

        let b32 = TileHint::for_dpas_operand(OperandRole::B, DataType::F32);
        assert!(!b32.vnni);

        let a = TileHint::for_dpas_operand(OperandRole::A, DataType::U8);
        assert_eq!(a.width, 32);
        assert_eq!("c".parse::<OperandRole>(), Ok(OperandRole::C));
    }

    #[test]
    fn test_vnni_permute_factor_recorded() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = matrix(DataType::BF16, 64, 16);
        let hint = TileHint::for_dpas_operand(OperandRole::B, DataType::BF16);
        let p = resolve(&hw, SendOp::Load, AddressSpace::A64, &view, hint);
        assert_eq!(p.send_op, SendOp::LoadTile);
        assert_eq!(p.tile_hint.vnni_permute_factor, 2);
    }

    #[test]
    fn test_convert() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let mut p = SendParams::new(hw, DataType::F16, SendOp::Load);
        assert_eq!(p.convert(SendOp::Store), SendOp::Store);
        p.tile_hint.enable = true;
        assert_eq!(p.convert(SendOp::Store), SendOp::StoreTile);
        assert_eq!(p.convert(SendOp::AtomicAdd), SendOp::AtomicAdd);
    }
}
