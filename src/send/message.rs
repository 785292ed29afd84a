// This module defines MessageDescriptor, the immutable description of one hardware memory
// transaction ("send message") used by the access builder. A descriptor is a tagged value:
// the fields every message has (hardware, operation, element type, zero-fill and cache
// hint) plus a MessageShape that is either Linear (block or scattered transfer, with address
// space, slot count, slot mask and masking granularity) or Tile (a 2D block transfer with a
// TileGeometry). Construction goes through make_linear, make_linear_default and make_tile,
// which assert the structural invariants (a tile op always carries a non-empty geometry, a
// store tile never repacks or transposes). Every hardware-derived quantity (access and
// payload sizes, alignment, mask granularity and count, header size) is a pure method.
// Unsupported configurations are reported by is_supported and never raised. The module also
// owns the operation, kind, address space and cache-hint enumerations with their constant
// name tables, the header field offsets of 2D messages, the offset-header store helper and
// get_all, which enumerates every supported linear message for an access in preference order.

//! Send message descriptors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::fixup;
use crate::core::error::{enum_name, parse_enum, ParseError};
use crate::core::hw::HwConfig;
use crate::ir::{DataType, Expr, SendArgs, Stmt};

/// Slot mask with every slot enabled.
pub const DEFAULT_SLOT_MASK: u32 = 0xFFFF_FFFF;

/// Largest slot count the mask field can describe.
pub const MAX_SLOTS: u32 = 32;

// Header field byte offsets of 2D block messages.
pub const HEADER_2D_OFF_BASE: u32 = 0;
pub const HEADER_2D_OFF_SURFACE_WIDTH: u32 = 8;
pub const HEADER_2D_OFF_SURFACE_HEIGHT: u32 = 12;
pub const HEADER_2D_OFF_SURFACE_PITCH: u32 = 16;
pub const HEADER_2D_OFF_X: u32 = 20;
pub const HEADER_2D_OFF_Y: u32 = 24;
pub const HEADER_2D_OFF_WHC: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOp {
    Undef,
    AtomicAdd,
    AtomicFadd,
    AtomicCmpwr,
    Load,
    LoadTile,
    Prefetch,
    PrefetchTile,
    Store,
    StoreTile,
}

const SEND_OP_NAMES: [(SendOp, &str); 10] = [
    (SendOp::Undef, "undef"),
    (SendOp::AtomicAdd, "atomic_add"),
    (SendOp::AtomicFadd, "atomic_fadd"),
    (SendOp::AtomicCmpwr, "atomic_cmpwr"),
    (SendOp::Load, "load"),
    (SendOp::LoadTile, "load_2d"),
    (SendOp::Prefetch, "prefetch"),
    (SendOp::PrefetchTile, "prefetch_2d"),
    (SendOp::Store, "store"),
    (SendOp::StoreTile, "store_2d"),
];

impl SendOp {
    pub fn name(self) -> &'static str {
        enum_name(&SEND_OP_NAMES, self)
    }

    pub fn is_tile(self) -> bool {
        matches!(self, SendOp::LoadTile | SendOp::StoreTile | SendOp::PrefetchTile)
    }

    pub fn is_load(self) -> bool {
        matches!(self, SendOp::Load | SendOp::LoadTile)
    }

    pub fn is_store(self) -> bool {
        matches!(self, SendOp::Store | SendOp::StoreTile)
    }

    pub fn is_prefetch(self) -> bool {
        matches!(self, SendOp::Prefetch | SendOp::PrefetchTile)
    }

    pub fn is_atomic(self) -> bool {
        matches!(
            self,
            SendOp::AtomicAdd | SendOp::AtomicFadd | SendOp::AtomicCmpwr
        )
    }

    /// 2D variant of a plain load, store or prefetch; other ops are returned
    /// unchanged.
    pub fn to_tile(self) -> SendOp {
        match self {
            SendOp::Load => SendOp::LoadTile,
            SendOp::Store => SendOp::StoreTile,
            SendOp::Prefetch => SendOp::PrefetchTile,
            other => other,
        }
    }

    pub fn to_linear(self) -> SendOp {
        match self {
            SendOp::LoadTile => SendOp::Load,
            SendOp::StoreTile => SendOp::Store,
            SendOp::PrefetchTile => SendOp::Prefetch,
            other => other,
        }
    }
}

impl fmt::Display for SendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SendOp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&SEND_OP_NAMES, "send op", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendKind {
    Undef,
    Tile,
    Block,
    Scattered,
}

const SEND_KIND_NAMES: [(SendKind, &str); 4] = [
    (SendKind::Undef, "undef"),
    (SendKind::Tile, "2d"),
    (SendKind::Block, "block"),
    (SendKind::Scattered, "scattered"),
];

impl SendKind {
    pub fn name(self) -> &'static str {
        enum_name(&SEND_KIND_NAMES, self)
    }
}

impl fmt::Display for SendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SendKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&SEND_KIND_NAMES, "send kind", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// Global memory, 64-bit addresses.
    A64,
    /// Shared local memory, 32-bit offsets.
    Slm,
}

const ADDRESS_SPACE_NAMES: [(AddressSpace, &str); 2] =
    [(AddressSpace::A64, "a64"), (AddressSpace::Slm, "slm")];

impl AddressSpace {
    pub fn name(self) -> &'static str {
        enum_name(&ADDRESS_SPACE_NAMES, self)
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AddressSpace {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&ADDRESS_SPACE_NAMES, "address space", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheHint {
    #[default]
    Undef,
    /// Data is read once; do not keep it in L1.
    LoadOnce,
}

const CACHE_HINT_NAMES: [(CacheHint, &str); 2] = [
    (CacheHint::Undef, "cache:undef"),
    (CacheHint::LoadOnce, "cache:load_once"),
];

impl CacheHint {
    pub fn name(self) -> &'static str {
        enum_name(&CACHE_HINT_NAMES, self)
    }
}

impl fmt::Display for CacheHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheHint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&CACHE_HINT_NAMES, "cache hint", s)
    }
}

/// Geometry of a 2D block transfer.
///
/// Surface dimensions describe the whole 2D region in memory; the hardware
/// clips (and zero-fills on loads) anything outside it. The block itself is
/// `count` adjacent `height x width` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileGeometry {
    /// Surface width in bytes.
    pub surface_width: u32,
    /// Surface height in rows.
    pub surface_height: u32,
    /// Distance between rows in bytes.
    pub surface_pitch: u32,
    /// Tile width in elements.
    pub width: u32,
    /// Tile height in rows.
    pub height: u32,
    /// Number of tiles placed side by side.
    pub count: u32,
    pub vnni: bool,
    pub transpose: bool,
}

impl TileGeometry {
    pub fn is_empty(&self) -> bool {
        self.surface_width == 0
    }

    /// `"{count}x{height}x{width}"` with an optional `.v`/`.t`/`.vt` suffix.
    pub fn shape(&self) -> String {
        let mut s = format!("{}x{}x{}", self.count, self.height, self.width);
        if self.vnni || self.transpose {
            s.push('.');
            if self.vnni {
                s.push('v');
            }
            if self.transpose {
                s.push('t');
            }
        }
        s
    }
}

impl fmt::Display for TileGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shape())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageShape {
    /// Block or scattered transfer.
    Linear {
        address: AddressSpace,
        slots: u32,
        slot_mask: u32,
        /// Per-element rather than per-dword masking.
        fine_grained: bool,
    },
    Tile(TileGeometry),
}

/// One hardware memory transaction.
///
/// Block messages use one of the untyped units (`dword`, `oword`, `hword`)
/// as element type and move `slots` consecutive units from one address.
/// Scattered messages move one element per slot from per-slot addresses.
/// Equality and hashing ignore the hardware field.
#[derive(Debug, Clone, Copy)]
pub struct MessageDescriptor {
    hw: HwConfig,
    op: SendOp,
    elem_type: DataType,
    zero_fill: bool,
    cache_hint: CacheHint,
    shape: MessageShape,
}

impl MessageDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn make_linear(
        hw: HwConfig,
        op: SendOp,
        address: AddressSpace,
        elem_type: DataType,
        slots: u32,
        slot_mask: u32,
        fine_grained: bool,
        zero_fill: bool,
        cache_hint: CacheHint,
    ) -> Self {
        assert!(
            op != SendOp::Undef && !op.is_tile(),
            "Linear message needs a linear operation, got {op}"
        );
        assert!(
            (1..=MAX_SLOTS).contains(&slots),
            "Slot count {slots} out of range"
        );
        Self {
            hw,
            op,
            elem_type,
            zero_fill,
            cache_hint,
            shape: MessageShape::Linear {
                address,
                slots,
                slot_mask,
                fine_grained,
            },
        }
    }

    /// Linear message with every slot enabled and the hardware's default
    /// masking granularity.
    pub fn make_linear_default(
        hw: HwConfig,
        op: SendOp,
        address: AddressSpace,
        elem_type: DataType,
        slots: u32,
        zero_fill: bool,
        cache_hint: CacheHint,
    ) -> Self {
        Self::make_linear(
            hw,
            op,
            address,
            elem_type,
            slots,
            DEFAULT_SLOT_MASK,
            hw.default_fine_grained(),
            zero_fill,
            cache_hint,
        )
    }

    pub fn make_tile(
        hw: HwConfig,
        op: SendOp,
        elem_type: DataType,
        geometry: TileGeometry,
        zero_fill: bool,
        cache_hint: CacheHint,
    ) -> Self {
        assert!(op.is_tile(), "Tile message needs a 2D operation, got {op}");
        assert!(!geometry.is_empty(), "Tile message with empty geometry");
        if op == SendOp::StoreTile {
            assert!(!geometry.vnni, "2D store cannot repack to VNNI");
            assert!(!geometry.transpose, "2D store cannot transpose");
        }
        Self {
            hw,
            op,
            elem_type,
            zero_fill,
            cache_hint,
            shape: MessageShape::Tile(geometry),
        }
    }

    /// Copy of a linear message with a different slot mask.
    pub fn with_slot_mask(&self, mask: u32) -> Self {
        let mut msg = *self;
        match &mut msg.shape {
            MessageShape::Linear { slot_mask, .. } => *slot_mask = mask,
            MessageShape::Tile(_) => panic!("2D messages have no slot mask"),
        }
        msg
    }

    pub fn hw(&self) -> &HwConfig {
        &self.hw
    }

    pub fn op(&self) -> SendOp {
        self.op
    }

    pub fn elem_type(&self) -> DataType {
        self.elem_type
    }

    pub fn zero_fill(&self) -> bool {
        self.zero_fill
    }

    pub fn cache_hint(&self) -> CacheHint {
        self.cache_hint
    }

    pub fn shape(&self) -> &MessageShape {
        &self.shape
    }

    /// Tile messages always address global memory.
    pub fn address(&self) -> AddressSpace {
        match self.shape {
            MessageShape::Linear { address, .. } => address,
            MessageShape::Tile(_) => AddressSpace::A64,
        }
    }

    pub fn slots(&self) -> u32 {
        match self.shape {
            MessageShape::Linear { slots, .. } => slots,
            MessageShape::Tile(_) => 1,
        }
    }

    pub fn slot_mask(&self) -> u32 {
        match self.shape {
            MessageShape::Linear { slot_mask, .. } => slot_mask,
            MessageShape::Tile(_) => DEFAULT_SLOT_MASK,
        }
    }

    pub fn is_fine_grained(&self) -> bool {
        match self.shape {
            MessageShape::Linear { fine_grained, .. } => fine_grained,
            MessageShape::Tile(_) => true,
        }
    }

    pub fn geometry(&self) -> Option<&TileGeometry> {
        match &self.shape {
            MessageShape::Tile(g) => Some(g),
            MessageShape::Linear { .. } => None,
        }
    }

    pub fn is_tile(&self) -> bool {
        matches!(self.shape, MessageShape::Tile(_))
    }

    pub fn is_block(&self) -> bool {
        !self.is_tile() && self.elem_type.is_block_unit()
    }

    pub fn is_scattered(&self) -> bool {
        !self.is_tile() && !self.elem_type.is_block_unit()
    }

    pub fn is_slm(&self) -> bool {
        self.address() == AddressSpace::Slm
    }

    pub fn kind(&self) -> SendKind {
        if self.is_tile() {
            SendKind::Tile
        } else if self.is_block() {
            SendKind::Block
        } else {
            SendKind::Scattered
        }
    }

    fn grf_size(&self) -> u32 {
        self.hw.grf_size
    }

    /// Bytes of memory touched.
    pub fn access_size(&self) -> u32 {
        let esize = self.elem_type.size();
        match &self.shape {
            MessageShape::Tile(g) => esize * g.width * g.height * g.count,
            MessageShape::Linear { slots, .. } => esize * slots,
        }
    }

    /// Register distance between slots; sub-dword elements occupy a dword.
    pub fn payload_type_stride(&self) -> u32 {
        assert!(!self.is_tile(), "Tile payloads have no slot stride");
        self.elem_type.size().max(4)
    }

    /// Register bytes occupied by the payload, granule-aligned.
    pub fn payload_size(&self) -> u32 {
        match &self.shape {
            MessageShape::Tile(g) => {
                fixup::block_payload_size(
                    self.elem_type.size(),
                    g.width,
                    g.height,
                    g.transpose,
                    self.grf_size(),
                ) * g.count
            }
            MessageShape::Linear { slots, .. } => {
                (self.payload_type_stride() * slots).next_multiple_of(self.grf_size())
            }
        }
    }

    /// Byte alignment the message expects from its address.
    pub fn alignment(&self) -> u32 {
        if self.is_tile() {
            128
        } else if self.is_block() {
            self.elem_type.size()
        } else {
            1
        }
    }

    /// Bytes covered by one mask bit.
    pub fn mask_size(&self) -> u32 {
        if self.is_tile() {
            return self.access_size();
        }
        if self.is_block() && !self.is_fine_grained() {
            return 4;
        }
        self.elem_type.size()
    }

    /// Number of mask bits the message consumes.
    ///
    /// Before XeHPC block messages share a 16-bit mask field round-robin, so
    /// wider masks are capped at 16 and must be a multiple of it.
    pub fn mask_count(&self) -> u32 {
        if self.is_tile() {
            return 1;
        }
        let masks = self.access_size() / self.mask_size();
        if self.hw.mask_cap_applies() && self.is_block() && masks > 16 {
            assert!(masks % 16 == 0, "Round-robin mask count {masks} is not a multiple of 16");
            return 16;
        }
        masks
    }

    pub fn address_size(&self) -> u32 {
        match self.address() {
            AddressSpace::A64 => 8,
            AddressSpace::Slm => 4,
        }
    }

    pub fn address_type(&self, signed: bool) -> DataType {
        DataType::int(self.address_size(), signed)
    }

    /// Header bytes, granule-aligned.
    pub fn header_size(&self) -> u32 {
        match self.shape {
            MessageShape::Tile(_) => self.grf_size(),
            MessageShape::Linear { slots, .. } => {
                (self.address_size() * slots).next_multiple_of(self.grf_size())
            }
        }
    }

    pub fn has_default_slot_mask(&self) -> bool {
        let slots = self.slots();
        let all = if slots >= 32 {
            DEFAULT_SLOT_MASK
        } else {
            (1u32 << slots) - 1
        };
        self.slot_mask() & all == all
    }

    /// Whether the target hardware can execute this message.
    pub fn is_supported(&self) -> bool {
        if self.cache_hint != CacheHint::Undef && !self.hw.has_cache_hints {
            return false;
        }
        match &self.shape {
            MessageShape::Tile(g) => self.is_tile_supported(g),
            MessageShape::Linear {
                address,
                slots,
                fine_grained,
                ..
            } => self.is_linear_supported(*address, *slots, *fine_grained),
        }
    }

    fn is_tile_supported(&self, g: &TileGeometry) -> bool {
        let esize = self.elem_type.size();
        self.hw.has_tile_transfer
            && fixup::tile_shape_ok(
                self.op,
                self.elem_type,
                g.width,
                g.height,
                g.count,
                g.vnni,
                g.transpose,
            )
            && fixup::surface_width_ok(g.surface_width as u64, esize)
            && fixup::surface_height_ok(g.surface_height as u64)
            && fixup::surface_pitch_ok(g.surface_pitch as u64, g.surface_width as u64)
            && self.payload_size() <= fixup::MAX_TILE_PAYLOAD_REGS * self.grf_size()
    }

    fn is_linear_supported(&self, address: AddressSpace, slots: u32, fine_grained: bool) -> bool {
        let hw = &self.hw;
        let slm = address == AddressSpace::Slm;
        if !slots.is_power_of_two() || self.payload_size() > 8 * self.grf_size() {
            return false;
        }

        if self.is_block() {
            if self.op.is_atomic() {
                return false;
            }
            let unit_ok = match self.elem_type {
                DataType::Dword => fine_grained && hw.is_xe_hpc_plus(),
                DataType::Oword => slots <= 8 || (slots == 16 && slm),
                DataType::Hword => {
                    !slm && slots <= 8 && (hw.is_xe_hpc_plus() || !self.op.is_store())
                }
                _ => false,
            };
            if !unit_ok {
                return false;
            }
            if self.op.is_prefetch() && self.elem_type != DataType::Hword {
                return false;
            }
            let partial_store =
                self.op.is_store() && self.access_size() % self.grf_size() != 0;
            if hw.is_xe_hpc_plus() && partial_store {
                return false;
            }
            if hw.mask_cap_applies() {
                let masks = self.access_size() / self.mask_size();
                if masks > 16 && masks % 16 != 0 {
                    return false;
                }
            }
            return true;
        }

        let esize = self.elem_type.size();
        if !matches!(esize, 1 | 2 | 4 | 8) || self.elem_type == DataType::Bool {
            return false;
        }
        if slots > hw.max_lanes {
            return false;
        }
        if self.op.is_prefetch() && !hw.is_xe_hpc_plus() {
            return false;
        }
        if self.op.is_atomic() {
            if !matches!(esize, 4 | 8) {
                return false;
            }
            if self.op == SendOp::AtomicFadd && !self.elem_type.is_float() {
                return false;
            }
            if !hw.is_xe_hpc_plus() && !slm && slots > 8 {
                return false;
            }
        }
        true
    }

    /// Statement writing the address payload of a linear message.
    ///
    /// Global messages get absolute 64-bit addresses (`mem_buf + mem_off`),
    /// SLM messages get 32-bit offsets. `mem_off` is a byte offset, either
    /// scalar (block) or one lane per slot (scattered).
    pub fn create_offset_store(
        &self,
        header_buf: &Expr,
        mem_buf: &Expr,
        mem_off: Expr,
        signed_offset: bool,
    ) -> Stmt {
        assert!(!self.is_tile(), "2D headers are written field by field");
        let off_type = self.address_type(signed_offset);
        let value = match self.address() {
            AddressSpace::A64 => {
                mem_buf.clone().cast(self.address_type(false)) + mem_off.cast(off_type)
            }
            AddressSpace::Slm => mem_off.cast(off_type),
        };
        Stmt::store(header_buf.clone(), 0, self.address_type(false), value)
    }

    /// Send statement applying this message to `args`.
    pub fn call(&self, args: SendArgs) -> Stmt {
        Stmt::Send { msg: *self, args }
    }

    /// Every supported linear message for an access of `mem_type` elements,
    /// block messages first, then by access size (largest first), ties going
    /// to the smaller unit.
    pub fn get_all(
        hw: &HwConfig,
        op: SendOp,
        address: AddressSpace,
        mem_type: DataType,
        zero_fill: bool,
        cache_hint: CacheHint,
    ) -> Vec<MessageDescriptor> {
        let slot_counts = (0..=MAX_SLOTS.trailing_zeros()).map(|p| 1u32 << p);
        let mut types = vec![DataType::Dword, DataType::Oword, DataType::Hword];
        if !mem_type.is_block_unit() {
            types.push(mem_type);
        }

        let mut all = Vec::new();
        for &ty in &types {
            for slots in slot_counts.clone() {
                let msg =
                    Self::make_linear_default(*hw, op, address, ty, slots, zero_fill, cache_hint);
                if msg.is_supported() {
                    all.push(msg);
                }
            }
        }
        all.sort_by(|a, b| {
            b.is_block()
                .cmp(&a.is_block())
                .then(b.access_size().cmp(&a.access_size()))
                .then(a.elem_type.size().cmp(&b.elem_type.size()))
        });
        all
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.elem_type == other.elem_type
            && self.zero_fill == other.zero_fill
            && self.cache_hint == other.cache_hint
            && self.shape == other.shape
    }
}

impl Eq for MessageDescriptor {}

impl Hash for MessageDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.elem_type.hash(state);
        self.zero_fill.hash(state);
        self.cache_hint.hash(state);
        self.shape.hash(state);
    }
}

impl fmt::Display for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.op, self.elem_type)?;
        if self.is_scattered() {
            write!(f, "x{}", self.slots())?;
        }
        if let Some(g) = self.geometry() {
            write!(f, ".{g}")?;
        }
        if !self.zero_fill {
            write!(f, ".nofill")?;
        }
        if self.cache_hint != CacheHint::Undef {
            write!(f, ".{}", self.cache_hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hw::HwGen;

    fn xehpc() -> HwConfig {
        HwConfig::new(HwGen::XeHpc)
    }

    fn gen9() -> HwConfig {
        HwConfig::new(HwGen::Gen9)
    }

    fn geometry(width: u32, height: u32, count: u32) -> TileGeometry {
        TileGeometry {
            surface_width: 256,
            surface_height: 64,
            surface_pitch: 256,
            width,
            height,
            count,
            vnni: false,
            transpose: false,
        }
    }

    #[test]
    fn test_fine_grained_block_masking() {
        let msg = MessageDescriptor::make_linear(
            xehpc(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::Dword,
            16,
            DEFAULT_SLOT_MASK,
            true,
            true,
            CacheHint::Undef,
        );
        assert!(msg.is_block());
        assert_eq!(msg.kind(), SendKind::Block);
        assert_eq!(msg.mask_size(), 4);
        assert_eq!(msg.mask_count(), 16);
        assert_eq!(msg.payload_type_stride(), 4);
        assert_eq!(msg.payload_size(), 64);
        assert!(msg.is_supported());
    }

    #[test]
    fn test_tile_sizes() {
        let msg = MessageDescriptor::make_tile(
            xehpc(),
            SendOp::LoadTile,
            DataType::F32,
            geometry(8, 4, 2),
            true,
            CacheHint::Undef,
        );
        assert!(msg.is_tile());
        assert!(!msg.is_block() && !msg.is_scattered());
        assert_eq!(msg.access_size(), 256);
        assert_eq!(msg.payload_size(), 256);
        assert_eq!(msg.header_size(), 64);
        assert_eq!(msg.mask_count(), 1);
        assert_eq!(msg.mask_size(), 256);
        assert_eq!(msg.alignment(), 128);
        assert!(msg.is_supported());
    }

    #[test]
    fn test_tile_payload_rounds_width() {
        let msg = MessageDescriptor::make_tile(
            xehpc(),
            SendOp::LoadTile,
            DataType::F16,
            geometry(10, 8, 1),
            true,
            CacheHint::Undef,
        );
        // Width 10 rounds to 16 columns: 2 * 16 * 8 = 256 bytes.
        assert_eq!(msg.payload_size(), 256);
        assert_eq!(msg.access_size(), 160);
    }

    #[test]
    #[should_panic(expected = "empty geometry")]
    fn test_empty_tile_rejected() {
        MessageDescriptor::make_tile(
            xehpc(),
            SendOp::LoadTile,
            DataType::F32,
            TileGeometry::default(),
            true,
            CacheHint::Undef,
        );
    }

    #[test]
    #[should_panic(expected = "cannot repack")]
    fn test_store_tile_rejects_vnni() {
        let mut g = geometry(16, 8, 1);
        g.vnni = true;
        MessageDescriptor::make_tile(
            xehpc(),
            SendOp::StoreTile,
            DataType::BF16,
            g,
            true,
            CacheHint::Undef,
        );
    }

    #[test]
    #[should_panic(expected = "linear operation")]
    fn test_linear_rejects_tile_op() {
        MessageDescriptor::make_linear_default(
            xehpc(),
            SendOp::LoadTile,
            AddressSpace::A64,
            DataType::F32,
            16,
            true,
            CacheHint::Undef,
        );
    }

    #[test]
    fn test_default_slot_mask() {
        let make = |slots, mask| {
            MessageDescriptor::make_linear(
                xehpc(),
                SendOp::Load,
                AddressSpace::A64,
                DataType::F32,
                slots,
                mask,
                true,
                true,
                CacheHint::Undef,
            )
        };
        assert!(make(4, 0xF).has_default_slot_mask());
        assert!(!make(4, 0x7).has_default_slot_mask());
        assert!(make(32, 0xFFFF_FFFF).has_default_slot_mask());
        assert!(!make(32, 0x7FFF_FFFF).has_default_slot_mask());
        assert!(make(8, 0x1FF).has_default_slot_mask());
    }

    #[test]
    fn test_mask_cap_before_xehpc() {
        let msg = MessageDescriptor::make_linear_default(
            gen9(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::Hword,
            8,
            true,
            CacheHint::Undef,
        );
        assert!(!msg.is_fine_grained());
        assert_eq!(msg.mask_size(), 4);
        assert_eq!(msg.mask_count(), 16);
        assert!(msg.is_supported());

        let hpc = MessageDescriptor::make_linear_default(
            xehpc(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::Hword,
            8,
            true,
            CacheHint::Undef,
        );
        assert_eq!(hpc.mask_count(), 8);
    }

    #[test]
    #[should_panic(expected = "multiple of 16")]
    fn test_mask_cap_contract() {
        let msg = MessageDescriptor::make_linear_default(
            gen9(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::Hword,
            5,
            true,
            CacheHint::Undef,
        );
        assert!(!msg.is_supported());
        msg.mask_count();
    }

    #[test]
    fn test_header_and_address() {
        let a64 = MessageDescriptor::make_linear_default(
            gen9(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::F32,
            16,
            true,
            CacheHint::Undef,
        );
        assert_eq!(a64.address_size(), 8);
        assert_eq!(a64.header_size(), 128);
        assert_eq!(a64.address_type(false), DataType::U64);

        let slm = MessageDescriptor::make_linear_default(
            gen9(),
            SendOp::Store,
            AddressSpace::Slm,
            DataType::U16,
            8,
            true,
            CacheHint::Undef,
        );
        assert_eq!(slm.header_size(), 32);
        assert_eq!(slm.address_type(true), DataType::S32);
        assert_eq!(slm.payload_type_stride(), 4);
        assert_eq!(slm.payload_size(), 32);
    }

    #[test]
    fn test_support_rules() {
        let linear = |hw, op, address, ty, slots| {
            MessageDescriptor::make_linear_default(
                hw,
                op,
                address,
                ty,
                slots,
                true,
                CacheHint::Undef,
            )
        };
        let a64 = AddressSpace::A64;
        let slm = AddressSpace::Slm;
        assert!(!linear(gen9(), SendOp::Load, a64, DataType::Dword, 16).is_supported());
        assert!(!linear(gen9(), SendOp::Store, a64, DataType::Hword, 4).is_supported());
        assert!(linear(xehpc(), SendOp::Store, a64, DataType::Hword, 4).is_supported());
        assert!(!linear(gen9(), SendOp::Load, slm, DataType::Hword, 1).is_supported());
        assert!(linear(gen9(), SendOp::Load, slm, DataType::Oword, 16).is_supported());
        assert!(!linear(gen9(), SendOp::Load, a64, DataType::Oword, 16).is_supported());
        assert!(!linear(gen9(), SendOp::Load, a64, DataType::F32, 32).is_supported());
        assert!(linear(xehpc(), SendOp::Load, a64, DataType::F32, 32).is_supported());
        assert!(!linear(gen9(), SendOp::AtomicAdd, a64, DataType::U16, 8).is_supported());
        assert!(!linear(xehpc(), SendOp::AtomicFadd, a64, DataType::S32, 8).is_supported());
        assert!(!linear(xehpc(), SendOp::AtomicAdd, a64, DataType::Dword, 8).is_supported());
        assert!(!linear(gen9(), SendOp::Prefetch, a64, DataType::F32, 8).is_supported());
        assert!(linear(gen9(), SendOp::Prefetch, a64, DataType::Hword, 2).is_supported());

        let hinted = MessageDescriptor::make_linear_default(
            gen9(),
            SendOp::Load,
            a64,
            DataType::F32,
            8,
            true,
            CacheHint::LoadOnce,
        );
        assert!(!hinted.is_supported());
    }

    #[test]
    fn test_get_all_order() {
        let all = MessageDescriptor::get_all(
            &xehpc(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::F32,
            true,
            CacheHint::Undef,
        );
        assert!(all.iter().all(MessageDescriptor::is_supported));
        assert_eq!(all[0].elem_type(), DataType::Hword);
        assert_eq!(all[0].slots(), 8);
        // 128-byte block messages: the dword variant comes first.
        assert_eq!(all[1].elem_type(), DataType::Dword);
        assert_eq!(all[1].slots(), 32);

        let first_scattered = all.iter().position(|m| m.is_scattered()).unwrap();
        assert!(all[..first_scattered].iter().all(MessageDescriptor::is_block));
        assert!(all[first_scattered..].iter().all(MessageDescriptor::is_scattered));
        for pair in all[first_scattered..].windows(2) {
            assert!(pair[0].access_size() >= pair[1].access_size());
        }
    }

    #[test]
    fn test_display() {
        let hw = xehpc();
        let scattered = MessageDescriptor::make_linear_default(
            hw,
            SendOp::Load,
            AddressSpace::A64,
            DataType::F32,
            16,
            true,
            CacheHint::Undef,
        );
        assert_eq!(scattered.to_string(), "load.f32x16");

        let block = MessageDescriptor::make_linear_default(
            hw,
            SendOp::Store,
            AddressSpace::Slm,
            DataType::Oword,
            4,
            false,
            CacheHint::Undef,
        );
        assert_eq!(block.to_string(), "store.oword.nofill");

        let mut g = geometry(16, 32, 1);
        g.vnni = true;
        let tile = MessageDescriptor::make_tile(
            hw,
            SendOp::LoadTile,
            DataType::BF16,
            g,
            true,
            CacheHint::LoadOnce,
        );
        assert_eq!(tile.to_string(), "load_2d.bf16.1x32x16.v.cache:load_once");
    }

    #[test]
    fn test_equality_ignores_hw() {
        let a = MessageDescriptor::make_linear(
            gen9(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::F32,
            8,
            DEFAULT_SLOT_MASK,
            true,
            true,
            CacheHint::Undef,
        );
        let b = MessageDescriptor::make_linear(
            xehpc(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::F32,
            8,
            DEFAULT_SLOT_MASK,
            true,
            true,
            CacheHint::Undef,
        );
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_offset_store() {
        let msg = MessageDescriptor::make_linear_default(
            xehpc(),
            SendOp::Load,
            AddressSpace::A64,
            DataType::Hword,
            2,
            true,
            CacheHint::Undef,
        );
        let hdr = Expr::var("hdr", DataType::U64);
        let mem = Expr::var("A", DataType::U64);
        let stmt = msg.create_offset_store(&hdr, &mem, Expr::int(256), false);
        assert_eq!(stmt.to_string(), "store.u64(hdr[0], (cast<u64>(A) + 256))\n");

        let slm = MessageDescriptor::make_linear_default(
            xehpc(),
            SendOp::Load,
            AddressSpace::Slm,
            DataType::Oword,
            2,
            true,
            CacheHint::Undef,
        );
        let off = Expr::var("off", DataType::S32);
        let stmt = slm.create_offset_store(&hdr, &mem, off, false);
        assert_eq!(stmt.to_string(), "store.u32(hdr[0], cast<u32>(off))\n");
    }

    #[test]
    fn test_op_conversions() {
        assert_eq!(SendOp::Load.to_tile(), SendOp::LoadTile);
        assert_eq!(SendOp::PrefetchTile.to_linear(), SendOp::Prefetch);
        assert_eq!(SendOp::AtomicAdd.to_tile(), SendOp::AtomicAdd);
        assert_eq!("store_2d".parse::<SendOp>(), Ok(SendOp::StoreTile));
        assert_eq!("cache:load_once".parse::<CacheHint>(), Ok(CacheHint::LoadOnce));
        assert_eq!(SendKind::Tile.to_string(), "2d");
        assert!("l3".parse::<AddressSpace>().is_err());
    }
}
