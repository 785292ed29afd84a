// This module implements AccessBuilder, which turns one access site (a memory view, the buffer
// handles and the resolved SendParams) into an AccessPlan: the ordered statement sequence of
// header stores and send calls, the register layout of the moved data and the register buffer
// size. The search has a fixed preference order. A 2D covering is attempted first when the
// parameters allow it: the view's two innermost dimensions become the surface, the tile shape
// is rounded by the fix-up rules, the header is fully initialised once and only x/y change
// between messages. If that fails and legacy fallback is allowed, the view is covered with
// linear messages instead: for each candidate register layout (dense, then for sub-dword types
// dword-strided with and without granule-padded rows, then granule-padded rows) the memory and
// layout walkers advance together, taking
// the largest supported block message the next elements allow and finishing tails with a
// scattered message whose slot mask drops missing and out-of-bounds elements. A plan is only
// returned when the whole view is covered; otherwise the caller gets an AccessError.

//! Access builder: covers a memory view with send messages.

use std::fmt;

use log::{debug, trace};

use super::fixup::{self, fixup_tile_params, TileParams, TILE_BASE_ALIGN};
use super::message::{
    AddressSpace, CacheHint, MessageDescriptor, SendOp, HEADER_2D_OFF_BASE,
    HEADER_2D_OFF_SURFACE_HEIGHT, HEADER_2D_OFF_SURFACE_PITCH, HEADER_2D_OFF_SURFACE_WIDTH,
    HEADER_2D_OFF_WHC, HEADER_2D_OFF_X, HEADER_2D_OFF_Y,
};
use super::params::{resolve_send_params, tile_request, SendParams, TileHint};
use super::walker::{LayoutWalker, MemoryWalker};
use crate::core::error::{AccessError, AccessResult};
use crate::core::hw::HwConfig;
use crate::ir::{DataType, Expr, SendArgs, Stmt};
use crate::tensor::{LayoutBlock, MemoryView, RegisterLayout};

/// Buffers the emitted statements refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHandles {
    /// Global pointer or SLM base.
    pub mem: Expr,
    /// Register buffer holding the data.
    pub reg: Expr,
    /// Register buffer holding message headers.
    pub header: Expr,
}

impl BufferHandles {
    pub fn new(mem: Expr, reg: Expr, header: Expr) -> Self {
        Self { mem, reg, header }
    }
}

/// View elements moved by one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Footprint {
    /// `count` consecutive elements in view order starting at index `first`.
    Range { first: u64, count: u64 },
    /// `height x width` block of the two innermost dimensions at `outer`.
    Tile {
        outer: Vec<u64>,
        x: u64,
        y: u64,
        width: u64,
        height: u64,
    },
}

impl Footprint {
    /// Linear view indices covered, in message order.
    pub fn elements(&self, view: &MemoryView) -> Vec<u64> {
        match self {
            Footprint::Range { first, count } => (*first..first + count).collect(),
            Footprint::Tile {
                outer,
                x,
                y,
                width,
                height,
            } => {
                let mut out = Vec::with_capacity((width * height) as usize);
                let mut coord = outer.clone();
                coord.extend([0, 0]);
                let n = coord.len();
                for r in 0..*height {
                    for c in 0..*width {
                        coord[n - 2] = y + r;
                        coord[n - 1] = x + c;
                        out.push(view.index_of(&coord));
                    }
                }
                out
            }
        }
    }
}

/// One emitted message and where its data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSend {
    pub msg: MessageDescriptor,
    /// Byte offset of the payload in the register buffer.
    pub reg_offset: u64,
    pub footprint: Footprint,
}

/// Result of covering one access site.
#[derive(Debug, Clone)]
pub struct AccessPlan {
    pub view: MemoryView,
    pub stmt: Stmt,
    pub reg_layout: RegisterLayout,
    /// Register buffer bytes, granule-aligned; 0 for prefetches.
    pub reg_buf_size: u32,
    pub header_buf_size: u32,
    pub messages: Vec<PlannedSend>,
    /// A 2D attempt failed and linear messages were used instead.
    pub used_fallback: bool,
    reg_buf: Option<Expr>,
    grf_size: u32,
}

impl AccessPlan {
    pub fn is_tile(&self) -> bool {
        self.messages.first().is_some_and(|s| s.msg.is_tile())
    }

    pub fn reg_buf(&self) -> Option<&Expr> {
        self.reg_buf.as_ref()
    }

    /// Register buffer size in registers.
    pub fn reg_buf_regs(&self) -> u32 {
        self.reg_buf_size / self.grf_size
    }
}

impl fmt::Display for AccessPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory view:          {}", self.view)?;
        writeln!(f, "Register layout:      {}", self.reg_layout)?;
        match &self.reg_buf {
            Some(reg) => writeln!(f, "Register buffer:      {reg}")?,
            None => writeln!(f, "Register buffer:      -")?,
        }
        writeln!(
            f,
            "Register buffer size: {} ({} regs)",
            self.reg_buf_size,
            self.reg_buf_regs()
        )?;
        writeln!(f, "Statement:")?;
        write!(f, "{}", self.stmt)
    }
}

/// Builds the message sequence for one access site.
///
/// Consumed by [`build`](Self::build); use one builder per site.
pub struct AccessBuilder {
    view: MemoryView,
    buffers: BufferHandles,
    params: SendParams,
    zero_fill: bool,
}

impl AccessBuilder {
    pub fn new(
        view: &MemoryView,
        buffers: BufferHandles,
        params: SendParams,
        zero_fill: bool,
    ) -> Self {
        Self {
            view: view.clone(),
            buffers,
            params,
            zero_fill,
        }
    }

    fn grf_size(&self) -> u32 {
        self.params.hw.grf_size
    }

    pub fn build(self) -> AccessResult<AccessPlan> {
        if self.view.nelems() == 0 {
            return Err(AccessError::EmptyView);
        }
        self.check_operation()?;

        let mut used_fallback = false;
        if self.params.send_op.is_tile() && self.params.allow_tile {
            match self.try_build_tile() {
                Ok(plan) => return Ok(plan),
                Err(err) if self.params.allow_legacy => {
                    debug!("{err}; falling back to linear messages");
                    used_fallback = true;
                }
                Err(err) => return Err(err),
            }
        }

        let op = self.params.send_op.to_linear();
        for layout in self.candidate_layouts() {
            if let Some(mut plan) = self.try_build_linear(op, layout) {
                plan.used_fallback = used_fallback;
                return Ok(plan);
            }
        }
        Err(AccessError::NoCovering {
            view: self.view.to_string(),
            reason: format!(
                "no register layout admits a legal sequence of {} {} messages",
                op,
                self.params.address
            ),
        })
    }

    fn check_operation(&self) -> AccessResult<()> {
        let op = self.params.send_op;
        let address = self.params.address;
        let invalid = op == SendOp::Undef
            || (address == AddressSpace::Slm && (op.is_tile() || op.is_prefetch()));
        if invalid {
            return Err(AccessError::InvalidOperation {
                op: op.name(),
                address: address.name(),
            });
        }
        Ok(())
    }

    fn reg_arg(&self, op: SendOp, reg_off: u64) -> Option<Expr> {
        if op.is_prefetch() {
            None
        } else {
            Some(self.buffers.reg.clone() + reg_off)
        }
    }

    // 2D path

    fn try_build_tile(&self) -> AccessResult<AccessPlan> {
        let view = &self.view;
        let hw = &self.params.hw;
        let op = self.params.send_op;
        if !hw.has_tile_transfer {
            return Err(AccessError::tile(format!("{} has no 2D messages", hw.gen)));
        }
        if view.ndims() < 2 || !view.is_innermost_contiguous() {
            return Err(AccessError::tile("innermost dimension is not contiguous"));
        }

        let req = tile_request(view, op, &self.params.tile_hint);
        let params = fixup_tile_params(hw, &req)
            .ok_or_else(|| AccessError::tile(format!("no legal 2D block for {view}")))?;
        let msg = MessageDescriptor::make_tile(
            *hw,
            op,
            view.elem_type(),
            params.geometry(),
            self.zero_fill,
            self.params.cache_hint,
        );
        if !msg.is_supported() {
            return Err(AccessError::tile(format!("{msg} is not supported")));
        }

        let nd = view.ndims();
        let esize = view.elem_size() as i64;
        let factor = params.vnni_permute_factor as u64;
        let payload = msg.payload_size() as u64;
        let outer_view = &view.dims()[..nd - 2];
        let outer_count: u64 = outer_view.iter().map(|d| d.extent).product();

        let mut stmts = Vec::new();
        let mut messages = Vec::new();
        let mut reg_off = 0;
        for o in 0..outer_count {
            let mut outer = vec![0; nd - 2];
            let mut rem = o;
            for (c, d) in outer.iter_mut().zip(outer_view).rev() {
                *c = rem % d.extent;
                rem /= d.extent;
            }
            let mut origin = outer.clone();
            origin.extend([0, 0]);
            let outer_off = view.elem_offset(&origin);
            if view.alignment_at(outer_off) < TILE_BASE_ALIGN {
                return Err(AccessError::tile(format!(
                    "surface base is not {TILE_BASE_ALIGN}-byte aligned"
                )));
            }
            let guard = self.tile_guard(&outer);

            let base = self.buffers.mem.clone().cast(DataType::U64)
                + (view.base().clone() + outer_off) * esize;
            stmts.push(self.header_store(HEADER_2D_OFF_BASE, DataType::U64, base));
            if o == 0 {
                stmts.push(self.surface_header(&params));
            }

            for ty in 0..params.tiles_y() {
                for tx in 0..params.tiles_x() {
                    let x = tx * (params.width * params.count) as u64;
                    let y = ty * params.height as u64;
                    stmts.push(self.header_store(HEADER_2D_OFF_X, DataType::S32, Expr::from(x)));
                    stmts.push(self.header_store(HEADER_2D_OFF_Y, DataType::S32, Expr::from(y)));
                    stmts.push(msg.call(SendArgs {
                        mem_buf: self.buffers.mem.clone(),
                        header: self.buffers.header.clone(),
                        reg_buf: self.reg_arg(op, reg_off),
                        mask: guard.clone(),
                        x: Some(Expr::from(x)),
                        y: Some(Expr::from(y)),
                    }));
                    trace!("{msg} at x={x} y={y} -> register offset {reg_off}");

                    let footprint = if factor > 1 {
                        Footprint::Tile {
                            outer: outer.clone(),
                            x: 0,
                            y: y * factor,
                            width: params.view_width / factor,
                            height: params.height as u64 * factor,
                        }
                    } else {
                        Footprint::Tile {
                            outer: outer.clone(),
                            x,
                            y,
                            width: (params.width * params.count) as u64,
                            height: params.height as u64,
                        }
                    };
                    messages.push(PlannedSend {
                        msg,
                        reg_offset: reg_off,
                        footprint,
                    });
                    reg_off += payload;
                }
            }
        }

        let esize = view.elem_size();
        let block_elems = fixup::block_payload_size(
            esize,
            params.width,
            params.height,
            params.transpose,
            self.grf_size(),
        ) as u64
            / esize as u64;
        let reg_layout = tile_layout(view, &params, block_elems, payload / esize as u64);
        debug!(
            "Covered {view} with {} {msg} messages",
            messages.len()
        );

        let reg_buf = self.reg_arg(op, 0);
        Ok(AccessPlan {
            view: view.clone(),
            stmt: Stmt::seq(stmts),
            reg_layout,
            reg_buf_size: if reg_buf.is_some() { reg_off as u32 } else { 0 },
            header_buf_size: msg.header_size(),
            messages,
            used_fallback: false,
            reg_buf,
            grf_size: self.grf_size(),
        })
    }

    fn header_store(&self, offset: u32, ty: DataType, value: Expr) -> Stmt {
        Stmt::store(self.buffers.header.clone(), offset, ty, value)
    }

    /// Surface and block fields; the hardware expects each size minus one.
    fn surface_header(&self, p: &TileParams) -> Stmt {
        let whc = (p.width - 1) | ((p.height - 1) << 8) | ((p.count - 1) << 16);
        let field = |off, value: u32| self.header_store(off, DataType::U32, Expr::from(value));
        Stmt::seq([
            field(HEADER_2D_OFF_SURFACE_WIDTH, p.surface_width - 1),
            field(HEADER_2D_OFF_SURFACE_HEIGHT, p.surface_height - 1),
            field(HEADER_2D_OFF_SURFACE_PITCH, p.surface_pitch - 1),
            field(HEADER_2D_OFF_WHC, whc),
        ])
    }

    /// Predicate disabling tiles whose outer coordinates are out of bounds.
    fn tile_guard(&self, outer: &[u64]) -> Option<Expr> {
        let cond = outer
            .iter()
            .zip(self.view.dims())
            .filter_map(|(&c, d)| d.bound.map(|b| Expr::from(c).lt(b)))
            .fold(Expr::bool(true), Expr::and);
        match cond.as_bool() {
            Some(true) => None,
            _ => Some(cond),
        }
    }

    // Linear path

    fn candidate_layouts(&self) -> Vec<RegisterLayout> {
        let view = &self.view;
        let esize = view.elem_size();
        let grf = self.grf_size();
        let mut layouts = vec![RegisterLayout::dense(view)];
        if esize < 4 && !self.params.prefer_dense {
            // Scattered sub-dword payloads take one dword per element.
            let dword_stride = (4 / esize) as u64;
            layouts.push(RegisterLayout::strided(view, dword_stride));
            layouts.push(RegisterLayout::padded_rows(view, dword_stride, grf));
        }
        layouts.push(RegisterLayout::padded_rows(view, 1, grf));
        let mut unique: Vec<RegisterLayout> = Vec::with_capacity(layouts.len());
        for layout in layouts {
            if !unique.contains(&layout) {
                unique.push(layout);
            }
        }
        unique
    }

    fn try_build_linear(&self, op: SendOp, layout: RegisterLayout) -> Option<AccessPlan> {
        let hw = &self.params.hw;
        let candidates = MessageDescriptor::get_all(
            hw,
            op,
            self.params.address,
            self.view.elem_type(),
            self.zero_fill,
            self.params.cache_hint,
        );
        if candidates.is_empty() {
            debug!("No {op} messages for {} on {}", self.view.elem_type(), hw.gen);
            return None;
        }

        let mut mem = MemoryWalker::new(&self.view);
        let mut reg = LayoutWalker::new(&layout, &self.view);
        let mut stmts = Vec::new();
        let mut messages = Vec::new();
        while !mem.is_done() {
            let Some((msg, count)) = candidates.iter().find_map(|c| self.fit(c, &mem, &reg)) else {
                debug!(
                    "Layout {layout} rejected at element {} of {}",
                    mem.position(),
                    self.view
                );
                return None;
            };
            let reg_off = reg.offset_bytes();
            stmts.push(self.linear_send(&msg, &mem, count, reg_off));
            trace!(
                "{msg} covers elements {}..{} -> register offset {reg_off}",
                mem.position(),
                mem.position() + count
            );
            messages.push(PlannedSend {
                msg,
                reg_offset: reg_off,
                footprint: Footprint::Range {
                    first: mem.position(),
                    count,
                },
            });
            mem.advance(count);
            reg.advance(count);
        }

        let grf = self.grf_size() as u64;
        let reg_buf = self.reg_arg(op, 0);
        let reg_buf_size = if reg_buf.is_some() {
            messages
                .iter()
                .map(|s| s.reg_offset + s.msg.payload_size() as u64)
                .max()
                .unwrap_or(0)
                .max(layout.size_bytes())
                .next_multiple_of(grf)
        } else {
            0
        };
        let header_buf_size = messages.iter().map(|s| s.msg.header_size()).max().unwrap_or(0);
        debug!(
            "Covered {} with {} messages, layout {layout}",
            self.view,
            messages.len()
        );
        Some(AccessPlan {
            view: self.view.clone(),
            stmt: Stmt::seq(stmts),
            reg_layout: layout,
            reg_buf_size: reg_buf_size as u32,
            header_buf_size,
            messages,
            used_fallback: false,
            reg_buf,
            grf_size: self.grf_size(),
        })
    }

    /// Elements `candidate` can move from the cursor, with the slot mask
    /// adjusted for tails and out-of-bounds elements.
    fn fit(
        &self,
        candidate: &MessageDescriptor,
        mem: &MemoryWalker<'_>,
        reg: &LayoutWalker<'_>,
    ) -> Option<(MessageDescriptor, u64)> {
        let check_reg = !candidate.op().is_prefetch();
        if check_reg && !reg.is_aligned(self.grf_size()) {
            return None;
        }
        let esize = self.view.elem_size() as u64;

        if candidate.is_block() {
            let bytes = candidate.access_size() as u64;
            if bytes % esize != 0 {
                return None;
            }
            let count = bytes / esize;
            if !mem.is_run(count) || !mem.is_aligned(candidate.alignment()) {
                return None;
            }
            if check_reg
                && !(reg.can_access(count, esize as u32)
                    && payload_fits(mem, reg, count, candidate.payload_size()))
            {
                return None;
            }
            return Some((*candidate, count));
        }

        let slots = candidate.slots() as u64;
        let limit = slots.min(mem.row_remaining());
        let count = if check_reg {
            reg.max_extent(candidate.payload_type_stride(), limit)
        } else {
            limit
        };
        // Tails go to the smallest message that still holds them.
        if count == 0 || (count != slots && count.next_power_of_two() != slots) {
            return None;
        }
        if check_reg && !payload_fits(mem, reg, count, candidate.payload_size()) {
            return None;
        }
        let masked = candidate.with_slot_mask(mem.in_bounds_mask(count, candidate.slots()));
        let msg = if masked.has_default_slot_mask() {
            *candidate
        } else {
            masked
        };
        Some((msg, count))
    }

    fn linear_send(
        &self,
        msg: &MessageDescriptor,
        mem: &MemoryWalker<'_>,
        count: u64,
        reg_off: u64,
    ) -> Stmt {
        let view = &self.view;
        let esize = view.elem_size() as i64;
        let base = view.base().clone() * esize;
        let mem_off = if msg.is_block() {
            base + mem.elem_offset(0) * esize
        } else {
            let lanes = (0..msg.slots() as u64)
                .map(|i| {
                    if i < count {
                        Expr::int(mem.elem_offset(i) * esize)
                    } else {
                        Expr::int(0)
                    }
                })
                .collect();
            base + Expr::vector(lanes)
        };
        let signed = view.dims().iter().any(|d| d.stride < 0);
        let header =
            msg.create_offset_store(&self.buffers.header, &self.buffers.mem, mem_off, signed);
        header.append(msg.call(SendArgs {
            mem_buf: self.buffers.mem.clone(),
            header: self.buffers.header.clone(),
            reg_buf: self.reg_arg(msg.op(), reg_off),
            mask: None,
            x: None,
            y: None,
        }))
    }
}

/// A payload written at the cursor must end before the next element's slot.
fn payload_fits(
    mem: &MemoryWalker<'_>,
    reg: &LayoutWalker<'_>,
    count: u64,
    payload: u32,
) -> bool {
    count >= mem.remaining() || reg.offset_bytes_at(count) >= reg.offset_bytes() + payload as u64
}

/// Register layout produced by a 2D covering.
///
/// Messages are laid out one after another (x fastest, then y, then outer
/// dims); inside a message the blocks are `block_elems` apart.
fn tile_layout(
    view: &MemoryView,
    p: &TileParams,
    block_elems: u64,
    msg_elems: u64,
) -> RegisterLayout {
    let nd = view.ndims();
    let (wd, hd) = (nd - 1, nd - 2);
    let f = p.vnni_permute_factor as u64;
    let v = if p.vnni {
        fixup::vnni_rows(view.elem_size()) as u64
    } else {
        1
    };
    let (w, h, c) = (p.width as u64, p.height as u64, p.count as u64);
    let (wp, hp) = (w.next_power_of_two(), h.next_power_of_two());
    let (tx, ty) = (p.tiles_x(), p.tiles_y());

    let mut blocks = Vec::new();
    if f > 1 {
        // Row r of the view lands in surface row r / f at column
        // (r % f) * row_len.
        let row_len = w / f;
        blocks.push(LayoutBlock::new(wd, row_len, v));
        blocks.push(LayoutBlock::new(hd, f, row_len * v));
        blocks.push(LayoutBlock::new(hd, v, 1));
        blocks.push(LayoutBlock::new(hd, h / v, wp * v));
    } else if p.transpose {
        blocks.push(LayoutBlock::new(wd, w, hp));
        blocks.push(LayoutBlock::new(hd, h, 1));
    } else {
        blocks.push(LayoutBlock::new(wd, w, v));
        blocks.push(LayoutBlock::new(hd, v, 1));
        blocks.push(LayoutBlock::new(hd, h / v, wp * v));
    }
    blocks.push(LayoutBlock::new(wd, c, block_elems));
    blocks.push(LayoutBlock::new(wd, tx, msg_elems));
    blocks.push(LayoutBlock::new(hd, ty, msg_elems * tx));
    let mut stride = msg_elems * tx * ty;
    for d in (0..hd).rev() {
        let extent = view.dims()[d].extent;
        blocks.push(LayoutBlock::new(d, extent, stride));
        stride *= extent;
    }
    blocks.retain(|b| b.size > 1);
    RegisterLayout::new(view.elem_type(), nd, blocks)
}

/// Builder with parameters resolved for `view`, without a 2D hint.
pub fn make_access_builder(
    view: &MemoryView,
    buffers: BufferHandles,
    hw: &HwConfig,
    op: SendOp,
    address: AddressSpace,
    cache_hint: CacheHint,
) -> AccessBuilder {
    let hint = TileHint::new(view.elem_type());
    let params = resolve_send_params(hw, op, address, view, cache_hint, hint);
    AccessBuilder::new(view, buffers, params, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hw::HwGen;
    use crate::send::params::OperandRole;
    use std::collections::BTreeSet;

    fn buffers() -> BufferHandles {
        BufferHandles::new(
            Expr::var("A", DataType::U64),
            Expr::var("reg", DataType::U32),
            Expr::var("hdr", DataType::U32),
        )
    }

    fn assert_exact_cover(plan: &AccessPlan) {
        let mut seen = BTreeSet::new();
        for send in &plan.messages {
            for idx in send.footprint.elements(&plan.view) {
                assert!(seen.insert(idx), "element {idx} covered twice");
            }
        }
        assert_eq!(seen.len() as u64, plan.view.nelems());
    }

    fn build(
        view: &MemoryView,
        hw: &HwConfig,
        op: SendOp,
        address: AddressSpace,
    ) -> AccessResult<AccessPlan> {
        make_access_builder(view, buffers(), hw, op, address, CacheHint::Undef).build()
    }

    fn load_params(hw: &HwConfig, view: &MemoryView, hint: TileHint) -> SendParams {
        resolve_send_params(hw, SendOp::Load, AddressSpace::A64, view, CacheHint::Undef, hint)
    }

    #[test]
    fn test_candidate_layouts() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let candidates = |view: &MemoryView| {
            let op = SendOp::Load;
            make_access_builder(view, buffers(), &hw, op, AddressSpace::A64, CacheHint::Undef)
                .candidate_layouts()
        };

        let bytes = MemoryView::new(DataType::U8, &[(4, 3), (3, 1)]);
        assert_eq!(
            candidates(&bytes),
            [
                RegisterLayout::dense(&bytes),
                RegisterLayout::strided(&bytes, 4),
                RegisterLayout::padded_rows(&bytes, 4, 64),
                RegisterLayout::padded_rows(&bytes, 1, 64),
            ]
        );

        let rows = MemoryView::new(DataType::F32, &[(3, 100), (100, 1)]);
        assert_eq!(
            candidates(&rows),
            [RegisterLayout::dense(&rows), RegisterLayout::padded_rows(&rows, 1, 64)]
        );

        let vector = MemoryView::new(DataType::F32, &[(64, 1)]);
        assert_eq!(candidates(&vector), [RegisterLayout::dense(&vector)]);
    }

    #[test]
    fn test_rows_covered_separately() {
        let view = MemoryView::new(DataType::F32, &[(3, 100), (100, 1)]);
        for gen in [HwGen::Gen9, HwGen::XeHpc] {
            let hw = HwConfig::new(gen);
            let plan = build(&view, &hw, SendOp::Load, AddressSpace::A64).unwrap();
            assert!(!plan.is_tile());
            assert_exact_cover(&plan);
            for send in &plan.messages {
                let Footprint::Range { first, count } = send.footprint else {
                    panic!("linear plan with a tile footprint");
                };
                assert_eq!(first / 100, (first + count - 1) / 100);
                assert_eq!(send.reg_offset % hw.grf_size as u64, 0);
            }
            assert_eq!(plan.reg_buf_size % hw.grf_size, 0);
        }
    }

    #[test]
    fn test_tail_uses_slot_mask() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::F32, &[(300, 1)]);
        let plan = build(&view, &hw, SendOp::Load, AddressSpace::A64).unwrap();
        assert_exact_cover(&plan);
        let last = plan.messages.last().unwrap();
        assert!(last.msg.is_scattered());
        assert_eq!(last.msg.slots(), 16);
        assert_eq!(last.msg.slot_mask(), 0xFFF);
        assert_eq!(plan.reg_buf_size, 1216);
    }

    #[test]
    fn test_out_of_bounds_masked() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::F32, &[(2, 32), (32, 1)]).with_bound(1, 20);
        let plan = build(&view, &hw, SendOp::Store, AddressSpace::A64).unwrap();
        assert_exact_cover(&plan);
        for send in &plan.messages {
            let Footprint::Range { first, count } = send.footprint else {
                unreachable!()
            };
            for (lane, idx) in (first..first + count).enumerate() {
                let enabled = send.msg.slot_mask() & (1 << lane) != 0 || send.msg.is_block();
                assert_eq!(enabled, idx % 32 < 20, "element {idx}");
            }
        }
    }

    #[test]
    fn test_tile_plan() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::F32, &[(16, 64), (64, 1)]);
        let hint = TileHint::enabled(DataType::F32, 8, 8);
        let params = load_params(&hw, &view, hint);
        let plan = AccessBuilder::new(&view, buffers(), params, true).build().unwrap();

        assert!(plan.is_tile());
        assert_eq!(plan.messages.len(), 8);
        assert_eq!(plan.messages[0].msg.to_string(), "load_2d.f32.2x8x8");
        assert_eq!(plan.reg_buf_size, 8 * 512);
        assert_eq!(plan.header_buf_size, 64);
        assert_eq!(plan.reg_layout.offset_of(&[9, 21]), 653);
        assert_exact_cover(&plan);

        let items = plan.stmt.items();
        assert_eq!(items[0].to_string(), "store.u64(hdr[0], cast<u64>(A))\n");
        assert_eq!(items[1].to_string(), "store.u32(hdr[8], 255)\n");
        assert_eq!(items[4].to_string(), "store.u32(hdr[28], 67335)\n");
        // Later messages only update x and y.
        let stores_between = items
            .iter()
            .skip_while(|s| !matches!(s, Stmt::Send { .. }))
            .skip(1)
            .take_while(|s| !matches!(s, Stmt::Send { .. }))
            .count();
        assert_eq!(stores_between, 2);
    }

    #[test]
    fn test_vnni_permuted_layout() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::BF16, &[(64, 16), (16, 1)]);
        let hint = TileHint::for_dpas_operand(OperandRole::B, DataType::BF16);
        let params = load_params(&hw, &view, hint);
        let plan = AccessBuilder::new(&view, buffers(), params, true).build().unwrap();

        assert_eq!(plan.messages.len(), 2);
        assert_eq!(plan.messages[0].msg.to_string(), "load_2d.bf16.1x16x32.v");
        assert_eq!(plan.reg_layout.offset_of(&[5, 3]), 102);
        assert_eq!(plan.reg_layout.elems(), 1024);
        assert_exact_cover(&plan);
    }

    #[test]
    fn test_misaligned_tile_falls_back() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::F32, &[(16, 64), (64, 1)])
            .with_base(Expr::var("off", DataType::S64), 16);
        let hint = TileHint::enabled(DataType::F32, 8, 8);
        let mut params = load_params(&hw, &view, hint);

        let plan = AccessBuilder::new(&view, buffers(), params, true).build().unwrap();
        assert!(plan.used_fallback);
        assert!(!plan.is_tile());
        assert_exact_cover(&plan);

        params.allow_legacy = false;
        let err = AccessBuilder::new(&view, buffers(), params, true).build().unwrap_err();
        assert!(matches!(err, AccessError::TileRejected { .. }));
    }

    #[test]
    fn test_invalid_requests() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let empty = MemoryView::new(DataType::F32, &[(0, 1)]);
        let err = build(&empty, &hw, SendOp::Load, AddressSpace::A64).unwrap_err();
        assert_eq!(err, AccessError::EmptyView);

        let view = MemoryView::new(DataType::F32, &[(64, 1)]);
        let err = build(&view, &hw, SendOp::Prefetch, AddressSpace::Slm).unwrap_err();
        assert_eq!(
            err,
            AccessError::InvalidOperation {
                op: "prefetch",
                address: "slm"
            }
        );
    }

    #[test]
    fn test_prefetch_has_no_register_buffer() {
        let hw = HwConfig::new(HwGen::XeHpc);
        let view = MemoryView::new(DataType::F16, &[(128, 1)]);
        let plan = build(&view, &hw, SendOp::Prefetch, AddressSpace::A64).unwrap();
        assert_eq!(plan.reg_buf_size, 0);
        assert!(plan.reg_buf().is_none());
        assert!(plan.stmt.sends().iter().all(|(_, args)| args.reg_buf.is_none()));
    }
}
