// This module provides arena-based session management for access planning using the bumpalo
// crate. A kernel generator plans many access sites (the A/B/C operand loads, the stores of
// the result, SLM copies, prefetches) and keeps every plan around until code emission is done.
// GenerationSession owns a reference to the arena and allocates each AccessPlan in it, so
// plans share one lifetime and can be referenced freely by later stages. The session also
// interns message diagnostic strings in a hashbrown map and accumulates GenerationStats:
// access sites, tile and linear plans, fallbacks from tile to linear, failures, register
// bytes and the number of messages per message kind. The statistics have a Display report
// for the command-line front end and for debug logs.

//! Arena-based generation session.

use bumpalo::Bump;
use hashbrown::HashMap;
use log::debug;
use std::cell::RefCell;
use std::fmt;

use crate::core::error::AccessResult;
use crate::send::{AccessBuilder, AccessPlan, BufferHandles, SendParams};
use crate::tensor::MemoryView;

/// Planning session for one kernel.
///
/// Plans returned by [`build_access`](Self::build_access) live as long as
/// the arena.
pub struct GenerationSession<'arena> {
    /// Arena holding plans and interned strings.
    arena: &'arena Bump,

    stats: RefCell<GenerationStats>,

    /// Interned message names.
    interned_strings: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> GenerationSession<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(GenerationStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Plan one access site and keep the plan in the arena.
    pub fn build_access(
        &self,
        view: &MemoryView,
        buffers: BufferHandles,
        params: SendParams,
        zero_fill: bool,
    ) -> AccessResult<&'arena AccessPlan> {
        let result = AccessBuilder::new(view, buffers, params, zero_fill).build();
        let mut stats = self.stats.borrow_mut();
        stats.access_sites += 1;

        let plan = match result {
            Ok(plan) => plan,
            Err(err) => {
                debug!("Access to {view} failed: {err}");
                stats.failures += 1;
                return Err(err);
            }
        };

        if plan.is_tile() {
            stats.tile_plans += 1;
        } else {
            stats.linear_plans += 1;
        }
        if plan.used_fallback {
            stats.fallbacks += 1;
        }
        stats.register_bytes += plan.reg_buf_size as usize;
        for send in &plan.messages {
            let name = self.intern(&send.msg.to_string());
            *stats.message_counts.entry(name.to_string()).or_insert(0) += 1;
        }
        Ok(self.arena.alloc(plan))
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats.borrow().clone()
    }
}

/// Planning statistics of a session.
#[derive(Debug, Default, Clone)]
pub struct GenerationStats {
    /// Access sites planned, including failed ones.
    pub access_sites: usize,

    pub tile_plans: usize,

    pub linear_plans: usize,

    /// Linear plans built after a rejected 2D attempt.
    pub fallbacks: usize,

    pub failures: usize,

    /// Register buffer bytes over all plans.
    pub register_bytes: usize,

    /// Emitted messages per message name.
    pub message_counts: HashMap<String, usize>,
}

impl GenerationStats {
    pub fn total_messages(&self) -> usize {
        self.message_counts.values().sum()
    }
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation Session Statistics:")?;
        writeln!(f, "  Access sites: {}", self.access_sites)?;
        writeln!(f, "  Tile plans: {}", self.tile_plans)?;
        writeln!(f, "  Linear plans: {}", self.linear_plans)?;
        writeln!(f, "  Fallbacks: {}", self.fallbacks)?;
        writeln!(f, "  Failures: {}", self.failures)?;
        writeln!(f, "  Register bytes: {}", self.register_bytes)?;
        writeln!(f, "  Messages: {}", self.total_messages())?;

        if !self.message_counts.is_empty() {
            writeln!(f, "  Message breakdown:")?;
            let mut sorted: Vec<_> = self.message_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (name, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", name, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AccessError;
    use crate::core::hw::{HwConfig, HwGen};
    use crate::ir::{DataType, Expr};
    use crate::send::{resolve_send_params, AddressSpace, CacheHint, SendOp, TileHint};

    fn buffers() -> BufferHandles {
        BufferHandles::new(
            Expr::var("A", DataType::U64),
            Expr::var("reg", DataType::U32),
            Expr::var("hdr", DataType::U32),
        )
    }

    fn params(hw: &HwConfig, view: &MemoryView, op: SendOp, hint: TileHint) -> SendParams {
        resolve_send_params(hw, op, AddressSpace::A64, view, CacheHint::Undef, hint)
    }

    #[test]
    fn test_session_creation() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.access_sites, 0);
        assert_eq!(stats.total_messages(), 0);
    }

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        let s1 = session.intern("load.f32x16");
        let s2 = session.intern("load.f32x16");
        let s3 = session.intern("store.hword");

        assert_eq!(s1.as_ptr(), s2.as_ptr());
        assert_ne!(s1.as_ptr(), s3.as_ptr());
    }

    #[test]
    fn test_plans_are_recorded() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let hw = HwConfig::new(HwGen::XeHpc);

        let matrix = MemoryView::new(DataType::F32, &[(16, 64), (64, 1)]);
        let hint = TileHint::enabled(DataType::F32, 8, 8);
        let tile = session
            .build_access(&matrix, buffers(), params(&hw, &matrix, SendOp::Load, hint), true)
            .unwrap();
        assert!(tile.is_tile());

        let row = MemoryView::new(DataType::F32, &[(64, 1)]);
        let none = TileHint::new(DataType::F32);
        let linear = session
            .build_access(&row, buffers(), params(&hw, &row, SendOp::Store, none), true)
            .unwrap();
        assert!(!linear.is_tile());

        let empty = MemoryView::new(DataType::F32, &[(0, 1)]);
        let err = session
            .build_access(&empty, buffers(), params(&hw, &empty, SendOp::Load, none), true)
            .unwrap_err();
        assert_eq!(err, AccessError::EmptyView);

        let stats = session.stats();
        assert_eq!(stats.access_sites, 3);
        assert_eq!(stats.tile_plans, 1);
        assert_eq!(stats.linear_plans, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.message_counts["load_2d.f32.2x8x8"], 8);
        assert_eq!(
            stats.register_bytes,
            (tile.reg_buf_size + linear.reg_buf_size) as usize
        );
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let hw = HwConfig::new(HwGen::XeHpc);

        let row = MemoryView::new(DataType::F32, &[(64, 1)]);
        let none = TileHint::new(DataType::F32);
        session
            .build_access(&row, buffers(), params(&hw, &row, SendOp::Load, none), true)
            .unwrap();

        let output = format!("{}", session.stats());
        assert!(output.contains("Access sites: 1"));
        assert!(output.contains("Linear plans: 1"));
        assert!(output.contains("load.hword: 1"));
    }
}
