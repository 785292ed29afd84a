//! sendplan - memory message planning for Intel-style GPU kernels.
//!
//! Given a strided view of global or shared local memory, the planner picks
//! the hardware send messages (2D block, block or scattered) that move it to
//! or from registers, and produces the ordered sequence of header stores and
//! send calls together with the register layout of the data.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use sendplan::core::{GenerationSession, HwConfig, HwGen};
//! use sendplan::send::{
//!     resolve_send_params, AddressSpace, BufferHandles, CacheHint, SendOp, TileHint,
//! };
//!
//! let arena = Bump::new();
//! let session = GenerationSession::new(&arena);
//! let hw = HwConfig::new(HwGen::XeHpc);
//! let params =
//!     resolve_send_params(&hw, SendOp::Load, AddressSpace::A64, &view, CacheHint::Undef, hint);
//! let plan = session.build_access(&view, buffers, params, true)?;
//! println!("{plan}");
//! ```
//!
//! # Architecture
//!
//! - [`core`](crate::core) - Errors, hardware description, generation session
//! - [`ir`] - Expressions and statements emitted by plans
//! - [`tensor`] - Memory views and register layouts
//! - [`send`] - Message descriptors, fix-up rules and the access builder

pub mod core;
pub mod ir;
pub mod send;
pub mod tensor;

pub use crate::core::{
    AccessError, AccessResult, GenerationSession, GenerationStats, HwConfig, HwGen,
};
pub use ir::{DataType, Expr, Stmt};
pub use send::{
    make_access_builder, AccessBuilder, AccessPlan, AddressSpace, BufferHandles, CacheHint,
    MessageDescriptor, SendOp, SendParams, TileHint,
};
pub use tensor::{MemoryView, RegisterLayout};
