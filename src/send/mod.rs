// This module holds everything between a memory view and the final send sequence. message
// defines the immutable message descriptor and its hardware-derived properties, cache maps
// cache hints to per-level cache settings, fixup rounds 2D requests to legal tile parameters,
// params resolves the transfer policy of an access site, walker provides the memory and
// register-layout cursors, and builder runs the covering search that produces an AccessPlan.

//! Send message planning.

pub mod builder;
pub mod cache;
pub mod fixup;
pub mod message;
pub mod params;
pub mod walker;

pub use builder::{
    make_access_builder, AccessBuilder, AccessPlan, BufferHandles, Footprint, PlannedSend,
};
pub use cache::{cache_settings, CachePolicy, CacheSettings};
pub use fixup::{fixup_tile_params, TileParams, TileRequest};
pub use message::{
    AddressSpace, CacheHint, MessageDescriptor, MessageShape, SendKind, SendOp, TileGeometry,
};
pub use params::{resolve_send_params, OperandRole, SendParams, TileHint};
