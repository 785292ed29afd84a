// This module groups the infrastructure shared by every part of the planner: the error types
// returned by access planning and name parsing, the hardware capability descriptor that all
// message rules consult, and the arena-based generation session that keeps plans and
// statistics for a whole kernel.

//! Core planner infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - `AccessError` for access sites that cannot be covered
//! - `ParseError` for unknown names in the constant name tables
//!
//! ## Hardware (`hw`)
//! - Generation ordering and per-generation defaults
//!
//! ## Session Management (`session`)
//! - Arena allocation of plans using `bumpalo`
//! - Planning statistics

pub mod error;
pub mod hw;
pub mod session;

pub use error::{AccessError, AccessResult, ParseError};
pub use hw::{HwConfig, HwGen};
pub use session::{GenerationSession, GenerationStats};
