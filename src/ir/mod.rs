// This module groups the IR that access plans are emitted in: the scalar data types, the
// constant-folding expression language and the flat statement sequences of header stores and
// send calls.

//! Minimal expression and statement IR.
//!
//! Just enough of an IR to express header arithmetic, masks and the ordered
//! send sequence of an access plan. The kernel generator that embeds the
//! planner lowers these into its own IR.

pub mod expr;
pub mod stmt;
pub mod types;

pub use expr::{BinOp, Expr};
pub use stmt::{SendArgs, Stmt};
pub use types::DataType;
