// This module defines the statements an access plan is made of: stores of header fields and send
// calls with their buffer, mask and tile-origin operands. Sequences are kept flat; Stmt::seq
// splices nested sequences and empty statements out in one pass.

//! Statements produced by the access builder.
//!
//! A plan is a flat sequence of header-field stores and send calls. The
//! downstream emitter consumes the sequence in order; nothing here is
//! scheduled or register-allocated.

use std::fmt;

use super::expr::Expr;
use super::types::DataType;
use crate::send::message::MessageDescriptor;

/// Operands of a send call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SendArgs {
    /// Memory buffer (global pointer or SLM base).
    pub mem_buf: Expr,
    /// Header buffer holding the address payload.
    pub header: Expr,
    /// Register buffer receiving or providing the data; `None` for prefetches.
    pub reg_buf: Option<Expr>,
    /// Message-level predicate.
    pub mask: Option<Expr>,
    /// Tile origin, in elements, for 2D messages.
    pub x: Option<Expr>,
    /// Tile origin, in rows, for 2D messages.
    pub y: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    Empty,
    /// Write `value` as a `ty` field at byte `offset` of `buf`.
    Store {
        buf: Expr,
        offset: u32,
        ty: DataType,
        value: Expr,
    },
    Send {
        msg: MessageDescriptor,
        args: SendArgs,
    },
    Seq(Vec<Stmt>),
}

impl Stmt {
    pub fn store(buf: Expr, offset: u32, ty: DataType, value: Expr) -> Self {
        Stmt::Store {
            buf,
            offset,
            ty,
            value,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Stmt::Empty => true,
            Stmt::Seq(items) => items.iter().all(Stmt::is_empty),
            _ => false,
        }
    }

    /// Flat sequence of `items`; nested sequences and empty statements are
    /// spliced out.
    pub fn seq(items: impl IntoIterator<Item = Stmt>) -> Stmt {
        let mut flat = Vec::new();
        for item in items {
            item.flatten_into(&mut flat);
        }
        Self::from_flat(flat)
    }

    /// Sequence `self` then `next`, keeping the result flat.
    pub fn append(self, next: Stmt) -> Stmt {
        Self::seq([self, next])
    }

    fn from_flat(mut items: Vec<Stmt>) -> Stmt {
        match items.len() {
            0 => Stmt::Empty,
            1 => items.pop().unwrap_or(Stmt::Empty),
            _ => Stmt::Seq(items),
        }
    }

    fn flatten_into(self, out: &mut Vec<Stmt>) {
        match self {
            Stmt::Empty => {}
            Stmt::Seq(items) => items.into_iter().for_each(|s| s.flatten_into(out)),
            other => out.push(other),
        }
    }

    /// Top-level statements in execution order.
    pub fn items(&self) -> Vec<&Stmt> {
        match self {
            Stmt::Empty => Vec::new(),
            Stmt::Seq(items) => items.iter().flat_map(Stmt::items).collect(),
            other => vec![other],
        }
    }

    /// Send calls in execution order.
    pub fn sends(&self) -> Vec<(&MessageDescriptor, &SendArgs)> {
        self.items()
            .into_iter()
            .filter_map(|s| match s {
                Stmt::Send { msg, args } => Some((msg, args)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Empty => Ok(()),
            Stmt::Store {
                buf,
                offset,
                ty,
                value,
            } => writeln!(f, "store.{ty}({buf}[{offset}], {value})"),
            Stmt::Send { msg, args } => {
                write!(f, "{msg}({}, {}", args.mem_buf, args.header)?;
                match &args.reg_buf {
                    Some(reg) => write!(f, ", {reg}")?,
                    None => write!(f, ", -")?,
                }
                if let Some(mask) = &args.mask {
                    write!(f, ", mask={mask}")?;
                }
                if let (Some(x), Some(y)) = (&args.x, &args.y) {
                    write!(f, ", x={x}, y={y}")?;
                }
                writeln!(f, ")")
            }
            Stmt::Seq(items) => items.iter().try_for_each(|s| write!(f, "{s}")),
        }
    }
}
