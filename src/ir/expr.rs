// This module implements the small expression language used in emitted statements: variables,
// integer and boolean immediates, binary arithmetic and comparisons, casts and per-slot vector
// literals. Constructors and operators fold constants, so offsets and masks that are known
// statically stay immediates and a predicate that is always true disappears.

//! Expressions for offset arithmetic and masks.
//!
//! The planner only needs a small expression language: named buffers and
//! offsets, integer and boolean immediates, a handful of binary operators,
//! casts and vector literals (per-slot offsets). Constructors fold constants
//! so that statically known offsets and masks stay immediates.

use std::fmt;
use std::ops;

use super::types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Eq,
    And,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::And => "&&",
        }
    }

    fn fold(self, a: i64, b: i64) -> Option<Expr> {
        let v = match self {
            BinOp::Add => Expr::Int(a.checked_add(b)?),
            BinOp::Sub => Expr::Int(a.checked_sub(b)?),
            BinOp::Mul => Expr::Int(a.checked_mul(b)?),
            BinOp::Div if b != 0 => Expr::Int(a.div_euclid(b)),
            BinOp::Mod if b != 0 => Expr::Int(a.rem_euclid(b)),
            BinOp::Lt => Expr::Bool(a < b),
            BinOp::Le => Expr::Bool(a <= b),
            BinOp::Eq => Expr::Bool(a == b),
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Var { name: String, ty: DataType },
    Int(i64),
    Bool(bool),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast { ty: DataType, value: Box<Expr> },
    Vector(Vec<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>, ty: DataType) -> Self {
        Expr::Var {
            name: name.into(),
            ty,
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool(value)
    }

    /// Vector literal, one lane per element.
    pub fn vector(items: Vec<Expr>) -> Self {
        assert!(!items.is_empty(), "Empty vector literal");
        Expr::Vector(items)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Expr::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Expr::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        match self {
            Expr::Int(_) | Expr::Bool(_) => true,
            Expr::Vector(items) => items.iter().all(Expr::is_const),
            _ => false,
        }
    }

    /// Binary operation with constant folding and trivial identities.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
            if let Some(folded) = op.fold(a, b) {
                return folded;
            }
        }
        match (op, lhs.as_int(), rhs.as_int()) {
            (BinOp::Add, Some(0), _) => return rhs,
            (BinOp::Add | BinOp::Sub, _, Some(0)) => return lhs,
            (BinOp::Mul, Some(1), _) => return rhs,
            (BinOp::Mul | BinOp::Div, _, Some(1)) => return lhs,
            (BinOp::Mul, Some(0), _) | (BinOp::Mul, _, Some(0)) => return Expr::Int(0),
            _ => {}
        }
        if op == BinOp::And {
            match (lhs.as_bool(), rhs.as_bool()) {
                (Some(false), _) | (_, Some(false)) => return Expr::Bool(false),
                (Some(true), _) => return rhs,
                (_, Some(true)) => return lhs,
                _ => {}
            }
        }
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        Expr::binary(BinOp::Lt, self, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        Expr::binary(BinOp::Le, self, rhs.into())
    }

    pub fn eq_to(self, rhs: impl Into<Expr>) -> Self {
        Expr::binary(BinOp::Eq, self, rhs.into())
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::And, self, rhs)
    }

    pub fn rem(self, rhs: impl Into<Expr>) -> Self {
        Expr::binary(BinOp::Mod, self, rhs.into())
    }

    pub fn div(self, rhs: impl Into<Expr>) -> Self {
        Expr::binary(BinOp::Div, self, rhs.into())
    }

    /// Conversion to `ty`. Immediates pass through unchanged.
    pub fn cast(self, ty: DataType) -> Self {
        match self {
            Expr::Int(_) | Expr::Bool(_) => self,
            Expr::Cast { value, .. } => Expr::Cast { ty, value },
            other => Expr::Cast {
                ty,
                value: Box::new(other),
            },
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Int(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Int(value as i64)
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Int(value as i64)
    }
}

impl From<u64> for Expr {
    fn from(value: u64) -> Self {
        Expr::Int(value as i64)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Bool(value)
    }
}

impl<T: Into<Expr>> ops::Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        Expr::binary(BinOp::Add, self, rhs.into())
    }
}

impl<T: Into<Expr>> ops::Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        Expr::binary(BinOp::Sub, self, rhs.into())
    }
}

impl<T: Into<Expr>> ops::Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        Expr::binary(BinOp::Mul, self, rhs.into())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var { name, .. } => write!(f, "{name}"),
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Bool(v) => write!(f, "{v}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Cast { ty, value } => write!(f, "cast<{ty}>({value})"),
            Expr::Vector(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
