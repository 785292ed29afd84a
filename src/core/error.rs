// This module defines the error types of the message planner using the thiserror crate.
// Only conditions a caller can react to are represented here: AccessError is returned by
// the access builder when a view cannot be covered under the requested policy (empty view,
// operation not valid for the address space, rejected tile transfer, no legal message
// sequence), and ParseError is returned by the name-table lookups used by FromStr
// implementations. Contract violations (for example a store tile with VNNI requested) are
// programmer errors and panic at the construction site instead. Unsupported hardware
// configurations are reported by MessageDescriptor::is_supported and never raised.

//! Error types for access planning.

use thiserror::Error;

/// Failure to plan an access site.
///
/// The builder either returns a complete covering or one of these; a partial
/// message sequence is never handed out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Memory view has no elements")]
    EmptyView,

    #[error("Operation {op} is not valid for {address} memory")]
    InvalidOperation {
        op: &'static str,
        address: &'static str,
    },

    #[error("Tile transfer rejected: {reason}")]
    TileRejected {
        reason: String,
    },

    #[error("No message sequence covers view {view}: {reason}")]
    NoCovering {
        view: String,
        reason: String,
    },
}

impl AccessError {
    pub(crate) fn tile(reason: impl Into<String>) -> Self {
        AccessError::TileRejected {
            reason: reason.into(),
        }
    }
}

/// Unknown name passed to one of the enum name tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {what}: {name}")]
pub struct ParseError {
    pub what: &'static str,
    pub name: String,
}

impl ParseError {
    pub fn new(what: &'static str, name: &str) -> Self {
        Self {
            what,
            name: name.to_string(),
        }
    }
}

/// Result type alias for access planning.
pub type AccessResult<T> = Result<T, AccessError>;

/// Look up `name` in a constant `(value, name)` table.
pub(crate) fn parse_enum<T: Copy>(
    table: &[(T, &'static str)],
    what: &'static str,
    name: &str,
) -> Result<T, ParseError> {
    table
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(v, _)| *v)
        .ok_or_else(|| ParseError::new(what, name))
}

/// Reverse lookup in a constant `(value, name)` table.
pub(crate) fn enum_name<T: Copy + PartialEq>(
    table: &[(T, &'static str)],
    value: T,
) -> &'static str {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, n)| *n)
        .unwrap_or("?")
}
