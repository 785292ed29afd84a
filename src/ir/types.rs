// This module defines DataType, the scalar types of views, messages and expressions, together
// with their byte sizes and names. The three message units (dword, oword, hword) are untyped
// and only used as element types of block messages.

//! Scalar data types used by views, messages and expressions.
//!
//! Besides the usual integer and floating point types there are three untyped
//! message units (`dword`, `oword`, `hword`). They only appear as the element
//! type of block messages, where the unit size drives alignment and masking.

use std::fmt;
use std::str::FromStr;

use crate::core::error::{enum_name, parse_enum, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    U8,
    S8,
    U16,
    S16,
    F16,
    BF16,
    U32,
    S32,
    F32,
    U64,
    S64,
    F64,
    /// 4-byte block unit (fine-grained block messages only).
    Dword,
    /// 16-byte block unit.
    Oword,
    /// 32-byte block unit.
    Hword,
    Bool,
}

const DATA_TYPE_NAMES: [(DataType, &str); 16] = [
    (DataType::U8, "u8"),
    (DataType::S8, "s8"),
    (DataType::U16, "u16"),
    (DataType::S16, "s16"),
    (DataType::F16, "f16"),
    (DataType::BF16, "bf16"),
    (DataType::U32, "u32"),
    (DataType::S32, "s32"),
    (DataType::F32, "f32"),
    (DataType::U64, "u64"),
    (DataType::S64, "s64"),
    (DataType::F64, "f64"),
    (DataType::Dword, "dword"),
    (DataType::Oword, "oword"),
    (DataType::Hword, "hword"),
    (DataType::Bool, "bool"),
];

impl DataType {
    /// Size in bytes.
    pub const fn size(self) -> u32 {
        use DataType::*;
        match self {
            U8 | S8 | Bool => 1,
            U16 | S16 | F16 | BF16 => 2,
            U32 | S32 | F32 | Dword => 4,
            U64 | S64 | F64 => 8,
            Oword => 16,
            Hword => 32,
        }
    }

    /// Integer type of the given width.
    pub fn int(bytes: u32, signed: bool) -> Self {
        match (bytes, signed) {
            (1, false) => DataType::U8,
            (1, true) => DataType::S8,
            (2, false) => DataType::U16,
            (2, true) => DataType::S16,
            (4, false) => DataType::U32,
            (4, true) => DataType::S32,
            (8, false) => DataType::U64,
            (8, true) => DataType::S64,
            _ => panic!("No {bytes}-byte integer type"),
        }
    }

    /// Untyped unit consumed by block messages.
    pub fn is_block_unit(self) -> bool {
        matches!(self, DataType::Dword | DataType::Oword | DataType::Hword)
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::F16 | DataType::BF16 | DataType::F32 | DataType::F64
        )
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            DataType::U8
                | DataType::S8
                | DataType::U16
                | DataType::S16
                | DataType::U32
                | DataType::S32
                | DataType::U64
                | DataType::S64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::S8 | DataType::S16 | DataType::S32 | DataType::S64
        ) || self.is_float()
    }

    pub fn name(self) -> &'static str {
        enum_name(&DATA_TYPE_NAMES, self)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&DATA_TYPE_NAMES, "data type", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::BF16.size(), 2);
        assert_eq!(DataType::Oword.size(), 16);
        assert_eq!(DataType::Hword.size(), 32);
        assert_eq!(DataType::int(8, true), DataType::S64);
        assert_eq!(DataType::int(4, false), DataType::U32);
    }

    #[test]
    fn test_classification() {
        assert!(DataType::Oword.is_block_unit());
        assert!(!DataType::U32.is_block_unit());
        assert!(DataType::F16.is_float());
        assert!(DataType::S16.is_signed());
        assert!(!DataType::U8.is_signed());
        assert!(!DataType::Dword.is_int());
    }

    #[test]
    fn test_names_round_trip() {
        for name in ["u8", "bf16", "f32", "hword"] {
            let ty: DataType = name.parse().unwrap();
            assert_eq!(ty.to_string(), name);
        }
        assert!("f8".parse::<DataType>().is_err());
    }
}
