use strum::{EnumIter, EnumString};

use crate::middle::op::{BinaryOp, UnaryOp};

/// Go's predeclared basic types, including the untyped constant kinds,
/// which take their default type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
pub enum PrimitiveKind {
    #[strum(serialize = "bool", serialize = "untyped bool")]
    Bool,
    #[strum(serialize = "int", serialize = "untyped int")]
    Int,
    #[strum(serialize = "int8")]
    Int8,
    #[strum(serialize = "int16")]
    Int16,
    #[strum(serialize = "int32", serialize = "rune", serialize = "untyped rune")]
    Int32,
    #[strum(serialize = "int64")]
    Int64,
    #[strum(serialize = "uint")]
    Uint,
    #[strum(serialize = "uint8", serialize = "byte")]
    Uint8,
    #[strum(serialize = "uint16")]
    Uint16,
    #[strum(serialize = "uint32")]
    Uint32,
    #[strum(serialize = "uint64")]
    Uint64,
    #[strum(serialize = "uintptr")]
    Uintptr,
    #[strum(serialize = "float32")]
    Float32,
    #[strum(serialize = "float64", serialize = "untyped float")]
    Float64,
    #[strum(serialize = "complex64")]
    Complex64,
    #[strum(serialize = "complex128", serialize = "untyped complex")]
    Complex128,
    #[strum(serialize = "string", serialize = "untyped string")]
    String,
}

impl core::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveKind::Bool => write!(f, "bool"),
            PrimitiveKind::Int => write!(f, "isize"),
            PrimitiveKind::Int8 => write!(f, "i8"),
            PrimitiveKind::Int16 => write!(f, "i16"),
            PrimitiveKind::Int32 => write!(f, "i32"),
            PrimitiveKind::Int64 => write!(f, "i64"),
            PrimitiveKind::Uint => write!(f, "usize"),
            PrimitiveKind::Uint8 => write!(f, "u8"),
            PrimitiveKind::Uint16 => write!(f, "u16"),
            PrimitiveKind::Uint32 => write!(f, "u32"),
            PrimitiveKind::Uint64 => write!(f, "u64"),
            PrimitiveKind::Uintptr => write!(f, "GoUintptr"),
            PrimitiveKind::Float32 => write!(f, "f32"),
            PrimitiveKind::Float64 => write!(f, "f64"),
            PrimitiveKind::Complex64 => write!(f, "Complex64"),
            PrimitiveKind::Complex128 => write!(f, "Complex128"),
            PrimitiveKind::String => write!(f, "GoString"),
        }
    }
}

impl PrimitiveKind {
    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int
                | PrimitiveKind::Int8
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Uint
                | PrimitiveKind::Uint8
                | PrimitiveKind::Uint16
                | PrimitiveKind::Uint32
                | PrimitiveKind::Uint64
                | PrimitiveKind::Uintptr
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveKind::Float32 | PrimitiveKind::Float64)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, PrimitiveKind::Complex64 | PrimitiveKind::Complex128)
    }

    /// Whether values can be read without `.clone()`.
    pub fn is_copy(&self) -> bool {
        !matches!(self, PrimitiveKind::String)
    }

    /// Suffix for a literal of this type (`1isize`), if Rust has one.
    /// `uintptr` is spelled as its own alias but written with `usize`.
    pub fn literal_suffix(&self) -> Option<String> {
        match self {
            PrimitiveKind::Uintptr => Some("usize".to_string()),
            kind if kind.is_integer() || kind.is_float() => Some(kind.to_string()),
            _ => None,
        }
    }

    pub fn supports_binary_op(&self, op: BinaryOp) -> bool {
        match self {
            // All ops
            PrimitiveKind::Int
            | PrimitiveKind::Int8
            | PrimitiveKind::Int16
            | PrimitiveKind::Int32
            | PrimitiveKind::Int64
            | PrimitiveKind::Uint
            | PrimitiveKind::Uint8
            | PrimitiveKind::Uint16
            | PrimitiveKind::Uint32
            | PrimitiveKind::Uint64
            | PrimitiveKind::Uintptr => true,
            // No bitwise ops
            PrimitiveKind::Float32 | PrimitiveKind::Float64 => match op {
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge => true,
                BinaryOp::Rem
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::AndNot => false,
            },
            // Field arithmetic and equality
            PrimitiveKind::Complex64 | PrimitiveKind::Complex128 => matches!(
                op,
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Eq | BinaryOp::Ne
            ),
            // Concatenation and ordering
            PrimitiveKind::String => matches!(
                op,
                BinaryOp::Add
                    | BinaryOp::Eq
                    | BinaryOp::Ne
                    | BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge
            ),
            // Only equality, `&&`/`||` are branches in SSA
            PrimitiveKind::Bool => matches!(op, BinaryOp::Eq | BinaryOp::Ne),
        }
    }

    pub fn supports_unary_op(&self, op: UnaryOp) -> bool {
        match op {
            UnaryOp::Neg => self.is_integer() || self.is_float() || self.is_complex(),
            UnaryOp::Not => matches!(self, PrimitiveKind::Bool),
            UnaryOp::Complement => self.is_integer(),
            UnaryOp::Deref | UnaryOp::Recv => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn aliases_resolve_to_their_kind() {
        assert_eq!(PrimitiveKind::from_str("byte"), Ok(PrimitiveKind::Uint8));
        assert_eq!(PrimitiveKind::from_str("rune"), Ok(PrimitiveKind::Int32));
        assert_eq!(PrimitiveKind::from_str("untyped float"), Ok(PrimitiveKind::Float64));
        assert!(PrimitiveKind::from_str("error").is_err());
    }

    #[test]
    fn every_kind_is_integer_float_complex_or_other() {
        for kind in PrimitiveKind::iter() {
            let classes = [kind.is_integer(), kind.is_float(), kind.is_complex()];
            assert!(classes.iter().filter(|c| **c).count() <= 1, "{kind:?}");
        }
    }

    #[test]
    fn uintptr_is_spelled_apart_from_uint() {
        assert_eq!(PrimitiveKind::Uint.to_string(), "usize");
        assert_eq!(PrimitiveKind::Uintptr.to_string(), "GoUintptr");
        assert_eq!(PrimitiveKind::Uintptr.literal_suffix().as_deref(), Some("usize"));
        assert_eq!(PrimitiveKind::String.literal_suffix(), None);
    }

    #[test]
    fn operator_support() {
        assert!(PrimitiveKind::String.supports_binary_op(BinaryOp::Add));
        assert!(!PrimitiveKind::String.supports_binary_op(BinaryOp::Sub));
        assert!(!PrimitiveKind::Float64.supports_binary_op(BinaryOp::Rem));
        assert!(PrimitiveKind::Uint8.supports_unary_op(UnaryOp::Complement));
        assert!(!PrimitiveKind::Bool.supports_unary_op(UnaryOp::Neg));
    }
}
