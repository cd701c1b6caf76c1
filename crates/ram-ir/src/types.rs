//! Primitive value types shared by every stage of the RAM core.
//!
//! All runtime values travel as a single fixed-width [`RamDomain`]. Numbers of
//! other interpretations (unsigned, float) and interned ids (symbols, records)
//! are bit-cast into it; the static [`TypeAttribute`] of a column or the
//! [`NumericKind`] of an operator says how to read the bits back.

use std::fmt;

/// The universal value carried by tuples, expressions and relations.
pub type RamDomain = i32;
/// Signed interpretation of a [`RamDomain`].
pub type RamSigned = i32;
/// Unsigned interpretation of a [`RamDomain`].
pub type RamUnsigned = u32;
/// Floating point interpretation of a [`RamDomain`].
pub type RamFloat = f32;

/// Reinterpret a domain value as unsigned.
#[inline]
pub fn to_unsigned(value: RamDomain) -> RamUnsigned {
    value as RamUnsigned
}

/// Store an unsigned value in the domain.
#[inline]
pub fn from_unsigned(value: RamUnsigned) -> RamDomain {
    value as RamDomain
}

/// Reinterpret a domain value as a float.
#[inline]
pub fn to_float(value: RamDomain) -> RamFloat {
    RamFloat::from_bits(value as u32)
}

/// Store a float in the domain.
#[inline]
pub fn from_float(value: RamFloat) -> RamDomain {
    value.to_bits() as RamDomain
}

/// Largest arity a relation may declare; search signatures are 64-bit masks.
pub const MAX_ARITY: usize = 64;

/// Declared type of a relation column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAttribute {
    Signed,
    Unsigned,
    Float,
    Symbol,
    Record,
}

impl TypeAttribute {
    /// Short code used in listings (`i`, `u`, `f`, `s`, `r`).
    pub fn code(self) -> char {
        match self {
            TypeAttribute::Signed => 'i',
            TypeAttribute::Unsigned => 'u',
            TypeAttribute::Float => 'f',
            TypeAttribute::Symbol => 's',
            TypeAttribute::Record => 'r',
        }
    }

    /// The numeric interpretation used when comparing values of this type.
    ///
    /// Symbols and records compare by their interned id.
    pub fn numeric_kind(self) -> NumericKind {
        match self {
            TypeAttribute::Unsigned => NumericKind::Unsigned,
            TypeAttribute::Float => NumericKind::Float,
            TypeAttribute::Signed | TypeAttribute::Symbol | TypeAttribute::Record => {
                NumericKind::Signed
            }
        }
    }
}

impl fmt::Display for TypeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Interpretation of operands for typed operators and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NumericKind {
    #[default]
    Signed,
    Unsigned,
    Float,
}

impl NumericKind {
    /// Suffix used in listings: plain for signed, `u`/`f` otherwise.
    pub fn suffix(self) -> &'static str {
        match self {
            NumericKind::Signed => "",
            NumericKind::Unsigned => "u",
            NumericKind::Float => "f",
        }
    }
}
