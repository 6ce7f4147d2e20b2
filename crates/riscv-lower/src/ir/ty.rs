//! Source-level type shapes, as far as the calling convention needs them.
//!
//! The ABI cares about sizes, alignments, and which fields of a record are
//! scalar floats; nothing else about the front end's type system leaks in.

use super::expr::Mode;
use crate::target::TargetConfig;

/// A field of a record type, at a fixed byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub offset: u64,
    pub ty: Ty,
}

/// The shape of an argument or return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    /// An integer of the given byte size (bools and enums included).
    Int { bytes: u64 },
    /// A pointer; its size is the target word.
    Pointer,
    /// A scalar float (`Mode::SF` or `Mode::DF`).
    Float(Mode),
    /// A complex float (`Mode::CSF` or `Mode::CDF`).
    Complex(Mode),
    /// A record with fields at fixed offsets; `size` includes tail padding.
    Record { size: u64, fields: Vec<Field> },
    Array { elem: Box<Ty>, len: u64 },
}

impl Ty {
    #[must_use]
    pub fn size(&self, target: &TargetConfig) -> u64 {
        match self {
            Ty::Int { bytes } => *bytes,
            Ty::Pointer => target.units_per_word(),
            Ty::Float(mode) | Ty::Complex(mode) => mode.size(),
            Ty::Record { size, .. } => *size,
            Ty::Array { elem, len } => elem.size(target) * len,
        }
    }

    /// Alignment in bits.
    #[must_use]
    pub fn align_bits(&self, target: &TargetConfig) -> u64 {
        match self {
            Ty::Int { bytes } => bytes.next_power_of_two().min(target.units_per_word()) * 8,
            Ty::Pointer => target.units_per_word() * 8,
            Ty::Float(mode) | Ty::Complex(mode) => mode.inner().bitsize(),
            Ty::Record { fields, .. } => fields
                .iter()
                .map(|f| f.ty.align_bits(target))
                .max()
                .unwrap_or(8),
            Ty::Array { elem, .. } => elem.align_bits(target),
        }
    }

    /// The machine mode the value is carried in; records and arrays are BLK.
    #[must_use]
    pub fn mode(&self, target: &TargetConfig) -> Mode {
        match self {
            Ty::Int { bytes } => Mode::int_with_size(*bytes).unwrap_or(Mode::BLK),
            Ty::Pointer => target.word_mode(),
            Ty::Float(mode) | Ty::Complex(mode) => *mode,
            Ty::Record { .. } | Ty::Array { .. } => Mode::BLK,
        }
    }

    /// True for floating types, scalar or complex.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Ty::Float(_) | Ty::Complex(_))
    }

    /// True for aggregate types (records and arrays).
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Ty::Record { .. } | Ty::Array { .. })
    }

    /// True for integer-like types that are padded downward on big-endian
    /// stacks.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(self, Ty::Int { .. } | Ty::Pointer)
    }

    /// True for a scalar float whose precision is exactly `bits`.
    #[must_use]
    pub fn is_scalar_float_of(&self, bits: u64) -> bool {
        matches!(self, Ty::Float(mode) if mode.bitsize() == bits)
    }
}
