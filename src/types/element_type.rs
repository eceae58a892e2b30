//! This module defines the canonical, type-safe representation of the scalar
//! element types a volume can be made of.

use crate::error::VolpipeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scalar type of every element in a decompressed volume.
///
/// Each variant has a stable one-byte tag that is written into the header.
/// These tags are part of the on-disk contract and must never be renumbered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl ElementType {
    /// Every supported element type, in tag order.
    pub const ALL: [ElementType; 10] = [
        Self::UInt8,
        Self::Int8,
        Self::UInt16,
        Self::Int16,
        Self::UInt32,
        Self::Int32,
        Self::UInt64,
        Self::Int64,
        Self::Float32,
        Self::Float64,
    ];

    /// The header tag for this type.
    pub fn tag(&self) -> u8 {
        match self {
            Self::UInt8 => 1,
            Self::Int8 => 2,
            Self::UInt16 => 3,
            Self::Int16 => 4,
            Self::UInt32 => 5,
            Self::Int32 => 6,
            Self::UInt64 => 7,
            Self::Int64 => 8,
            Self::Float32 => 9,
            Self::Float64 => 10,
        }
    }

    /// Resolves a header tag back into an `ElementType`.
    pub fn from_tag(tag: u8) -> Result<Self, VolpipeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| VolpipeError::HeaderParseError(format!("Unknown element type tag {}", tag)))
    }

    /// Width of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Returns `true` if the data type is an unsigned integer.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Provides the canonical string representation for an `ElementType`.
impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
