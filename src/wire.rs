//! Wire-level vocabulary: wire types, tags and number handling flags.

use crate::{Result, WireError};
use std::fmt;

/// Largest field number a tag can carry (2^29 - 1).
pub const FIELD_NUMBER_MAX: u32 = (1 << 29) - 1;

const TAG_TYPE_BITS: u32 = 3;
const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// The low three bits of a tag, selecting how the value that follows is framed.
///
/// Group wire types (3 and 4) are not supported and are rejected while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    VarInt = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Maps the raw three-bit value to a wire type.
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(WireType::VarInt),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(WireError::InvalidWireType(other)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A decoded field key: `(field_number << 3) | wire_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    field_number: u32,
    wire_type: WireType,
}

impl Tag {
    pub fn new(field_number: u32, wire_type: WireType) -> Result<Self> {
        if field_number == 0 || field_number > FIELD_NUMBER_MAX {
            return Err(WireError::InvalidFieldNumber(field_number));
        }
        Ok(Self {
            field_number,
            wire_type,
        })
    }

    /// Splits a raw tag value, validating both halves.
    pub fn from_raw(raw: u32) -> Result<Self> {
        let wire_type = WireType::from_raw(raw & TAG_TYPE_MASK)?;
        Self::new(raw >> TAG_TYPE_BITS, wire_type)
    }

    #[inline]
    pub fn field_number(&self) -> u32 {
        self.field_number
    }

    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        make_tag(self.field_number, self.wire_type)
    }
}

/// Combines a field number and wire type without validation.
#[inline]
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type as u32
}

/// Number handling flags for integer members.
///
/// `SIGNED` selects zig-zag encoding; `FIXED32` and `FIXED64` select a little-endian
/// fixed-width representation instead of a varint. The flags combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NumberHandling(u8);

impl NumberHandling {
    pub const NONE: Self = Self(0);
    pub const SIGNED: Self = Self(1);
    pub const FIXED32: Self = Self(1 << 1);
    pub const FIXED64: Self = Self(1 << 2);

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The wire type an integer member with these flags is written with.
    pub fn wire_type(self) -> WireType {
        if self.contains(Self::FIXED32) {
            WireType::Fixed32
        } else if self.contains(Self::FIXED64) {
            WireType::Fixed64
        } else {
            WireType::VarInt
        }
    }
}

impl std::ops::BitOr for NumberHandling {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
