//! Cursor over an input byte slice.

use crate::varint::{self, Fixed32, Fixed64, VarInt, MAX_VARINT_LEN};
use crate::wire::{Tag, WireType};
use crate::{Result, WireError};

/// Reads protobuf primitives from a borrowed byte slice.
///
/// Every read either consumes exactly the bytes of the value or fails without a meaningful
/// position; callers do not resume reading after an error.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The bytes consumed since `start`.
    #[inline]
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    /// Moves the cursor back by `delta` bytes.
    ///
    /// # Panics
    /// Panics if `delta` exceeds the current position.
    pub fn rewind(&mut self, delta: usize) {
        assert!(
            delta <= self.pos,
            "cannot rewind {delta} bytes from position {}",
            self.pos
        );
        self.pos -= delta;
    }

    /// Decodes a varint bounded by `max_bytes`.
    #[inline]
    pub fn decode_raw_varint(&mut self, max_bytes: usize) -> Result<u64> {
        let (value, len) = varint::decode_varint(&self.data[self.pos..], max_bytes)?;
        self.pos += len;
        Ok(value)
    }

    /// Decodes a varint bounded by the width of `T`.
    #[inline]
    pub fn decode_varint<T: VarInt>(&mut self) -> Result<T> {
        self.decode_raw_varint(T::MAX_BYTES).map(T::from_wire)
    }

    /// Decodes two consecutive 32-bit varints.
    pub fn decode_two_u32_varint(&mut self) -> Result<(u32, u32)> {
        let (values, len) = varint::decode_two_u32_varint(&self.data[self.pos..])?;
        self.pos += len;
        Ok(values)
    }

    #[inline]
    pub fn decode_fixed32<T: Fixed32>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(T::from_bits32(u32::from_le_bytes(raw)))
    }

    #[inline]
    pub fn decode_fixed64<T: Fixed64>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(T::from_bits64(u64::from_le_bytes(raw)))
    }

    /// Decodes and validates a field tag.
    #[inline]
    pub fn decode_tag(&mut self) -> Result<Tag> {
        let raw = self.decode_varint::<u32>()?;
        Tag::from_raw(raw)
    }

    /// Decodes the next tag without consuming it.
    pub fn peek_tag(&mut self) -> Result<Tag> {
        let start = self.pos;
        let tag = self.decode_tag();
        let consumed = self.pos - start;
        self.rewind(consumed);
        tag
    }

    /// Consumes exactly `len` bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(WireError::InsufficientData {
                needed: len,
                remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Consumes a varint length prefix and the bytes it announces.
    #[inline]
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.decode_raw_varint(MAX_VARINT_LEN)?;
        let len = usize::try_from(len).map_err(|_| WireError::InsufficientData {
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.read_bytes(len)
    }

    /// Consumes a length-delimited UTF-8 string.
    pub fn decode_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_length_delimited()?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// Consumes the value following a tag of the given wire type.
    pub fn skip_field(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::VarInt => {
                self.decode_raw_varint(MAX_VARINT_LEN)?;
            }
            WireType::Fixed64 => {
                self.read_bytes(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.read_bytes(4)?;
            }
        }
        Ok(())
    }
}
