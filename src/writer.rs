//! Buffered output writer.
//!
//! [`WireWriter`] stages encoded bytes in a private segment and commits them to the destination
//! sink when the segment runs out of room, on [`WireWriter::flush`], or when the writer is
//! disposed or dropped.

use crate::varint::{self, Fixed32, Fixed64, VarInt, MAX_VARINT_LEN};
use crate::wire::{make_tag, WireType, FIELD_NUMBER_MAX};
use crate::{Result, WireError};
use bytes::{BufMut, BytesMut};
use std::cell::RefCell;

/// Minimum size of every segment after the first.
pub const DEFAULT_GROWTH_SIZE: usize = 1024;
/// Minimum size of the first segment.
pub const INITIAL_GROWTH_SIZE: usize = DEFAULT_GROWTH_SIZE >> 4;

/// Streaming protobuf writer over a [`BufMut`] sink.
///
/// Byte accounting:
/// - [`bytes_pending`](Self::bytes_pending): staged in the current segment, not yet committed
/// - [`bytes_committed`](Self::bytes_committed): handed to the sink
/// - [`bytes_written`](Self::bytes_written): the sum of both
pub struct WireWriter<'a> {
    sink: Option<&'a mut dyn BufMut>,
    segment: BytesMut,
    committed: u64,
}

impl<'a> WireWriter<'a> {
    pub fn new(sink: &'a mut dyn BufMut) -> Self {
        Self::with_segment(sink, BytesMut::new())
    }

    /// Creates a writer that stages into a reused segment buffer.
    pub fn with_segment(sink: &'a mut dyn BufMut, mut segment: BytesMut) -> Self {
        segment.clear();
        Self {
            sink: Some(sink),
            segment,
            committed: 0,
        }
    }

    #[inline]
    pub fn bytes_pending(&self) -> usize {
        self.segment.len()
    }

    #[inline]
    pub fn bytes_committed(&self) -> u64 {
        self.committed
    }

    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.committed + self.segment.len() as u64
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.sink.is_none()
    }

    #[inline]
    fn available(&self) -> usize {
        self.segment.capacity() - self.segment.len()
    }

    #[inline]
    fn ensure(&mut self, size: usize) -> Result<()> {
        if self.sink.is_none() {
            return Err(WireError::WriterDisposed);
        }
        if self.available() < size {
            self.grow(size)?;
        }
        Ok(())
    }

    /// Obtains a segment with at least `min_size` free bytes, committing pending bytes first.
    ///
    /// The first segment is at least [`INITIAL_GROWTH_SIZE`] bytes, later ones at least
    /// [`DEFAULT_GROWTH_SIZE`].
    pub fn grow(&mut self, min_size: usize) -> Result<()> {
        if self.sink.is_none() {
            return Err(WireError::WriterDisposed);
        }
        let first = self.segment.capacity() == 0 && self.committed == 0;
        if !self.segment.is_empty() {
            self.commit()?;
        }
        let floor = if first {
            INITIAL_GROWTH_SIZE
        } else {
            DEFAULT_GROWTH_SIZE
        };
        let wanted = min_size.max(floor);
        if self.available() < wanted {
            self.segment.reserve(wanted);
        }
        if self.available() < min_size {
            return Err(WireError::CapacityViolation {
                requested: min_size,
                available: self.available(),
            });
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let sink = self.sink.as_deref_mut().ok_or(WireError::WriterDisposed)?;
        let pending = self.segment.len();
        if pending == 0 {
            return Ok(());
        }
        let available = sink.remaining_mut();
        if available < pending {
            tracing::debug!(pending, available, "sink cannot accept pending bytes");
            return Err(WireError::CapacityViolation {
                requested: pending,
                available,
            });
        }
        sink.put_slice(&self.segment);
        self.committed += pending as u64;
        self.segment.clear();
        Ok(())
    }

    /// Commits all pending bytes to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.commit()
    }

    /// Rebinds the writer to a new sink, discarding pending bytes and counters.
    pub fn reset(&mut self, sink: &'a mut dyn BufMut) {
        self.sink = Some(sink);
        self.segment.clear();
        self.committed = 0;
    }

    /// Flushes and releases the sink. Calling it again is a no-op.
    pub fn dispose(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }
        let result = self.commit();
        self.sink = None;
        self.segment.clear();
        self.committed = 0;
        result
    }

    /// Disposes the writer and hands back its segment buffer for reuse.
    pub fn into_segment(mut self) -> Result<BytesMut> {
        let result = self.dispose();
        let segment = std::mem::take(&mut self.segment);
        result.map(|()| segment)
    }

    /// Releases the sink without committing pending bytes and hands back the segment buffer.
    pub fn abandon(mut self) -> BytesMut {
        self.sink = None;
        self.committed = 0;
        let mut segment = std::mem::take(&mut self.segment);
        segment.clear();
        segment
    }

    #[inline]
    pub fn write_raw_byte(&mut self, value: u8) -> Result<()> {
        self.ensure(1)?;
        self.segment.put_u8(value);
        Ok(())
    }

    #[inline]
    pub fn write_raw_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(data.len())?;
        self.segment.put_slice(data);
        Ok(())
    }

    #[inline]
    pub fn encode_varint<T: VarInt>(&mut self, value: T) -> Result<()> {
        self.encode_raw_varint(value.to_wire())
    }

    #[inline]
    pub fn encode_raw_varint(&mut self, value: u64) -> Result<()> {
        self.ensure(MAX_VARINT_LEN)?;
        varint::encode_varint(&mut self.segment, value);
        Ok(())
    }

    /// Writes two 32-bit varints back to back.
    #[inline]
    pub fn encode_two_u32_varint(&mut self, first: u32, second: u32) -> Result<()> {
        self.ensure(2 * u32::MAX_BYTES)?;
        varint::encode_two_u32_varint(&mut self.segment, first, second);
        Ok(())
    }

    #[inline]
    pub fn encode_fixed32<T: Fixed32>(&mut self, value: T) -> Result<()> {
        self.ensure(4)?;
        self.segment.put_u32_le(value.to_bits32());
        Ok(())
    }

    #[inline]
    pub fn encode_fixed64<T: Fixed64>(&mut self, value: T) -> Result<()> {
        self.ensure(8)?;
        self.segment.put_u64_le(value.to_bits64());
        Ok(())
    }

    /// Writes a field tag.
    #[inline]
    pub fn encode_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        if field_number == 0 || field_number > FIELD_NUMBER_MAX {
            return Err(WireError::InvalidFieldNumber(field_number));
        }
        self.encode_raw_varint(make_tag(field_number, wire_type) as u64)
    }

    /// Writes a length prefix followed by `data`.
    pub fn encode_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(varint::varint_len(data.len() as u64) + data.len())?;
        varint::encode_varint(&mut self.segment, data.len() as u64);
        self.segment.put_slice(data);
        Ok(())
    }

    #[inline]
    pub fn encode_string(&mut self, value: &str) -> Result<()> {
        self.encode_bytes(value.as_bytes())
    }

    /// Writes a length-delimited body produced by `body`.
    ///
    /// The body is encoded into a scratch buffer first so its length is known.
    pub fn encode_nested<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut WireWriter<'_>) -> Result<()>,
    {
        let mut scratch = pool::rent();
        let result = {
            let mut inner = WireWriter::new(&mut scratch);
            body(&mut inner).and_then(|()| inner.dispose())
        };
        let result = result.and_then(|()| self.encode_bytes(&scratch));
        pool::give_back(scratch);
        result
    }
}

impl Drop for WireWriter<'_> {
    fn drop(&mut self) {
        if self.sink.is_some() && !self.segment.is_empty() {
            if let Err(e) = self.commit() {
                tracing::warn!(
                    pending = self.segment.len(),
                    error = %e,
                    "dropping writer with uncommitted bytes"
                );
            }
        }
    }
}

/// Thread-local cache of staging buffers reused across serialization calls.
pub(crate) mod pool {
    use super::*;

    /// Buffers larger than this are not retained.
    const MAX_RETAINED_CAPACITY: usize = 1 << 20;
    const MAX_RETAINED_BUFFERS: usize = 4;

    thread_local! {
        static BUFFERS: RefCell<Vec<BytesMut>> = const { RefCell::new(Vec::new()) };
    }

    pub(crate) fn rent() -> BytesMut {
        BUFFERS
            .with(|cell| cell.borrow_mut().pop())
            .unwrap_or_default()
    }

    pub(crate) fn give_back(mut buffer: BytesMut) {
        if buffer.capacity() > MAX_RETAINED_CAPACITY {
            tracing::trace!(capacity = buffer.capacity(), "discarding oversized staging buffer");
            return;
        }
        buffer.clear();
        BUFFERS.with(|cell| {
            let mut buffers = cell.borrow_mut();
            if buffers.len() < MAX_RETAINED_BUFFERS {
                buffers.push(buffer);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_segment_uses_initial_growth() {
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        writer.write_raw_byte(1).unwrap();
        assert!(writer.segment.capacity() >= INITIAL_GROWTH_SIZE);
        assert_eq!(writer.bytes_pending(), 1);
        assert_eq!(writer.bytes_committed(), 0);
    }

    #[test]
    fn test_grow_commits_pending_bytes() {
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        writer.write_raw_bytes(&[7; 10]).unwrap();
        writer.grow(4096).unwrap();
        assert_eq!(writer.bytes_pending(), 0);
        assert_eq!(writer.bytes_committed(), 10);
        assert_eq!(writer.bytes_written(), 10);
        assert!(writer.available() >= 4096);
        drop(writer);
        assert_eq!(out, vec![7; 10]);
    }

    #[test]
    fn test_large_payload_spans_segments() {
        let payload = vec![0xabu8; 5000];
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        for _ in 0..3 {
            writer.encode_bytes(&payload).unwrap();
        }
        writer.flush().unwrap();
        assert_eq!(writer.bytes_written(), 3 * 5002);
        drop(writer);
        assert_eq!(out.len(), 3 * 5002);
    }

    #[test]
    fn test_fixed_sink_capacity_violation() {
        let mut storage = [0u8; 4];
        let mut sink: &mut [u8] = &mut storage;
        let mut writer = WireWriter::new(&mut sink);
        writer.write_raw_bytes(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert!(matches!(
            writer.flush(),
            Err(WireError::CapacityViolation {
                requested: 6,
                available: 4
            })
        ));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        writer.encode_varint(300u32).unwrap();
        writer.dispose().unwrap();
        writer.dispose().unwrap();
        assert!(writer.is_disposed());
        assert!(matches!(
            writer.write_raw_byte(0),
            Err(WireError::WriterDisposed)
        ));
        drop(writer);
        assert_eq!(out, vec![0xac, 0x02]);
    }

    #[test]
    fn test_reset_rebinds_sink() {
        let mut first = Vec::new();
        let mut second = Vec::new();
        let mut writer = WireWriter::new(&mut first);
        writer.write_raw_byte(1).unwrap();
        writer.reset(&mut second);
        writer.write_raw_byte(2).unwrap();
        writer.dispose().unwrap();
        drop(writer);
        assert!(first.is_empty());
        assert_eq!(second, vec![2]);
    }

    #[test]
    fn test_encode_tag_rejects_out_of_range_field() {
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        assert!(matches!(
            writer.encode_tag(0, WireType::VarInt),
            Err(WireError::InvalidFieldNumber(0))
        ));
        assert!(writer
            .encode_tag(FIELD_NUMBER_MAX + 1, WireType::VarInt)
            .is_err());
    }

    #[test]
    fn test_encode_nested_prefixes_length() {
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        writer
            .encode_nested(|inner| {
                inner.encode_tag(1, WireType::VarInt)?;
                inner.encode_varint(150u32)
            })
            .unwrap();
        writer.dispose().unwrap();
        drop(writer);
        assert_eq!(out, vec![0x03, 0x08, 0x96, 0x01]);
    }
}
