use bytes::BytesMut;
use wirepack::{WireError, WireReader, WireType, WireWriter};

fn write_with<F>(body: F) -> Vec<u8>
where
    F: FnOnce(&mut WireWriter<'_>) -> wirepack::Result<()>,
{
    let mut out = BytesMut::new();
    let mut writer = WireWriter::new(&mut out);
    body(&mut writer).unwrap();
    writer.dispose().unwrap();
    drop(writer);
    out.to_vec()
}

#[test]
fn test_stream_of_mixed_fields() {
    let bytes = write_with(|w| {
        w.encode_tag(1, WireType::VarInt)?;
        w.encode_varint(-2i32)?;
        w.encode_tag(2, WireType::Fixed32)?;
        w.encode_fixed32(1.5f32)?;
        w.encode_tag(3, WireType::Fixed64)?;
        w.encode_fixed64(u64::MAX)?;
        w.encode_tag(4, WireType::LengthDelimited)?;
        w.encode_string("héllo")?;
        w.encode_tag(5, WireType::LengthDelimited)?;
        w.encode_nested(|inner| {
            inner.encode_tag(1, WireType::VarInt)?;
            inner.encode_varint(300u32)
        })
    });

    let mut reader = WireReader::new(&bytes);
    let tag = reader.decode_tag().unwrap();
    assert_eq!((tag.field_number(), tag.wire_type()), (1, WireType::VarInt));
    assert_eq!(reader.decode_varint::<i32>().unwrap(), -2);

    assert_eq!(reader.decode_tag().unwrap().wire_type(), WireType::Fixed32);
    assert_eq!(reader.decode_fixed32::<f32>().unwrap(), 1.5);

    assert_eq!(reader.decode_tag().unwrap().field_number(), 3);
    assert_eq!(reader.decode_fixed64::<u64>().unwrap(), u64::MAX);

    assert_eq!(reader.decode_tag().unwrap().field_number(), 4);
    assert_eq!(reader.decode_string().unwrap(), "héllo");

    assert_eq!(reader.decode_tag().unwrap().field_number(), 5);
    let mut nested = WireReader::new(reader.read_length_delimited().unwrap());
    assert_eq!(nested.decode_tag().unwrap().field_number(), 1);
    assert_eq!(nested.decode_varint::<u32>().unwrap(), 300);
    assert!(nested.is_completed());
    assert!(reader.is_completed());
}

#[test]
fn test_skipping_unknown_fields_reaches_known_one() {
    let bytes = write_with(|w| {
        w.encode_tag(7, WireType::LengthDelimited)?;
        w.encode_bytes(&[0; 40])?;
        w.encode_tag(8, WireType::Fixed64)?;
        w.encode_fixed64(0u64)?;
        w.encode_tag(9, WireType::VarInt)?;
        w.encode_varint(u64::MAX)?;
        w.encode_tag(1, WireType::VarInt)?;
        w.encode_varint(42u32)
    });

    let mut reader = WireReader::new(&bytes);
    loop {
        let tag = reader.decode_tag().unwrap();
        if tag.field_number() == 1 {
            assert_eq!(reader.decode_varint::<u32>().unwrap(), 42);
            break;
        }
        reader.skip_field(tag.wire_type()).unwrap();
    }
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn test_accounting_across_segments() {
    let mut out = BytesMut::new();
    let mut writer = WireWriter::new(&mut out);
    let payload = vec![0xabu8; 5000];
    writer.encode_tag(1, WireType::LengthDelimited).unwrap();
    writer.encode_bytes(&payload).unwrap();
    writer.encode_tag(2, WireType::VarInt).unwrap();
    writer.encode_varint(1u32).unwrap();
    assert_eq!(writer.bytes_written(), 1 + 2 + 5000 + 2);
    assert_eq!(
        writer.bytes_committed() + writer.bytes_pending() as u64,
        writer.bytes_written()
    );
    writer.dispose().unwrap();
    assert!(writer.is_disposed());
    drop(writer);
    assert_eq!(out.len(), 5005);
    assert_eq!(&out[..3], &[0x0a, 0x88, 0x27]);
}

#[test]
fn test_disposed_writer_rejects_writes() {
    let mut out = BytesMut::new();
    let mut writer = WireWriter::new(&mut out);
    writer.dispose().unwrap();
    assert!(matches!(
        writer.encode_varint(1u32),
        Err(WireError::WriterDisposed)
    ));
}

#[test]
fn test_abandon_discards_pending_bytes() {
    let mut out = BytesMut::new();
    let mut writer = WireWriter::new(&mut out);
    writer.write_raw_bytes(b"partial").unwrap();
    let segment = writer.abandon();
    assert!(segment.is_empty());
    assert!(out.is_empty());
}

#[test]
fn test_fixed_capacity_sink_overflow() {
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
    drop(writer.abandon());
}

#[test]
fn test_peek_then_skip() {
    let bytes = [0x10, 0x01, 0x08, 0x02];
    let mut reader = WireReader::new(&bytes);
    assert_eq!(reader.peek_tag().unwrap().field_number(), 2);
    assert_eq!(reader.position(), 0);
    let tag = reader.decode_tag().unwrap();
    reader.skip_field(tag.wire_type()).unwrap();
    assert_eq!(reader.peek_tag().unwrap().field_number(), 1);
    assert_eq!(reader.consumed_since(0), &[0x10, 0x01]);
}

#[test]
fn test_truncated_length_delimited() {
    let mut reader = WireReader::new(&[0x05, b'a', b'b']);
    assert!(matches!(
        reader.read_length_delimited(),
        Err(WireError::InsufficientData {
            needed: 5,
            remaining: 2
        })
    ));
}
