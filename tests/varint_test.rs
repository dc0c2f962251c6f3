use proptest::prelude::*;
use wirepack::varint::{
    decode_two_u32_varint, decode_varint, encode_two_u32_varint, encode_varint, varint_len,
    VarInt, ZigZag, MAX_VARINT_LEN,
};
use wirepack::{WireError, WireReader, WireWriter};

fn encoded(value: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_varint(&mut buf, value);
    buf
}

// =============================================================================
// Known encodings
// =============================================================================

#[test]
fn test_known_varint_encodings() {
    assert_eq!(encoded(0), vec![0x00]);
    assert_eq!(encoded(1), vec![0x01]);
    assert_eq!(encoded(127), vec![0x7f]);
    assert_eq!(encoded(128), vec![0x80, 0x01]);
    assert_eq!(encoded(300), vec![0xac, 0x02]);
    assert_eq!(encoded(16_383), vec![0xff, 0x7f]);
    assert_eq!(encoded(16_384), vec![0x80, 0x80, 0x01]);
    assert_eq!(encoded(u32::MAX as u64), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    assert_eq!(
        encoded(u64::MAX),
        vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
    );
}

#[test]
fn test_varint_len_boundaries() {
    let cases = [
        (0u64, 1),
        (0x7f, 1),
        (0x80, 2),
        (0x3fff, 2),
        (0x4000, 3),
        (0x1f_ffff, 3),
        (0x20_0000, 4),
        (0xfff_ffff, 4),
        (0x1000_0000, 5),
        (u32::MAX as u64, 5),
        (1 << 35, 6),
        (1 << 56, 9),
        (1 << 63, 10),
        (u64::MAX, MAX_VARINT_LEN),
    ];
    for (value, len) in cases {
        assert_eq!(varint_len(value), len, "length of {value:#x}");
        assert_eq!(encoded(value).len(), len, "encoding of {value:#x}");
    }
}

#[test]
fn test_negative_i32_takes_five_bytes() {
    let raw = (-1i32).to_wire();
    assert_eq!(raw, u32::MAX as u64);
    assert_eq!(encoded(raw), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);

    let raw = (-1i64).to_wire();
    assert_eq!(encoded(raw).len(), 10);
}

// =============================================================================
// Zig-zag
// =============================================================================

#[test]
fn test_zigzag_known_values() {
    assert_eq!(0i32.zigzag_encode(), 0);
    assert_eq!((-1i32).zigzag_encode(), 1);
    assert_eq!(1i32.zigzag_encode(), 2);
    assert_eq!((-2i32).zigzag_encode(), 3);
    assert_eq!(i32::MAX.zigzag_encode(), u32::MAX - 1);
    assert_eq!(i32::MIN.zigzag_encode(), u32::MAX);
    assert_eq!(i8::MIN.zigzag_encode(), u8::MAX);
    assert_eq!(i64::MIN.zigzag_encode(), u64::MAX);
}

#[test]
fn test_zigzag_bijection_narrow_widths() {
    let mut seen = vec![false; 1 << 8];
    for value in i8::MIN..=i8::MAX {
        let encoded = value.zigzag_encode();
        assert_eq!(i8::zigzag_decode(encoded), value);
        assert!(!seen[encoded as usize]);
        seen[encoded as usize] = true;
    }
    assert!(seen.iter().all(|s| *s));

    let mut seen = vec![false; 1 << 16];
    for value in i16::MIN..=i16::MAX {
        let encoded = value.zigzag_encode();
        assert_eq!(i16::zigzag_decode(encoded), value);
        assert!(!seen[encoded as usize]);
        seen[encoded as usize] = true;
    }
    assert!(seen.iter().all(|s| *s));
}

proptest! {
    #[test]
    fn prop_zigzag_i32_roundtrip(value in any::<i32>()) {
        prop_assert_eq!(i32::zigzag_decode(value.zigzag_encode()), value);
    }

    #[test]
    fn prop_zigzag_i64_roundtrip(value in any::<i64>()) {
        prop_assert_eq!(i64::zigzag_decode(value.zigzag_encode()), value);
    }

    #[test]
    fn prop_zigzag_small_magnitudes_stay_small(value in -64i32..64) {
        prop_assert_eq!(varint_len(value.zigzag_encode() as u64), 1);
    }

    #[test]
    fn prop_decode_inverts_encode(value in any::<u64>()) {
        let bytes = encoded(value);
        prop_assert_eq!(bytes.len(), varint_len(value));
        let (decoded, consumed) = decode_varint(&bytes, MAX_VARINT_LEN).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, bytes.len());
    }

    // =========================================================================
    // Dual encoding
    // =========================================================================

    #[test]
    fn prop_dual_encode_matches_sequential(first in any::<u32>(), second in any::<u32>()) {
        let mut dual = Vec::new();
        encode_two_u32_varint(&mut dual, first, second);
        let mut sequential = encoded(first as u64);
        sequential.extend(encoded(second as u64));
        prop_assert_eq!(&dual, &sequential);

        let ((a, b), consumed) = decode_two_u32_varint(&dual).unwrap();
        prop_assert_eq!((a, b), (first, second));
        prop_assert_eq!(consumed, dual.len());
    }

    #[test]
    fn prop_dual_encode_small_pairs(first in 0u32..0x80, second in 0u32..0x80) {
        let mut dual = Vec::new();
        encode_two_u32_varint(&mut dual, first, second);
        prop_assert_eq!(dual, vec![first as u8, second as u8]);
    }
}

#[test]
fn test_dual_encode_length_combinations() {
    let samples = [0u32, 0x7f, 0x80, 0x3fff, 0x4000, 0x1f_ffff, 0x20_0000, 0xfff_ffff, u32::MAX];
    for &first in &samples {
        for &second in &samples {
            let mut dual = Vec::new();
            encode_two_u32_varint(&mut dual, first, second);
            let mut sequential = encoded(first as u64);
            sequential.extend(encoded(second as u64));
            assert_eq!(dual, sequential, "pair ({first:#x}, {second:#x})");
        }
    }
}

// =============================================================================
// Malformed input
// =============================================================================

#[test]
fn test_truncated_varint() {
    let result = decode_varint(&[0x80, 0x80], MAX_VARINT_LEN);
    assert!(matches!(
        result,
        Err(WireError::InsufficientData { remaining: 2, .. })
    ));
    assert!(matches!(
        decode_varint(&[], MAX_VARINT_LEN),
        Err(WireError::InsufficientData { .. })
    ));
}

#[test]
fn test_overlong_varint_for_declared_width() {
    let six_bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
    assert!(matches!(
        decode_varint(&six_bytes, u32::MAX_BYTES),
        Err(WireError::MalformedVarInt { max_bytes: 5 })
    ));
    assert!(decode_varint(&six_bytes, u64::MAX_BYTES).is_ok());

    let eleven = [0xffu8; 11];
    assert!(matches!(
        decode_varint(&eleven, MAX_VARINT_LEN),
        Err(WireError::MalformedVarInt { .. })
    ));
}

#[test]
fn test_reader_enforces_width_of_target_type() {
    let mut reader = WireReader::new(&[0xff, 0xff, 0x03]);
    assert_eq!(reader.decode_varint::<u16>().unwrap(), u16::MAX);

    let mut reader = WireReader::new(&[0x80, 0x80, 0x80, 0x01]);
    assert!(matches!(
        reader.decode_varint::<u16>(),
        Err(WireError::MalformedVarInt { max_bytes: 3 })
    ));
}

#[test]
fn test_writer_dual_encode_matches_varint_calls() {
    let mut dual = Vec::new();
    let mut writer = WireWriter::new(&mut dual);
    writer.encode_two_u32_varint(300, 70_000).unwrap();
    writer.dispose().unwrap();
    drop(writer);

    let mut single = Vec::new();
    let mut writer = WireWriter::new(&mut single);
    writer.encode_varint(300u32).unwrap();
    writer.encode_varint(70_000u32).unwrap();
    writer.dispose().unwrap();
    drop(writer);

    assert_eq!(dual, single);
}
