//! Base-128 varint, zig-zag and fixed-width primitives.
//!
//! Signed integers are encoded as the unsigned bit pattern of their declared width, so an `i32`
//! of `-1` takes five bytes rather than the ten bytes some protobuf encoders emit. Decoding is
//! bounded by the declared width: more than 2, 3, 5 or 10 bytes for an 8, 16, 32 or 64-bit
//! type is a [`WireError::MalformedVarInt`].

use crate::{Result, WireError};
use bytes::BufMut;

/// Maximum encoded length of any varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Integer types that can travel as a varint.
pub trait VarInt: Copy + Sized {
    /// Maximum number of bytes a varint of this width may occupy.
    const MAX_BYTES: usize;

    /// The unsigned bit pattern of the declared width, zero-extended.
    fn to_wire(self) -> u64;

    /// Truncates a decoded value back to the declared width.
    fn from_wire(value: u64) -> Self;
}

macro_rules! impl_varint {
    ($($ty:ty => $unsigned:ty, $max:expr);* $(;)?) => {
        $(
            impl VarInt for $ty {
                const MAX_BYTES: usize = $max;

                #[inline]
                fn to_wire(self) -> u64 {
                    self as $unsigned as u64
                }

                #[inline]
                fn from_wire(value: u64) -> Self {
                    value as $unsigned as $ty
                }
            }
        )*
    };
}

impl_varint! {
    u8 => u8, 2;
    i8 => u8, 2;
    u16 => u16, 3;
    i16 => u16, 3;
    u32 => u32, 5;
    i32 => u32, 5;
    u64 => u64, 10;
    i64 => u64, 10;
}

/// Signed integers with a zig-zag mapping onto the unsigned type of the same width.
pub trait ZigZag: Copy + Sized {
    type Unsigned: VarInt;

    fn zigzag_encode(self) -> Self::Unsigned;
    fn zigzag_decode(value: Self::Unsigned) -> Self;
}

macro_rules! impl_zigzag {
    ($($ty:ty => $unsigned:ty);* $(;)?) => {
        $(
            impl ZigZag for $ty {
                type Unsigned = $unsigned;

                #[inline]
                fn zigzag_encode(self) -> $unsigned {
                    ((self << 1) ^ (self >> (<$ty>::BITS - 1))) as $unsigned
                }

                #[inline]
                fn zigzag_decode(value: $unsigned) -> $ty {
                    ((value >> 1) as $ty) ^ -((value & 1) as $ty)
                }
            }
        )*
    };
}

impl_zigzag! {
    i8 => u8;
    i16 => u16;
    i32 => u32;
    i64 => u64;
}

/// Values with a 4-byte little-endian representation.
pub trait Fixed32: Copy + Sized {
    fn to_bits32(self) -> u32;
    fn from_bits32(bits: u32) -> Self;
}

/// Values with an 8-byte little-endian representation.
pub trait Fixed64: Copy + Sized {
    fn to_bits64(self) -> u64;
    fn from_bits64(bits: u64) -> Self;
}

impl Fixed32 for u32 {
    fn to_bits32(self) -> u32 {
        self
    }
    fn from_bits32(bits: u32) -> Self {
        bits
    }
}

impl Fixed32 for i32 {
    fn to_bits32(self) -> u32 {
        self as u32
    }
    fn from_bits32(bits: u32) -> Self {
        bits as i32
    }
}

impl Fixed32 for f32 {
    fn to_bits32(self) -> u32 {
        self.to_bits()
    }
    fn from_bits32(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl Fixed64 for u64 {
    fn to_bits64(self) -> u64 {
        self
    }
    fn from_bits64(bits: u64) -> Self {
        bits
    }
}

impl Fixed64 for i64 {
    fn to_bits64(self) -> u64 {
        self as u64
    }
    fn from_bits64(bits: u64) -> Self {
        bits as i64
    }
}

impl Fixed64 for f64 {
    fn to_bits64(self) -> u64 {
        self.to_bits()
    }
    fn from_bits64(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// Number of bytes the varint encoding of `value` occupies (1..=10).
#[inline]
pub fn varint_len(value: u64) -> usize {
    let lz = value.leading_zeros();
    // (70 - lz) / 7 via multiply-shift; the `lz >> 6` term makes zero one byte long.
    ((((70 - lz) * 0b1_0010_0100_1001_0011) >> 19) + (lz >> 6)) as usize
}

/// Spreads the 7-bit groups of a 32-bit value across the bytes of a `u64` and sets the
/// continuation bit on every byte but the last. Returns the word and its encoded length.
#[inline]
fn pack_u32(value: u32) -> (u64, usize) {
    let v = value as u64;
    let stage = (v & 0x7f)
        | ((v & 0x3f80) << 1)
        | ((v & 0x1f_c000) << 2)
        | ((v & 0xfe0_0000) << 3)
        | ((v & 0xf000_0000) << 4);
    let len = varint_len(v);
    let continuation = 0x8080_8080_8080_8080u64 & ((1u64 << (8 * (len - 1))) - 1);
    (stage | continuation, len)
}

/// Writes `value` as a varint.
#[inline]
pub fn encode_varint<B: BufMut + ?Sized>(buf: &mut B, value: u64) {
    if value < 0x80 {
        buf.put_u8(value as u8);
        return;
    }
    if value <= u32::MAX as u64 {
        let (word, len) = pack_u32(value as u32);
        buf.put_slice(&word.to_le_bytes()[..len]);
        return;
    }
    let mut v = value;
    while v >= 0x80 {
        buf.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Writes two 32-bit values as consecutive varints.
///
/// Byte-identical to two [`encode_varint`] calls. With the `simd` feature on x86_64 the two
/// encodings are merged with a single SSSE3 shuffle when the CPU supports it.
#[inline]
pub fn encode_two_u32_varint<B: BufMut + ?Sized>(buf: &mut B, first: u32, second: u32) {
    if first < 0x80 && second < 0x80 {
        buf.put_slice(&[first as u8, second as u8]);
        return;
    }
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("ssse3") {
            let mut out = [0u8; 16];
            // SAFETY: SSSE3 support was verified above.
            let len = unsafe { simd::encode_two(first, second, &mut out) };
            buf.put_slice(&out[..len]);
            return;
        }
    }
    encode_two_u32_varint_scalar(buf, first, second);
}

#[inline]
fn encode_two_u32_varint_scalar<B: BufMut + ?Sized>(buf: &mut B, first: u32, second: u32) {
    encode_varint(buf, first as u64);
    encode_varint(buf, second as u64);
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod simd {
    use std::arch::x86_64::{
        __m128i, _mm_loadu_si128, _mm_set_epi64x, _mm_shuffle_epi8, _mm_storeu_si128,
    };

    /// Shuffle masks indexed by `(len1 - 1) * 8 + (len2 - 1)`. Lanes 0..8 hold the first packed
    /// word and lanes 8..16 the second; the mask gathers `len1` bytes of the first followed by
    /// `len2` bytes of the second and zeroes the rest.
    static SHUFFLE: [[u8; 16]; 64] = build_shuffle_table();

    const fn build_shuffle_table() -> [[u8; 16]; 64] {
        let mut table = [[0x80u8; 16]; 64];
        let mut first = 1;
        while first <= 8 {
            let mut second = 1;
            while second <= 8 {
                let entry = &mut table[(first - 1) * 8 + (second - 1)];
                let mut i = 0;
                while i < 16 {
                    if i < first {
                        entry[i] = i as u8;
                    } else if i < first + second {
                        entry[i] = (8 + i - first) as u8;
                    }
                    i += 1;
                }
                second += 1;
            }
            first += 1;
        }
        table
    }

    #[target_feature(enable = "ssse3")]
    pub(super) unsafe fn encode_two(first: u32, second: u32, out: &mut [u8; 16]) -> usize {
        let (w1, n1) = super::pack_u32(first);
        let (w2, n2) = super::pack_u32(second);
        let lanes = _mm_set_epi64x(w2 as i64, w1 as i64);
        let mask = _mm_loadu_si128(SHUFFLE[(n1 - 1) * 8 + (n2 - 1)].as_ptr() as *const __m128i);
        let merged = _mm_shuffle_epi8(lanes, mask);
        _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, merged);
        n1 + n2
    }
}

/// Decodes a varint of at most `max_bytes` bytes from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
#[inline]
pub fn decode_varint(data: &[u8], max_bytes: usize) -> Result<(u64, usize)> {
    match data.first() {
        Some(&b) if b < 0x80 => return Ok((b as u64, 1)),
        None => {
            return Err(WireError::InsufficientData {
                needed: 1,
                remaining: 0,
            })
        }
        _ => {}
    }
    let mut value = 0u64;
    for i in 0..max_bytes.min(MAX_VARINT_LEN) {
        let Some(&b) = data.get(i) else {
            return Err(WireError::InsufficientData {
                needed: i + 1,
                remaining: data.len(),
            });
        };
        value |= ((b & 0x7f) as u64) << (7 * i);
        if b < 0x80 {
            return Ok((value, i + 1));
        }
    }
    Err(WireError::MalformedVarInt { max_bytes })
}

/// Decodes two consecutive 32-bit varints.
///
/// Returns both values and the total number of bytes consumed.
#[inline]
pub fn decode_two_u32_varint(data: &[u8]) -> Result<((u32, u32), usize)> {
    if let [a, b, ..] = data {
        if *a < 0x80 && *b < 0x80 {
            return Ok(((*a as u32, *b as u32), 2));
        }
    }
    let (first, n1) = decode_varint(data, u32::MAX_BYTES)?;
    let (second, n2) = decode_varint(&data[n1..], u32::MAX_BYTES)?;
    Ok(((first as u32, second as u32), n1 + n2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(&mut buf, value);
        buf
    }

    #[test]
    fn test_varint_len_boundaries() {
        let cases = [
            (0u64, 1usize),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (2_097_151, 3),
            (2_097_152, 4),
            (u32::MAX as u64, 5),
            (u64::MAX, 10),
        ];
        for (value, len) in cases {
            assert_eq!(varint_len(value), len, "length of {value}");
            assert_eq!(encoded(value).len(), len, "encoded length of {value}");
        }
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encoded(1), vec![0x01]);
        assert_eq!(encoded(150), vec![0x96, 0x01]);
        assert_eq!(encoded(300), vec![0xac, 0x02]);
        assert_eq!(encoded(u32::MAX as u64), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn test_negative_i32_uses_five_bytes() {
        let bytes = encoded((-1i32).to_wire());
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
        let (value, len) = decode_varint(&bytes, i32::MAX_BYTES).unwrap();
        assert_eq!(len, 5);
        assert_eq!(i32::from_wire(value), -1);
    }

    #[test]
    fn test_zigzag_known_values() {
        assert_eq!(0i32.zigzag_encode(), 0);
        assert_eq!((-1i32).zigzag_encode(), 1);
        assert_eq!(1i32.zigzag_encode(), 2);
        assert_eq!((-2i32).zigzag_encode(), 3);
        assert_eq!(i32::MAX.zigzag_encode(), u32::MAX - 1);
        assert_eq!(i32::MIN.zigzag_encode(), u32::MAX);
    }

    #[test]
    fn test_zigzag_narrow_widths() {
        assert_eq!(i8::MIN.zigzag_encode(), 255u8);
        assert_eq!(i8::zigzag_decode(255), i8::MIN);
        assert_eq!(i8::MAX.zigzag_encode(), 254u8);
        assert_eq!(i16::MIN.zigzag_encode(), u16::MAX);
        assert_eq!(i16::zigzag_decode(u16::MAX), i16::MIN);
        for v in i8::MIN..=i8::MAX {
            assert_eq!(i8::zigzag_decode(v.zigzag_encode()), v);
        }
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode_varint(&[0x80, 0x80], 10),
            Err(WireError::InsufficientData { .. })
        ));
        assert!(matches!(
            decode_varint(&[], 10),
            Err(WireError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_overlong() {
        let data = [0xffu8; 11];
        assert!(matches!(
            decode_varint(&data, 10),
            Err(WireError::MalformedVarInt { max_bytes: 10 })
        ));
        assert!(matches!(
            decode_varint(&[0x80, 0x80, 0x01], u8::MAX_BYTES),
            Err(WireError::MalformedVarInt { max_bytes: 2 })
        ));
    }

    #[test]
    fn test_shuffle_free_paths_match() {
        let pairs = [
            (0u32, 0u32),
            (1, 127),
            (128, 1),
            (300, 16_384),
            (u32::MAX, 0),
            (u32::MAX, u32::MAX),
        ];
        for (a, b) in pairs {
            let mut dual = Vec::new();
            encode_two_u32_varint(&mut dual, a, b);
            let mut seq = Vec::new();
            encode_two_u32_varint_scalar(&mut seq, a, b);
            assert_eq!(dual, seq, "pair ({a}, {b})");
            let ((x, y), len) = decode_two_u32_varint(&dual).unwrap();
            assert_eq!((x, y, len), (a, b, dual.len()));
        }
    }
}
