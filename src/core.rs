//! Value converters.
//!
//! [`WireField`] is implemented for every member type a field table can hold: primitives,
//! strings and byte buffers, `Option`, `Box`, repeated `Vec`, `VecDeque`, `BTreeSet` and
//! `HashSet` members, maps, dynamic nodes and (through the derive macros) nested messages and
//! enums.

use crate::metadata::{FieldSpec, MapSpec, ValueSpec};
use crate::polymorphic::Discriminator;
use crate::reader::WireReader;
use crate::registry::TypeRegistry;
use crate::varint::{VarInt, ZigZag, MAX_VARINT_LEN};
use crate::wire::{NumberHandling, WireType};
use crate::writer::WireWriter;
use crate::{Result, WireError};
use bytes::Bytes;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Natural representation of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarKind {
    pub wire_type: WireType,
    /// Integers accept number handling flags; everything else rejects them.
    pub numeric: bool,
}

impl ScalarKind {
    pub const fn new(wire_type: WireType, numeric: bool) -> Self {
        Self { wire_type, numeric }
    }
}

/// Key and value kinds of a map member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapKind {
    pub key: ScalarKind,
    pub value: ScalarKind,
}

/// How a member type is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// One tagged value.
    Scalar(ScalarKind),
    /// One tagged value per element.
    Repeated(ScalarKind),
    /// Dynamic node; the wire type is declared on the member.
    Node,
    /// Dynamic node array; the wire type is declared on the member.
    RepeatedNode,
    /// One length-delimited entry message per key/value pair.
    Map(MapKind),
    /// The type cannot be a member; carries the reason.
    Unsupported(&'static str),
}

impl WireKind {
    const VARINT_INTEGER: Self = WireKind::Scalar(ScalarKind::new(WireType::VarInt, true));
    const LENGTH_DELIMITED: Self =
        WireKind::Scalar(ScalarKind::new(WireType::LengthDelimited, false));

    /// The natural kind of a value used as a map key or value.
    pub fn scalar(self) -> Option<ScalarKind> {
        match self {
            WireKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Converter between a member type and its wire representation.
pub trait WireField: Sized + 'static {
    fn wire_kind() -> WireKind;

    /// Writes the value body. The tag has already been written.
    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()>;

    /// Reads a value body. The tag has already been consumed.
    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<Self>;

    /// Writes the complete field: tag and value, or one tag per element for repeated members.
    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        writer.encode_tag(spec.number, spec.wire_type)?;
        self.write_value(spec.value(), writer, registry)
    }

    /// Applies one occurrence of the field to `slot`. Scalars replace, collections append.
    fn merge_field(
        slot: &mut Self,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        *slot = Self::read_value(spec.value(), reader, registry)?;
        Ok(())
    }

    /// Whether the value equals the default of its type.
    fn is_default(&self) -> bool;

    fn should_serialize(&self, ignore_default_fields: bool) -> bool {
        !(ignore_default_fields && self.is_default())
    }

    /// The value as a polymorphic discriminator, for integer, enum and string members.
    fn discriminator(&self) -> Option<Discriminator> {
        None
    }
}

fn mismatch<T>(wire_type: WireType) -> WireError {
    WireError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        wire_type,
    }
}

/// Integer operations shared by all number handling modes.
pub(crate) trait Integer: VarInt + Default + PartialEq + 'static {
    /// Zig-zag mapping at the declared width, zero-extended.
    fn zigzag_bits(self) -> u64;
    fn from_zigzag_bits(bits: u64) -> Self;
    /// Sign-extended (or zero-extended) 64-bit pattern.
    fn fixed64_bits(self) -> u64;
    fn from_fixed64_bits(bits: u64) -> Self;
    /// Widens a fixed32 pattern, sign-extending for signed types.
    fn from_fixed32_bits(bits: u32) -> Self;
    fn as_i64(self) -> i64;
}

macro_rules! impl_integer {
    ($($ty:ty => $signed:ty, $unsigned:ty, $wide:ty, $narrow:ty);* $(;)?) => {
        $(
            impl Integer for $ty {
                #[inline]
                fn zigzag_bits(self) -> u64 {
                    (self as $signed).zigzag_encode() as u64
                }

                #[inline]
                fn from_zigzag_bits(bits: u64) -> Self {
                    <$signed>::zigzag_decode(bits as $unsigned) as $ty
                }

                #[inline]
                fn fixed64_bits(self) -> u64 {
                    self as $wide as u64
                }

                #[inline]
                fn from_fixed64_bits(bits: u64) -> Self {
                    bits as $wide as $ty
                }

                #[inline]
                fn from_fixed32_bits(bits: u32) -> Self {
                    bits as $narrow as $ty
                }

                #[inline]
                fn as_i64(self) -> i64 {
                    self as i64
                }
            }

            impl WireField for $ty {
                fn wire_kind() -> WireKind {
                    WireKind::VARINT_INTEGER
                }

                fn write_value(
                    &self,
                    spec: ValueSpec,
                    writer: &mut WireWriter<'_>,
                    _registry: &TypeRegistry,
                ) -> Result<()> {
                    write_integer(*self, spec, writer)
                }

                fn read_value(
                    spec: ValueSpec,
                    reader: &mut WireReader<'_>,
                    _registry: &TypeRegistry,
                ) -> Result<Self> {
                    read_integer(spec, reader)
                }

                fn is_default(&self) -> bool {
                    *self == 0
                }

                fn discriminator(&self) -> Option<Discriminator> {
                    Some(Discriminator::Number(self.as_i64()))
                }
            }
        )*
    };
}

impl_integer! {
    u8 => i8, u8, u64, u32;
    i8 => i8, u8, i64, i32;
    u16 => i16, u16, u64, u32;
    i16 => i16, u16, i64, i32;
    u32 => i32, u32, u64, u32;
    i32 => i32, u32, i64, i32;
    u64 => i64, u64, u64, u32;
    i64 => i64, u64, i64, i32;
}

/// Writes an integer body according to the wire type and number handling in `spec`.
pub(crate) fn write_integer<T: Integer>(
    value: T,
    spec: ValueSpec,
    writer: &mut WireWriter<'_>,
) -> Result<()> {
    let signed = spec.handling.contains(NumberHandling::SIGNED);
    match spec.wire_type {
        WireType::VarInt if signed => writer.encode_raw_varint(value.zigzag_bits()),
        WireType::VarInt => writer.encode_raw_varint(value.to_wire()),
        WireType::Fixed32 if signed => writer.encode_fixed32(value.zigzag_bits() as u32),
        WireType::Fixed32 => writer.encode_fixed32(value.fixed64_bits() as u32),
        WireType::Fixed64 if signed => writer.encode_fixed64(value.zigzag_bits()),
        WireType::Fixed64 => writer.encode_fixed64(value.fixed64_bits()),
        WireType::LengthDelimited => Err(mismatch::<T>(spec.wire_type)),
    }
}

/// Reads an integer body according to the wire type and number handling in `spec`.
pub(crate) fn read_integer<T: Integer>(spec: ValueSpec, reader: &mut WireReader<'_>) -> Result<T> {
    let signed = spec.handling.contains(NumberHandling::SIGNED);
    match spec.wire_type {
        WireType::VarInt => {
            let raw = reader.decode_raw_varint(T::MAX_BYTES)?;
            Ok(if signed {
                T::from_zigzag_bits(raw)
            } else {
                T::from_wire(raw)
            })
        }
        WireType::Fixed32 => {
            let raw: u32 = reader.decode_fixed32()?;
            Ok(if signed {
                T::from_zigzag_bits(raw as u64)
            } else {
                T::from_fixed32_bits(raw)
            })
        }
        WireType::Fixed64 => {
            let raw: u64 = reader.decode_fixed64()?;
            Ok(if signed {
                T::from_zigzag_bits(raw)
            } else {
                T::from_fixed64_bits(raw)
            })
        }
        WireType::LengthDelimited => Err(mismatch::<T>(spec.wire_type)),
    }
}

impl WireField for bool {
    fn wire_kind() -> WireKind {
        WireKind::Scalar(ScalarKind::new(WireType::VarInt, false))
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::VarInt => writer.write_raw_byte(*self as u8),
            other => Err(mismatch::<bool>(other)),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::VarInt => Ok(reader.decode_raw_varint(MAX_VARINT_LEN)? != 0),
            other => Err(mismatch::<bool>(other)),
        }
    }

    fn is_default(&self) -> bool {
        !*self
    }
}

impl WireField for f32 {
    fn wire_kind() -> WireKind {
        WireKind::Scalar(ScalarKind::new(WireType::Fixed32, false))
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::Fixed32 => writer.encode_fixed32(*self),
            WireType::Fixed64 => writer.encode_fixed64(*self as f64),
            other => Err(mismatch::<f32>(other)),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::Fixed32 => reader.decode_fixed32::<f32>(),
            WireType::Fixed64 => Ok(reader.decode_fixed64::<f64>()? as f32),
            other => Err(mismatch::<f32>(other)),
        }
    }

    fn is_default(&self) -> bool {
        self.to_bits() == 0
    }
}

impl WireField for f64 {
    fn wire_kind() -> WireKind {
        WireKind::Scalar(ScalarKind::new(WireType::Fixed64, false))
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::Fixed64 => writer.encode_fixed64(*self),
            WireType::Fixed32 => writer.encode_fixed32(*self as f32),
            other => Err(mismatch::<f64>(other)),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::Fixed64 => reader.decode_fixed64::<f64>(),
            WireType::Fixed32 => Ok(reader.decode_fixed32::<f32>()? as f64),
            other => Err(mismatch::<f64>(other)),
        }
    }

    fn is_default(&self) -> bool {
        self.to_bits() == 0
    }
}

impl WireField for String {
    fn wire_kind() -> WireKind {
        WireKind::LENGTH_DELIMITED
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::LengthDelimited => writer.encode_string(self),
            other => Err(mismatch::<String>(other)),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::LengthDelimited => Ok(reader.decode_string()?.to_owned()),
            other => Err(mismatch::<String>(other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }

    fn discriminator(&self) -> Option<Discriminator> {
        Some(Discriminator::Text(self.clone()))
    }
}

impl WireField for Bytes {
    fn wire_kind() -> WireKind {
        WireKind::LENGTH_DELIMITED
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::LengthDelimited => writer.encode_bytes(self),
            other => Err(mismatch::<Bytes>(other)),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::LengthDelimited => Ok(Bytes::copy_from_slice(reader.read_length_delimited()?)),
            other => Err(mismatch::<Bytes>(other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

/// `Vec<u8>` is a single length-delimited byte field; every other `Vec<T>` is a repeated field
/// with one tag per element.
impl<T: WireField> WireField for Vec<T> {
    fn wire_kind() -> WireKind {
        if is_byte_vec::<T>() {
            return WireKind::LENGTH_DELIMITED;
        }
        match T::wire_kind() {
            WireKind::Scalar(kind) => WireKind::Repeated(kind),
            WireKind::Node => WireKind::RepeatedNode,
            _ => WireKind::Unsupported("repeated members cannot nest collections"),
        }
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) if spec.wire_type == WireType::LengthDelimited => {
                writer.encode_bytes(bytes)
            }
            Some(_) => Err(mismatch::<Vec<u8>>(spec.wire_type)),
            None => Err(WireError::Encode(
                "repeated members cannot nest collections".to_string(),
            )),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        if is_byte_vec::<T>() {
            if spec.wire_type != WireType::LengthDelimited {
                return Err(mismatch::<Vec<u8>>(spec.wire_type));
            }
            let bytes: Box<dyn Any> = Box::new(reader.read_length_delimited()?.to_vec());
            return bytes
                .downcast::<Vec<T>>()
                .map(|v| *v)
                .map_err(|_| WireError::Decode("byte vector conversion failed".to_string()));
        }
        Ok(vec![T::read_value(spec, reader, registry)?])
    }

    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        if is_byte_vec::<T>() {
            writer.encode_tag(spec.number, spec.wire_type)?;
            return self.write_value(spec.value(), writer, registry);
        }
        for item in self {
            item.write_field(spec, writer, registry)?;
        }
        Ok(())
    }

    fn merge_field(
        slot: &mut Self,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        if is_byte_vec::<T>() {
            *slot = Self::read_value(spec.value(), reader, registry)?;
        } else {
            slot.push(T::read_value(spec.value(), reader, registry)?);
        }
        Ok(())
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }

    fn should_serialize(&self, _ignore_default_fields: bool) -> bool {
        !self.is_empty()
    }
}

/// Repeated members backed by a queue or set; one tag per element, in iteration order.
macro_rules! impl_repeated_collection {
    ($($coll:ident => $insert:ident, [$($bound:tt)*]);* $(;)?) => {
        $(
            impl<T> WireField for $coll<T>
            where
                T: WireField $($bound)*,
            {
                fn wire_kind() -> WireKind {
                    match T::wire_kind() {
                        WireKind::Scalar(kind) => WireKind::Repeated(kind),
                        _ => WireKind::Unsupported("repeated members cannot nest collections"),
                    }
                }

                fn write_value(
                    &self,
                    _spec: ValueSpec,
                    _writer: &mut WireWriter<'_>,
                    _registry: &TypeRegistry,
                ) -> Result<()> {
                    Err(WireError::Encode(
                        "repeated members cannot nest collections".to_string(),
                    ))
                }

                fn read_value(
                    spec: ValueSpec,
                    reader: &mut WireReader<'_>,
                    registry: &TypeRegistry,
                ) -> Result<Self> {
                    let mut collection = $coll::new();
                    collection.$insert(T::read_value(spec, reader, registry)?);
                    Ok(collection)
                }

                fn write_field(
                    &self,
                    spec: &FieldSpec,
                    writer: &mut WireWriter<'_>,
                    registry: &TypeRegistry,
                ) -> Result<()> {
                    for item in self {
                        item.write_field(spec, writer, registry)?;
                    }
                    Ok(())
                }

                fn merge_field(
                    slot: &mut Self,
                    spec: &FieldSpec,
                    reader: &mut WireReader<'_>,
                    registry: &TypeRegistry,
                ) -> Result<()> {
                    slot.$insert(T::read_value(spec.value(), reader, registry)?);
                    Ok(())
                }

                fn is_default(&self) -> bool {
                    self.is_empty()
                }

                fn should_serialize(&self, _ignore_default_fields: bool) -> bool {
                    !self.is_empty()
                }
            }
        )*
    };
}

impl_repeated_collection! {
    VecDeque => push_back, [];
    BTreeSet => insert, [+ Ord];
    HashSet => insert, [+ Eq + Hash];
}

#[inline]
fn is_byte_vec<T: 'static>() -> bool {
    std::any::TypeId::of::<T>() == std::any::TypeId::of::<u8>()
}

/// Absent values are never written.
impl<T: WireField> WireField for Option<T> {
    fn wire_kind() -> WireKind {
        T::wire_kind()
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self {
            Some(value) => value.write_value(spec, writer, registry),
            None => Err(WireError::Encode(
                "absent optional value cannot be written".to_string(),
            )),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        T::read_value(spec, reader, registry).map(Some)
    }

    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self {
            Some(value) => value.write_field(spec, writer, registry),
            None => Ok(()),
        }
    }

    fn merge_field(
        slot: &mut Self,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match slot {
            Some(value) => T::merge_field(value, spec, reader, registry),
            None => {
                *slot = Some(T::read_value(spec.value(), reader, registry)?);
                Ok(())
            }
        }
    }

    fn is_default(&self) -> bool {
        self.is_none()
    }

    fn should_serialize(&self, _ignore_default_fields: bool) -> bool {
        self.is_some()
    }

    fn discriminator(&self) -> Option<Discriminator> {
        self.as_ref().and_then(WireField::discriminator)
    }
}

impl<T: WireField> WireField for Box<T> {
    fn wire_kind() -> WireKind {
        T::wire_kind()
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        (**self).write_value(spec, writer, registry)
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        T::read_value(spec, reader, registry).map(Box::new)
    }

    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        (**self).write_field(spec, writer, registry)
    }

    fn merge_field(
        slot: &mut Self,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        T::merge_field(&mut **slot, spec, reader, registry)
    }

    fn is_default(&self) -> bool {
        (**self).is_default()
    }

    fn should_serialize(&self, ignore_default_fields: bool) -> bool {
        (**self).should_serialize(ignore_default_fields)
    }

    fn discriminator(&self) -> Option<Discriminator> {
        (**self).discriminator()
    }
}

/// Natural value spec of a map key or value type.
fn natural_spec<T: WireField>() -> ValueSpec {
    let wire_type = T::wire_kind()
        .scalar()
        .map_or(WireType::LengthDelimited, |kind| kind.wire_type);
    ValueSpec::new(wire_type, NumberHandling::NONE)
}

fn map_spec<K: WireField, V: WireField>(spec: &FieldSpec) -> MapSpec {
    spec.map.unwrap_or_else(|| MapSpec {
        key: natural_spec::<K>(),
        value: natural_spec::<V>(),
    })
}

/// Map kind shared by all map implementations.
pub(crate) fn map_kind<K: WireField, V: WireField>() -> WireKind {
    match (K::wire_kind(), V::wire_kind()) {
        (WireKind::Scalar(key), WireKind::Scalar(value)) => WireKind::Map(MapKind { key, value }),
        _ => WireKind::Unsupported("map keys and values must be single values"),
    }
}

/// Writes one entry message per pair: key under field 1, value under field 2.
pub(crate) fn write_map_entries<'m, K, V, I>(
    entries: I,
    spec: &FieldSpec,
    writer: &mut WireWriter<'_>,
    registry: &TypeRegistry,
) -> Result<()>
where
    K: WireField,
    V: WireField,
    I: IntoIterator<Item = (&'m K, &'m V)>,
{
    let map = map_spec::<K, V>(spec);
    for (key, value) in entries {
        writer.encode_tag(spec.number, WireType::LengthDelimited)?;
        writer.encode_nested(|entry| {
            entry.encode_tag(1, map.key.wire_type)?;
            key.write_value(map.key, entry, registry)?;
            entry.encode_tag(2, map.value.wire_type)?;
            value.write_value(map.value, entry, registry)
        })?;
    }
    Ok(())
}

/// Reads one entry message. Missing keys or values take their defaults.
pub(crate) fn read_map_entry<K, V>(
    spec: &FieldSpec,
    reader: &mut WireReader<'_>,
    registry: &TypeRegistry,
) -> Result<(K, V)>
where
    K: WireField + Default,
    V: WireField + Default,
{
    let map = map_spec::<K, V>(spec);
    let mut entry = WireReader::new(reader.read_length_delimited()?);
    let mut key = K::default();
    let mut value = V::default();
    while !entry.is_completed() {
        let tag = entry.decode_tag()?;
        match tag.field_number() {
            1 if tag.wire_type() == map.key.wire_type => {
                key = K::read_value(map.key, &mut entry, registry)?;
            }
            2 if tag.wire_type() == map.value.wire_type => {
                value = V::read_value(map.value, &mut entry, registry)?;
            }
            _ => entry.skip_field(tag.wire_type())?,
        }
    }
    Ok((key, value))
}

macro_rules! map_field_body {
    () => {
        fn wire_kind() -> WireKind {
            map_kind::<K, V>()
        }

        fn write_value(
            &self,
            _spec: ValueSpec,
            _writer: &mut WireWriter<'_>,
            _registry: &TypeRegistry,
        ) -> Result<()> {
            Err(WireError::Encode(
                "map members cannot be nested in collections".to_string(),
            ))
        }

        fn read_value(
            _spec: ValueSpec,
            _reader: &mut WireReader<'_>,
            _registry: &TypeRegistry,
        ) -> Result<Self> {
            Err(WireError::Decode(
                "map members cannot be nested in collections".to_string(),
            ))
        }

        fn write_field(
            &self,
            spec: &FieldSpec,
            writer: &mut WireWriter<'_>,
            registry: &TypeRegistry,
        ) -> Result<()> {
            write_map_entries(self.iter(), spec, writer, registry)
        }

        fn merge_field(
            slot: &mut Self,
            spec: &FieldSpec,
            reader: &mut WireReader<'_>,
            registry: &TypeRegistry,
        ) -> Result<()> {
            let (key, value) = read_map_entry::<K, V>(spec, reader, registry)?;
            slot.insert(key, value);
            Ok(())
        }

        fn is_default(&self) -> bool {
            self.is_empty()
        }

        fn should_serialize(&self, _ignore_default_fields: bool) -> bool {
            !self.is_empty()
        }
    };
}
#[cfg(feature = "indexmap")]
pub(crate) use map_field_body;

impl<K, V> WireField for HashMap<K, V>
where
    K: WireField + Default + Eq + Hash,
    V: WireField + Default,
{
    map_field_body!();
}

impl<K, V> WireField for BTreeMap<K, V>
where
    K: WireField + Default + Ord,
    V: WireField + Default,
{
    map_field_body!();
}

/// Fieldless enums carried as an `i32` varint.
///
/// Implemented by `#[derive(WireEnum)]`, which also generates the [`WireField`] impl.
pub trait WireEnum: Copy + 'static {
    const NAME: &'static str;

    fn to_i32(self) -> i32;
    fn from_i32(value: i32) -> Option<Self>;
}

pub fn write_enum<E: WireEnum>(value: E, spec: ValueSpec, writer: &mut WireWriter<'_>) -> Result<()> {
    write_integer(value.to_i32(), spec, writer)
}

pub fn read_enum<E: WireEnum>(spec: ValueSpec, reader: &mut WireReader<'_>) -> Result<E> {
    let raw: i32 = read_integer(spec, reader)?;
    E::from_i32(raw).ok_or(WireError::UnknownEnumValue {
        enum_name: E::NAME,
        value: raw,
    })
}

/// The [`WireKind`] of enum members.
pub fn enum_kind() -> WireKind {
    WireKind::VARINT_INTEGER
}
