//! Typed encode/decode entry points.

use crate::metadata::TypeInfo;
use crate::polymorphic::{read_discriminators, write_discriminators};
use crate::reader::WireReader;
use crate::registry::TypeRegistry;
use crate::writer::{pool, WireWriter};
use crate::{Result, WireMessage};
use bytes::{BufMut, Bytes, BytesMut};

/// Serializes and deserializes messages against a [`TypeRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'r> {
    registry: &'r TypeRegistry,
}

impl Serializer<'static> {
    /// A serializer over [`TypeRegistry::global`].
    pub fn global() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Encodes `value` into a new buffer.
    pub fn serialize<T: WireMessage>(&self, value: &T) -> Result<Bytes> {
        let info = self.registry.resolve::<T>()?;
        self.serialize_with(&info, value)
    }

    /// Encodes `value` with an explicit field table.
    pub fn serialize_with<T: 'static>(&self, info: &TypeInfo<T>, value: &T) -> Result<Bytes> {
        let mut out = BytesMut::new();
        self.encode_into(info, value, &mut out)?;
        Ok(out.freeze())
    }

    /// Encodes `value` into `sink`, returning the number of bytes written.
    pub fn serialize_into<T: WireMessage>(&self, value: &T, sink: &mut dyn BufMut) -> Result<u64> {
        let info = self.registry.resolve::<T>()?;
        self.encode_into(&info, value, sink)
    }

    fn encode_into<T: 'static>(
        &self,
        info: &TypeInfo<T>,
        value: &T,
        sink: &mut dyn BufMut,
    ) -> Result<u64> {
        let mut writer = WireWriter::with_segment(sink, pool::rent());
        if let Err(e) = encode_object(info, value, &mut writer, self.registry) {
            pool::give_back(writer.abandon());
            return Err(e);
        }
        let written = writer.bytes_written();
        pool::give_back(writer.into_segment()?);
        tracing::trace!(type_name = info.name(), bytes = written, "serialized message");
        Ok(written)
    }

    /// Decodes a `T` from `data`.
    pub fn deserialize<T: WireMessage>(&self, data: &[u8]) -> Result<T> {
        let info = self.registry.resolve::<T>()?;
        self.deserialize_with(&info, data)
    }

    /// Decodes a `T` with an explicit field table.
    pub fn deserialize_with<T: 'static>(&self, info: &TypeInfo<T>, data: &[u8]) -> Result<T> {
        let mut reader = WireReader::new(data);
        let value = decode_object(info, &mut reader, self.registry)?;
        tracing::trace!(type_name = info.name(), bytes = data.len(), "deserialized message");
        Ok(value)
    }
}

/// Writes every field of `value`: discriminators first, then the remaining fields in field
/// number order.
pub fn encode_object<T: 'static>(
    info: &TypeInfo<T>,
    value: &T,
    writer: &mut WireWriter<'_>,
    registry: &TypeRegistry,
) -> Result<()> {
    let resolved = write_discriminators(info, value, writer, registry)?;
    for field in resolved.fields.iter() {
        if resolved.leading.contains(&field.tag()) {
            continue;
        }
        if field.should_serialize(value, resolved.ignore_default_fields) {
            field.write(value, writer, registry)?;
        }
    }
    Ok(())
}

/// Reads fields until the input is exhausted. Unknown fields are skipped.
pub fn decode_object<T: 'static>(
    info: &TypeInfo<T>,
    reader: &mut WireReader<'_>,
    registry: &TypeRegistry,
) -> Result<T> {
    let (mut target, resolved) = read_discriminators(info, reader, registry)?;
    while !reader.is_completed() {
        let tag = reader.decode_tag()?;
        match resolved.fields.get(tag.raw()) {
            Some(field) => field.merge(&mut target, reader, registry)?,
            None => {
                tracing::trace!(
                    type_name = info.name(),
                    field = tag.field_number(),
                    wire_type = %tag.wire_type(),
                    "skipping unknown field"
                );
                reader.skip_field(tag.wire_type())?;
            }
        }
    }
    Ok(target)
}

/// Writes `value` as a length-delimited nested message body.
pub fn write_nested<T: WireMessage>(
    value: &T,
    writer: &mut WireWriter<'_>,
    registry: &TypeRegistry,
) -> Result<()> {
    let info = registry.resolve::<T>()?;
    writer.encode_nested(|inner| encode_object(&info, value, inner, registry))
}

/// Reads a length-delimited nested message body.
pub fn read_nested<T: WireMessage>(reader: &mut WireReader<'_>, registry: &TypeRegistry) -> Result<T> {
    let data = reader.read_length_delimited()?;
    let info = registry.resolve::<T>()?;
    decode_object(&info, &mut WireReader::new(data), registry)
}
