//! Schema-less node tree.
//!
//! [`WireObject`] is an ordered multimap from field numbers to nodes. Several entries under one
//! field number form a repeated field: scalar access sees the first occurrence,
//! [`WireObject::get_array`] sees all of them in insertion order.
//!
//! Parsed values keep their raw wire representation ([`RawValue`]) and are converted on access,
//! so a length-delimited value can be read as a string, as bytes or as a nested object.

use crate::core::{WireField, WireKind};
use crate::metadata::{FieldSpec, ValueSpec};
use crate::reader::WireReader;
use crate::registry::TypeRegistry;
use crate::varint::{VarInt, MAX_VARINT_LEN};
use crate::wire::{NumberHandling, WireType};
use crate::writer::WireWriter;
use crate::{Result, WireError};
use bytes::{Bytes, BytesMut};
use std::borrow::Cow;

/// A value as it appeared on the wire, before any type is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// A varint, fixed32 or fixed64 payload, zero-extended.
    Number(u64),
    /// A length-delimited payload.
    Bytes(Bytes),
}

/// A typed or raw leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    Raw(RawValue),
}

impl Scalar {
    /// Wire type used when no explicit one is given.
    pub fn natural_wire_type(&self) -> WireType {
        match self {
            Scalar::F32(_) => WireType::Fixed32,
            Scalar::F64(_) => WireType::Fixed64,
            Scalar::String(_) | Scalar::Bytes(_) | Scalar::Raw(RawValue::Bytes(_)) => {
                WireType::LengthDelimited
            }
            _ => WireType::VarInt,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Scalar::Bool(v) => *v as i128,
            Scalar::I8(v) => *v as i128,
            Scalar::I16(v) => *v as i128,
            Scalar::I32(v) => *v as i128,
            Scalar::I64(v) => *v as i128,
            Scalar::U8(v) => *v as i128,
            Scalar::U16(v) => *v as i128,
            Scalar::U32(v) => *v as i128,
            Scalar::U64(v) => *v as i128,
            _ => return None,
        })
    }
}

macro_rules! impl_scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }

            impl From<$ty> for WireNode {
                fn from(value: $ty) -> Self {
                    WireNode::Value(WireValue::natural(value))
                }
            }
        )*
    };
}

impl_scalar_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Bytes => Bytes,
    RawValue => Raw,
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<&str> for WireNode {
    fn from(value: &str) -> Self {
        WireNode::Value(WireValue::natural(value))
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Scalar::Bytes(Bytes::from(value))
    }
}

impl From<Vec<u8>> for WireNode {
    fn from(value: Vec<u8>) -> Self {
        WireNode::Value(WireValue::natural(value))
    }
}

impl From<&[u8]> for Scalar {
    fn from(value: &[u8]) -> Self {
        Scalar::Bytes(Bytes::copy_from_slice(value))
    }
}

/// A leaf value together with the wire type it is written with.
#[derive(Debug, Clone, PartialEq)]
pub struct WireValue {
    wire_type: WireType,
    value: Scalar,
}

impl WireValue {
    pub fn new(value: impl Into<Scalar>, wire_type: WireType) -> Self {
        Self {
            wire_type,
            value: value.into(),
        }
    }

    /// A value written with the natural wire type of its Rust type.
    pub fn natural(value: impl Into<Scalar>) -> Self {
        let value = value.into();
        Self {
            wire_type: value.natural_wire_type(),
            value,
        }
    }

    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    #[inline]
    pub fn value(&self) -> &Scalar {
        &self.value
    }

    #[inline]
    pub fn is_raw(&self) -> bool {
        matches!(self.value, Scalar::Raw(_))
    }

    /// Converts the stored value to `T`.
    pub fn get<T: FromWireValue>(&self) -> Result<T> {
        T::from_wire_value(self).ok_or(WireError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            wire_type: self.wire_type,
        })
    }

    /// Converts the stored value to `T`, or `None` if the conversion is not supported.
    pub fn try_get<T: FromWireValue>(&self) -> Option<T> {
        T::from_wire_value(self)
    }

    /// Parses a length-delimited payload as a nested object.
    pub fn to_object(&self) -> Result<WireObject> {
        match &self.value {
            Scalar::Raw(RawValue::Bytes(data)) | Scalar::Bytes(data) => WireObject::parse(data),
            _ => Err(WireError::TypeMismatch {
                expected: "WireObject",
                wire_type: self.wire_type,
            }),
        }
    }

    /// Reads a raw value of the given wire type; the tag has been consumed.
    pub(crate) fn read_raw(wire_type: WireType, reader: &mut WireReader<'_>) -> Result<Self> {
        let raw = match wire_type {
            WireType::VarInt => RawValue::Number(reader.decode_raw_varint(MAX_VARINT_LEN)?),
            WireType::Fixed32 => RawValue::Number(reader.decode_fixed32::<u32>()? as u64),
            WireType::Fixed64 => RawValue::Number(reader.decode_fixed64::<u64>()?),
            WireType::LengthDelimited => {
                RawValue::Bytes(Bytes::copy_from_slice(reader.read_length_delimited()?))
            }
        };
        Ok(Self::new(raw, wire_type))
    }

    /// Writes the value body with `wire_type`; the tag has been written.
    pub(crate) fn write_body(&self, wire_type: WireType, writer: &mut WireWriter<'_>) -> Result<()> {
        let spec = ValueSpec::new(wire_type, NumberHandling::NONE);
        let registry = TypeRegistry::global();
        match &self.value {
            Scalar::Bool(v) => v.write_value(spec, writer, registry),
            Scalar::I8(v) => v.write_value(spec, writer, registry),
            Scalar::I16(v) => v.write_value(spec, writer, registry),
            Scalar::I32(v) => v.write_value(spec, writer, registry),
            Scalar::I64(v) => v.write_value(spec, writer, registry),
            Scalar::U8(v) => v.write_value(spec, writer, registry),
            Scalar::U16(v) => v.write_value(spec, writer, registry),
            Scalar::U32(v) => v.write_value(spec, writer, registry),
            Scalar::U64(v) => v.write_value(spec, writer, registry),
            Scalar::F32(v) => v.write_value(spec, writer, registry),
            Scalar::F64(v) => v.write_value(spec, writer, registry),
            Scalar::String(v) => v.write_value(spec, writer, registry),
            Scalar::Bytes(v) => v.write_value(spec, writer, registry),
            Scalar::Raw(RawValue::Number(n)) => match wire_type {
                WireType::VarInt => writer.encode_raw_varint(*n),
                WireType::Fixed32 => writer.encode_fixed32(*n as u32),
                WireType::Fixed64 => writer.encode_fixed64(*n),
                WireType::LengthDelimited => Err(WireError::TypeMismatch {
                    expected: "length-delimited payload",
                    wire_type: self.wire_type,
                }),
            },
            Scalar::Raw(RawValue::Bytes(data)) => match wire_type {
                WireType::LengthDelimited => writer.encode_bytes(data),
                other => Err(WireError::TypeMismatch {
                    expected: "numeric payload",
                    wire_type: other,
                }),
            },
        }
    }
}

/// Conversion from a stored [`WireValue`].
pub trait FromWireValue: Sized {
    fn from_wire_value(value: &WireValue) -> Option<Self>;
}

macro_rules! impl_from_wire_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromWireValue for $ty {
                fn from_wire_value(value: &WireValue) -> Option<Self> {
                    match &value.value {
                        Scalar::Raw(RawValue::Number(n)) => {
                            let high = n.checked_shr(<$ty>::BITS).unwrap_or(0);
                            (high == 0).then(|| <$ty as VarInt>::from_wire(*n))
                        }
                        other => <$ty>::try_from(other.as_i128()?).ok(),
                    }
                }
            }
        )*
    };
}

impl_from_wire_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromWireValue for bool {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        match &value.value {
            Scalar::Bool(b) => Some(*b),
            Scalar::Raw(RawValue::Number(n)) if value.wire_type == WireType::VarInt => Some(*n != 0),
            _ => None,
        }
    }
}

impl FromWireValue for f64 {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        match &value.value {
            Scalar::F64(v) => Some(*v),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::Raw(RawValue::Number(n)) => match value.wire_type {
                WireType::Fixed64 => Some(f64::from_bits(*n)),
                WireType::Fixed32 => Some(f32::from_bits(*n as u32) as f64),
                _ => None,
            },
            other => other.as_i128().map(|v| v as f64),
        }
    }
}

impl FromWireValue for f32 {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        match &value.value {
            Scalar::F32(v) => Some(*v),
            Scalar::F64(v) => Some(*v as f32),
            Scalar::Raw(RawValue::Number(n)) => match value.wire_type {
                WireType::Fixed32 => Some(f32::from_bits(*n as u32)),
                WireType::Fixed64 => Some(f64::from_bits(*n) as f32),
                _ => None,
            },
            other => other.as_i128().map(|v| v as f32),
        }
    }
}

impl FromWireValue for String {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        match &value.value {
            Scalar::String(s) => Some(s.clone()),
            Scalar::Bytes(data) | Scalar::Raw(RawValue::Bytes(data)) => {
                std::str::from_utf8(data).ok().map(str::to_owned)
            }
            _ => None,
        }
    }
}

impl FromWireValue for Bytes {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        match &value.value {
            Scalar::Bytes(data) | Scalar::Raw(RawValue::Bytes(data)) => Some(data.clone()),
            Scalar::String(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            _ => None,
        }
    }
}

impl FromWireValue for Vec<u8> {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        Bytes::from_wire_value(value).map(|data| data.to_vec())
    }
}

impl FromWireValue for WireObject {
    fn from_wire_value(value: &WireValue) -> Option<Self> {
        value.to_object().ok()
    }
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WireNode {
    Value(WireValue),
    Array(WireArray),
    Object(WireObject),
}

impl WireNode {
    /// Wire type every occurrence of this node is tagged with.
    pub fn wire_type(&self) -> WireType {
        match self {
            WireNode::Value(v) => v.wire_type(),
            WireNode::Array(a) => a.wire_type(),
            WireNode::Object(_) => WireType::LengthDelimited,
        }
    }

    pub fn as_value(&self) -> Option<&WireValue> {
        match self {
            WireNode::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The node as an object, parsing a raw length-delimited value on demand.
    pub fn as_object(&self) -> Result<Cow<'_, WireObject>> {
        match self {
            WireNode::Object(o) => Ok(Cow::Borrowed(o)),
            WireNode::Value(v) => v.to_object().map(Cow::Owned),
            WireNode::Array(a) => Err(WireError::TypeMismatch {
                expected: "WireObject",
                wire_type: a.wire_type(),
            }),
        }
    }

    /// The node as an array; a single value or object becomes a one-element array.
    pub fn as_array(&self) -> Cow<'_, WireArray> {
        match self {
            WireNode::Array(a) => Cow::Borrowed(a),
            other => {
                let mut array = WireArray::new(other.wire_type());
                array.items.push(other.clone());
                Cow::Owned(array)
            }
        }
    }

    pub fn get_value<T: FromWireValue>(&self) -> Result<T> {
        match self {
            WireNode::Value(v) => v.get(),
            other => Err(WireError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                wire_type: other.wire_type(),
            }),
        }
    }

    pub fn try_get_value<T: FromWireValue>(&self) -> Option<T> {
        self.as_value().and_then(WireValue::try_get)
    }

    /// Writes the node under `field`, one tag per array element.
    pub fn write_tagged(&self, field: u32, writer: &mut WireWriter<'_>) -> Result<()> {
        match self {
            WireNode::Value(v) => {
                writer.encode_tag(field, v.wire_type())?;
                v.write_body(v.wire_type(), writer)
            }
            WireNode::Array(a) => {
                for item in &a.items {
                    item.write_tagged(field, writer)?;
                }
                Ok(())
            }
            WireNode::Object(o) => {
                writer.encode_tag(field, WireType::LengthDelimited)?;
                writer.encode_nested(|inner| o.write_to(inner))
            }
        }
    }
}

impl From<WireValue> for WireNode {
    fn from(value: WireValue) -> Self {
        WireNode::Value(value)
    }
}

impl From<WireArray> for WireNode {
    fn from(value: WireArray) -> Self {
        WireNode::Array(value)
    }
}

impl From<WireObject> for WireNode {
    fn from(value: WireObject) -> Self {
        WireNode::Object(value)
    }
}

/// A homogeneous repeated value.
#[derive(Debug, Clone, PartialEq)]
pub struct WireArray {
    wire_type: WireType,
    items: Vec<WireNode>,
}

impl WireArray {
    pub fn new(wire_type: WireType) -> Self {
        Self {
            wire_type,
            items: Vec::new(),
        }
    }

    pub fn from_values<I, V>(wire_type: WireType, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let mut array = Self::new(wire_type);
        for value in values {
            array.push(value);
        }
        array
    }

    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Appends a value written with the array's wire type.
    pub fn push(&mut self, value: impl Into<Scalar>) -> &mut Self {
        self.items
            .push(WireNode::Value(WireValue::new(value, self.wire_type)));
        self
    }

    pub fn push_node(&mut self, node: impl Into<WireNode>) -> &mut Self {
        self.items.push(node.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&WireNode> {
        self.items.get(index)
    }

    /// Lazily converts each element to `T`.
    pub fn values<'a, T: FromWireValue + 'a>(&'a self) -> impl Iterator<Item = Result<T>> + 'a {
        self.items.iter().map(WireNode::get_value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WireNode> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a WireArray {
    type Item = &'a WireNode;
    type IntoIter = std::slice::Iter<'a, WireNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// An ordered multimap from field numbers to nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireObject {
    fields: Vec<(u32, WireNode)>,
}

impl WireObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` under `field`, after any earlier occurrences.
    pub fn insert(&mut self, field: u32, node: impl Into<WireNode>) -> &mut Self {
        self.fields.push((field, node.into()));
        self
    }

    /// Appends a value with an explicit wire type.
    pub fn insert_value(
        &mut self,
        field: u32,
        value: impl Into<Scalar>,
        wire_type: WireType,
    ) -> &mut Self {
        self.insert(field, WireValue::new(value, wire_type))
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, field: u32, node: impl Into<WireNode>) -> Self {
        self.insert(field, node);
        self
    }

    /// The first occurrence of `field`.
    pub fn get(&self, field: u32) -> Result<&WireNode> {
        self.try_get(field).ok_or(WireError::FieldNotFound(field))
    }

    pub fn try_get(&self, field: u32) -> Option<&WireNode> {
        self.fields
            .iter()
            .find(|(number, _)| *number == field)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, field: u32) -> Option<&mut WireNode> {
        self.fields
            .iter_mut()
            .find(|(number, _)| *number == field)
            .map(|(_, node)| node)
    }

    /// Shorthand for `get(field)?.get_value()`.
    pub fn get_value<T: FromWireValue>(&self, field: u32) -> Result<T> {
        self.get(field)?.get_value()
    }

    pub fn try_get_value<T: FromWireValue>(&self, field: u32) -> Option<T> {
        self.try_get(field)?.try_get_value()
    }

    /// All occurrences of `field`, in insertion order.
    pub fn get_all(&self, field: u32) -> impl Iterator<Item = &WireNode> + '_ {
        self.fields
            .iter()
            .filter(move |(number, _)| *number == field)
            .map(|(_, node)| node)
    }

    /// All occurrences of `field` as one array; nested arrays are flattened.
    pub fn get_array(&self, field: u32) -> Result<WireArray> {
        let mut occurrences = self.get_all(field).peekable();
        let first = occurrences.peek().ok_or(WireError::FieldNotFound(field))?;
        let mut array = WireArray::new(first.wire_type());
        for node in occurrences {
            match node {
                WireNode::Array(inner) => array.items.extend(inner.items.iter().cloned()),
                other => array.items.push(other.clone()),
            }
        }
        Ok(array)
    }

    pub fn contains(&self, field: u32) -> bool {
        self.try_get(field).is_some()
    }

    /// Removes every occurrence of `field`, returning how many were removed.
    pub fn remove(&mut self, field: u32) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(number, _)| *number != field);
        before - self.fields.len()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Number of entries, counting every occurrence of repeated fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &WireNode)> + '_ {
        self.fields.iter().map(|(number, node)| (*number, node))
    }

    /// Writes every entry in insertion order.
    pub fn write_to(&self, writer: &mut WireWriter<'_>) -> Result<()> {
        for (field, node) in &self.fields {
            node.write_tagged(*field, writer)?;
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut writer = WireWriter::new(&mut out);
        self.write_to(&mut writer)?;
        writer.dispose()?;
        drop(writer);
        Ok(out.freeze())
    }

    /// Parses tag/value pairs into raw values. Length-delimited payloads stay raw until read.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(data);
        Self::read_from(&mut reader)
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        let mut object = Self::new();
        while !reader.is_completed() {
            let tag = reader.decode_tag()?;
            let value = WireValue::read_raw(tag.wire_type(), reader)?;
            object.fields.push((tag.field_number(), WireNode::Value(value)));
        }
        Ok(object)
    }
}

impl<'a> IntoIterator for &'a WireObject {
    type Item = &'a (u32, WireNode);
    type IntoIter = std::slice::Iter<'a, (u32, WireNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl WireField for WireObject {
    fn wire_kind() -> WireKind {
        WireKind::Scalar(crate::core::ScalarKind::new(WireType::LengthDelimited, false))
    }

    fn write_value(
        &self,
        _spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        writer.encode_nested(|inner| self.write_to(inner))
    }

    fn read_value(
        _spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        WireObject::parse(reader.read_length_delimited()?)
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl WireField for WireValue {
    fn wire_kind() -> WireKind {
        WireKind::Node
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        self.write_body(spec.wire_type, writer)
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        WireValue::read_raw(spec.wire_type, reader)
    }

    fn is_default(&self) -> bool {
        false
    }
}

impl Default for WireValue {
    fn default() -> Self {
        WireValue::new(RawValue::Number(0), WireType::VarInt)
    }
}

impl WireField for WireNode {
    fn wire_kind() -> WireKind {
        WireKind::Node
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self {
            WireNode::Value(v) => v.write_body(spec.wire_type, writer),
            WireNode::Object(o) => o.write_value(spec, writer, registry),
            WireNode::Array(_) => Err(WireError::Encode(
                "array node cannot be written as a single value".to_string(),
            )),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        WireValue::read_raw(spec.wire_type, reader).map(WireNode::Value)
    }

    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self {
            WireNode::Array(a) => a.write_field(spec, writer, registry),
            other => {
                writer.encode_tag(spec.number, spec.wire_type)?;
                other.write_value(spec.value(), writer, registry)
            }
        }
    }

    fn is_default(&self) -> bool {
        match self {
            WireNode::Value(_) => false,
            WireNode::Array(a) => a.is_empty(),
            WireNode::Object(o) => o.is_empty(),
        }
    }
}

impl Default for WireNode {
    fn default() -> Self {
        WireNode::Object(WireObject::new())
    }
}

impl WireField for WireArray {
    fn wire_kind() -> WireKind {
        WireKind::RepeatedNode
    }

    fn write_value(
        &self,
        _spec: ValueSpec,
        _writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        Err(WireError::Encode(
            "array node cannot be written as a single value".to_string(),
        ))
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        let mut array = WireArray::new(spec.wire_type);
        array
            .items
            .push(WireNode::Value(WireValue::read_raw(spec.wire_type, reader)?));
        Ok(array)
    }

    fn write_field(
        &self,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        for item in &self.items {
            item.write_field(spec, writer, registry)?;
        }
        Ok(())
    }

    fn merge_field(
        slot: &mut Self,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        slot.wire_type = spec.wire_type;
        slot.items
            .push(WireNode::Value(WireValue::read_raw(spec.wire_type, reader)?));
        Ok(())
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }

    fn should_serialize(&self, _ignore_default_fields: bool) -> bool {
        !self.is_empty()
    }
}

impl Default for WireArray {
    fn default() -> Self {
        WireArray::new(WireType::VarInt)
    }
}
