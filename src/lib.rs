//! # wirepack
//!
//! A compact, protobuf-compatible binary serialization library for Rust.
//!
//! - Bit-exact protobuf wire format: tag varints, base-128 varints, little-endian fixed32/fixed64
//!   and length-prefixed byte runs
//! - Schema-driven object mapping through per-type field tables ([`TypeInfo`]), produced either
//!   by `#[derive(WireMessage)]` or built by hand with [`TypeInfo::builder`]
//! - Polymorphic messages: a discriminator field, always encoded first, selects the concrete
//!   variant while decoding, including multi-level chains
//! - A mutable, schema-less node tree ([`WireObject`], [`WireArray`], [`WireValue`]) for dynamic access
//! - Unknown fields are skipped on decode, so older readers keep working against newer writers
//!
//! ## Attribute Macros
//!
//! Field tables are configured with `#[wire(...)]` attributes:
//!
//! - `#[wire(N)]` or `#[wire(field = N)]`: Serializes the member under field number `N`. Members without
//!   a `#[wire]` attribute are not serialized and are initialized with `Default::default()`.
//! - `#[wire(N, signed)]`: Zig-zag encodes an integer member.
//! - `#[wire(N, fixed32)]` / `#[wire(N, fixed64)]`: Encodes an integer member as a little-endian fixed-width value.
//! - `#[wire(N, wire_type = "varint")]`: Declares the wire type of a dynamic node member (`WireNode`, `WireValue`, `WireArray`).
//! - `#[wire(N, value_signed)]`, `value_fixed32`, `value_fixed64`: Number handling for the values of a map member.
//! - `#[wire(flatten)]`: Merges the field table of a nested message into this one (base-type fields).
//! - `#[wire(ignore_default_fields)]`: Type level: omit members equal to their default value.
//! - `#[wire(parent = Type)]`: Type level: declares the polymorphic parent of a derived message.
//! - `#[wire(polymorphic(field = N, fallback = bool))]`: Enum level: discriminator field (default 1) and
//!   whether unknown discriminators decode as the base variant (default `true`).
//! - `#[wire(base)]` / `#[wire(discriminator = V)]`: Variant level: the base variant and derived variants.
//!
//! ## Feature Flags
//!
//! - `simd` (default): Enables the SSSE3 dual varint encoder on x86_64, selected at runtime.
//! - `indexmap`: Enables `indexmap::IndexMap` map members.
//! - `smol_str`: Enables `smol_str::SmolStr` string members.

pub mod core;
mod features;
pub mod metadata;
pub mod node;
pub mod polymorphic;
pub mod reader;
pub mod registry;
pub mod serializer;
pub mod varint;
pub mod wire;
pub mod writer;

pub use crate::core::{MapKind, ScalarKind, WireEnum, WireField, WireKind};
pub use metadata::{FieldInfo, FieldOptions, FieldSpec, FieldTable, MapSpec, TypeInfo, TypeInfoBuilder};
pub use node::{RawValue, Scalar, WireArray, WireNode, WireObject, WireValue};
pub use polymorphic::{DerivedTypeInfo, Discriminator, PolymorphicInfo};
pub use reader::WireReader;
pub use registry::TypeRegistry;
pub use serializer::Serializer;
pub use wire::{NumberHandling, Tag, WireType, FIELD_NUMBER_MAX};
pub use wirepack_derive::{WireEnum, WireMessage};
pub use writer::WireWriter;

use bytes::{BufMut, Bytes};

/// Errors that can occur during encoding, decoding or field table construction.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A varint did not terminate within the maximum byte count of its type.
    #[error("Malformed varint: no terminating byte within {max_bytes} bytes")]
    MalformedVarInt { max_bytes: usize },
    /// The buffer did not contain enough data to complete the operation.
    #[error("Insufficient data in buffer: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },
    /// A tag carried a wire type this format does not support.
    #[error("Invalid wire type: {0}")]
    InvalidWireType(u32),
    /// A tag carried field number 0 or a number above 2^29 - 1.
    #[error("Invalid field number: {0}")]
    InvalidFieldNumber(u32),
    /// The stored representation cannot be converted to the requested type.
    #[error("Cannot read {wire_type:?} value as {expected}")]
    TypeMismatch {
        expected: &'static str,
        wire_type: WireType,
    },
    /// A node object has no entry for the requested field number.
    #[error("Field {0} not found")]
    FieldNotFound(u32),
    /// A decoded enum value has no matching variant.
    #[error("Unknown value {value} for enum {enum_name}")]
    UnknownEnumValue { enum_name: &'static str, value: i32 },
    /// A length-delimited string was not valid UTF-8.
    #[error(transparent)]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// The output sink could not accept the requested number of bytes.
    #[error("Output capacity violation: requested {requested} bytes, {available} available")]
    CapacityViolation { requested: usize, available: usize },
    /// The writer was used after it was disposed.
    #[error("Writer has been disposed")]
    WriterDisposed,
    /// Polymorphic resolution error
    #[error(transparent)]
    Polymorphic(#[from] PolymorphicError),
    /// Field table construction error
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, WireError>;

/// Error types for polymorphic encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum PolymorphicError {
    #[error("Unknown discriminator {discriminator} for polymorphic type {type_name}")]
    UnknownType {
        type_name: &'static str,
        discriminator: String,
    },
    #[error("Polymorphic type {type_name} expects discriminator field {expected} first, got field {actual}")]
    DiscriminatorNotFirst {
        type_name: &'static str,
        expected: u32,
        actual: u32,
    },
    #[error("Discriminator field {field} of polymorphic type {type_name} is missing")]
    MissingDiscriminator { type_name: &'static str, field: u32 },
    #[error("Cannot construct {derived} while decoding {type_name}")]
    CannotConstruct {
        type_name: &'static str,
        derived: &'static str,
    },
}

/// Error types raised while building a field table
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Field number {field} is duplicated for type {type_name}")]
    DuplicateField { type_name: &'static str, field: u32 },
    #[error("Number handling on member '{member}' of {type_name} requires an integer varint member")]
    InvalidNumberHandling {
        type_name: &'static str,
        member: &'static str,
    },
    #[error("Dynamic node member '{member}' of {type_name} needs an explicit wire type")]
    MissingNodeWireType {
        type_name: &'static str,
        member: &'static str,
    },
    #[error("Member '{member}' of {type_name} has an unsupported type: {reason}")]
    UnsupportedType {
        type_name: &'static str,
        member: &'static str,
        reason: &'static str,
    },
    #[error("Field number {field} of member '{member}' on {type_name} is out of range")]
    InvalidFieldNumber {
        type_name: &'static str,
        member: &'static str,
        field: u32,
    },
    #[error("Discriminator {discriminator} is declared twice for polymorphic type {type_name}")]
    DuplicateDiscriminator {
        type_name: &'static str,
        discriminator: String,
    },
}

/// Trait for types that provide a field table.
///
/// `#[derive(WireMessage)]` generates the implementation. Hand-written implementations build the
/// table with [`TypeInfo::builder`]; both produce interchangeable metadata.
///
/// # Errors
/// Returns [`MetadataError`] if the declared members do not form a valid table.
pub trait WireMessage: Sized + 'static {
    /// Builds the field table for this type.
    ///
    /// Called at most once per registry; the result is cached by [`TypeRegistry`].
    fn type_info() -> Result<TypeInfo<Self>>;

    /// Discriminator field numbers of this type's polymorphic ancestors and of the type itself,
    /// root first.
    fn discriminator_chain() -> Vec<u32> {
        Vec::new()
    }
}

/// Convenience function to serialize a message to bytes using the global registry.
///
/// # Example
/// ```rust
/// use wirepack::{deserialize, serialize, WireMessage};
///
/// #[derive(WireMessage, Default, PartialEq, Debug)]
/// struct MyStruct {
///     #[wire(1)]
///     id: u32,
///     #[wire(2)]
///     name: String,
/// }
///
/// let value = MyStruct { id: 42, name: "hello".to_string() };
/// let bytes = serialize(&value).unwrap();
/// let decoded: MyStruct = deserialize(&bytes).unwrap();
/// assert_eq!(value, decoded);
/// ```
pub fn serialize<T: WireMessage>(value: &T) -> Result<Bytes> {
    Serializer::global().serialize(value)
}

/// Convenience function to serialize a message into a caller-provided sink using the global registry.
///
/// Returns the number of bytes written to the sink.
pub fn serialize_into<T: WireMessage>(value: &T, sink: &mut dyn BufMut) -> Result<u64> {
    Serializer::global().serialize_into(value, sink)
}

/// Convenience function to deserialize a message from bytes using the global registry.
///
/// On error no partially populated value is returned.
pub fn deserialize<T: WireMessage>(data: &[u8]) -> Result<T> {
    Serializer::global().deserialize(data)
}

/// Parses bytes into a schema-less [`WireObject`].
pub fn parse_dynamic(data: &[u8]) -> Result<WireObject> {
    WireObject::parse(data)
}
