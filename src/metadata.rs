//! Field tables.
//!
//! A [`TypeInfo`] maps tags to field descriptors for one message type. Descriptors hold an
//! accessor pair for their member, so encoding and decoding never go through reflection.

use crate::core::{ScalarKind, WireField, WireKind};
use crate::polymorphic::{Discriminator, PolymorphicInfo};
use crate::reader::WireReader;
use crate::registry::TypeRegistry;
use crate::wire::{make_tag, NumberHandling, WireType, FIELD_NUMBER_MAX};
use crate::writer::WireWriter;
use crate::{MetadataError, Result, WireError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Wire type and number handling of a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSpec {
    pub wire_type: WireType,
    pub handling: NumberHandling,
}

impl ValueSpec {
    pub const fn new(wire_type: WireType, handling: NumberHandling) -> Self {
        Self {
            wire_type,
            handling,
        }
    }
}

/// Key and value specs of a map member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSpec {
    pub key: ValueSpec,
    pub value: ValueSpec,
}

/// Resolved wire layout of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub number: u32,
    pub wire_type: WireType,
    pub handling: NumberHandling,
    pub map: Option<MapSpec>,
}

impl FieldSpec {
    pub const fn new(number: u32, wire_type: WireType, handling: NumberHandling) -> Self {
        Self {
            number,
            wire_type,
            handling,
            map: None,
        }
    }

    pub const fn with_map(mut self, map: MapSpec) -> Self {
        self.map = Some(map);
        self
    }

    #[inline]
    pub const fn value(&self) -> ValueSpec {
        ValueSpec::new(self.wire_type, self.handling)
    }

    #[inline]
    pub const fn tag(&self) -> u32 {
        make_tag(self.number, self.wire_type)
    }
}

/// Per-member options, the runtime form of the `#[wire(...)]` member attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub handling: NumberHandling,
    pub value_handling: NumberHandling,
    pub wire_type: Option<WireType>,
}

impl FieldOptions {
    pub const fn new() -> Self {
        Self {
            handling: NumberHandling::NONE,
            value_handling: NumberHandling::NONE,
            wire_type: None,
        }
    }

    pub const fn handling(mut self, handling: NumberHandling) -> Self {
        self.handling = self.handling.union(handling);
        self
    }

    pub const fn signed(self) -> Self {
        self.handling(NumberHandling::SIGNED)
    }

    pub const fn fixed32(self) -> Self {
        self.handling(NumberHandling::FIXED32)
    }

    pub const fn fixed64(self) -> Self {
        self.handling(NumberHandling::FIXED64)
    }

    pub const fn value_handling(mut self, handling: NumberHandling) -> Self {
        self.value_handling = self.value_handling.union(handling);
        self
    }

    pub const fn value_signed(self) -> Self {
        self.value_handling(NumberHandling::SIGNED)
    }

    pub const fn value_fixed32(self) -> Self {
        self.value_handling(NumberHandling::FIXED32)
    }

    pub const fn value_fixed64(self) -> Self {
        self.value_handling(NumberHandling::FIXED64)
    }

    /// Declares the wire type of a dynamic node member.
    pub const fn wire_type(mut self, wire_type: WireType) -> Self {
        self.wire_type = Some(wire_type);
        self
    }
}

/// Reads and writes one member of `T`.
pub trait FieldAccess<T>: Send + Sync {
    fn write(
        &self,
        target: &T,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()>;

    fn merge(
        &self,
        target: &mut T,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()>;

    fn should_serialize(&self, target: &T, ignore_default_fields: bool) -> bool;

    fn discriminator(&self, target: &T) -> Option<Discriminator>;
}

struct MemberAccess<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T: 'static, F: WireField> FieldAccess<T> for MemberAccess<T, F> {
    fn write(
        &self,
        target: &T,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        (self.get)(target).write_field(spec, writer, registry)
    }

    fn merge(
        &self,
        target: &mut T,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        F::merge_field((self.get_mut)(target), spec, reader, registry)
    }

    fn should_serialize(&self, target: &T, ignore_default_fields: bool) -> bool {
        (self.get)(target).should_serialize(ignore_default_fields)
    }

    fn discriminator(&self, target: &T) -> Option<Discriminator> {
        (self.get)(target).discriminator()
    }
}

/// Maps an outer type onto an inner one it may contain: a flattened member or an enum variant.
pub struct Projection<T, V> {
    get: fn(&T) -> Option<&V>,
    get_mut: fn(&mut T) -> Option<&mut V>,
}

impl<T, V> Projection<T, V> {
    pub fn new(get: fn(&T) -> Option<&V>, get_mut: fn(&mut T) -> Option<&mut V>) -> Self {
        Self { get, get_mut }
    }

    #[inline]
    pub fn get<'t>(&self, target: &'t T) -> Option<&'t V> {
        (self.get)(target)
    }

    #[inline]
    pub fn get_mut<'t>(&self, target: &'t mut T) -> Option<&'t mut V> {
        (self.get_mut)(target)
    }
}

impl<T, V> Clone for Projection<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Projection<T, V> {}

struct LiftedAccess<T, V> {
    inner: Arc<dyn FieldAccess<V>>,
    projection: Projection<T, V>,
    type_name: &'static str,
}

impl<T: 'static, V: 'static> FieldAccess<T> for LiftedAccess<T, V> {
    fn write(
        &self,
        target: &T,
        spec: &FieldSpec,
        writer: &mut WireWriter<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self.projection.get(target) {
            Some(inner) => self.inner.write(inner, spec, writer, registry),
            None => Ok(()),
        }
    }

    fn merge(
        &self,
        target: &mut T,
        spec: &FieldSpec,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        match self.projection.get_mut(target) {
            Some(inner) => self.inner.merge(inner, spec, reader, registry),
            None => Err(WireError::Decode(format!(
                "field {} of {} is not held by the current value",
                spec.number, self.type_name
            ))),
        }
    }

    fn should_serialize(&self, target: &T, ignore_default_fields: bool) -> bool {
        self.projection
            .get(target)
            .is_some_and(|inner| self.inner.should_serialize(inner, ignore_default_fields))
    }

    fn discriminator(&self, target: &T) -> Option<Discriminator> {
        self.projection
            .get(target)
            .and_then(|inner| self.inner.discriminator(inner))
    }
}

/// Descriptor of one member: field number, resolved wire layout and accessor.
pub struct FieldInfo<T> {
    name: &'static str,
    spec: FieldSpec,
    access: Arc<dyn FieldAccess<T>>,
}

impl<T> Clone for FieldInfo<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            spec: self.spec,
            access: Arc::clone(&self.access),
        }
    }
}

impl<T> fmt::Debug for FieldInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .finish()
    }
}

impl<T: 'static> FieldInfo<T> {
    /// Creates a descriptor for a member of type `F`, validating its options.
    pub fn new<F: WireField>(
        type_name: &'static str,
        name: &'static str,
        number: u32,
        options: FieldOptions,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Result<Self> {
        let spec = resolve_spec::<F>(type_name, name, number, options)?;
        Ok(Self::from_access(name, spec, Arc::new(MemberAccess { get, get_mut })))
    }

    /// Creates a descriptor from a custom accessor.
    pub fn from_access(name: &'static str, spec: FieldSpec, access: Arc<dyn FieldAccess<T>>) -> Self {
        Self { name, spec, access }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn number(&self) -> u32 {
        self.spec.number
    }

    #[inline]
    pub fn wire_type(&self) -> WireType {
        self.spec.wire_type
    }

    #[inline]
    pub fn handling(&self) -> NumberHandling {
        self.spec.handling
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        self.spec.tag()
    }

    #[inline]
    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// Writes the member's tag(s) and value(s).
    #[inline]
    pub fn write(&self, target: &T, writer: &mut WireWriter<'_>, registry: &TypeRegistry) -> Result<()> {
        self.access.write(target, &self.spec, writer, registry)
    }

    /// Applies one occurrence of the field; the tag has been consumed.
    #[inline]
    pub fn merge(
        &self,
        target: &mut T,
        reader: &mut WireReader<'_>,
        registry: &TypeRegistry,
    ) -> Result<()> {
        self.access.merge(target, &self.spec, reader, registry)
    }

    #[inline]
    pub fn should_serialize(&self, target: &T, ignore_default_fields: bool) -> bool {
        self.access.should_serialize(target, ignore_default_fields)
    }

    #[inline]
    pub fn discriminator(&self, target: &T) -> Option<Discriminator> {
        self.access.discriminator(target)
    }

    /// Re-targets the descriptor at an outer type through `projection`.
    pub fn lift<U: 'static>(&self, type_name: &'static str, projection: Projection<U, T>) -> FieldInfo<U> {
        FieldInfo {
            name: self.name,
            spec: self.spec,
            access: Arc::new(LiftedAccess {
                inner: Arc::clone(&self.access),
                projection,
                type_name,
            }),
        }
    }
}

/// Field descriptors keyed by tag, iterated in ascending field number order.
pub struct FieldTable<T> {
    by_tag: BTreeMap<u32, FieldInfo<T>>,
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self {
            by_tag: BTreeMap::new(),
        }
    }
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.by_tag.values()).finish()
    }
}

impl<T: 'static> FieldTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor, rejecting a second member with the same field number.
    pub fn insert(&mut self, type_name: &'static str, field: FieldInfo<T>) -> Result<()> {
        if self.by_number(field.number()).is_some() {
            return Err(MetadataError::DuplicateField {
                type_name,
                field: field.number(),
            }
            .into());
        }
        self.by_tag.insert(field.tag(), field);
        Ok(())
    }

    #[inline]
    pub fn get(&self, tag: u32) -> Option<&FieldInfo<T>> {
        self.by_tag.get(&tag)
    }

    pub fn by_number(&self, number: u32) -> Option<&FieldInfo<T>> {
        let first = make_tag(number, WireType::VarInt);
        self.by_tag.range(first..=first | 0b111).map(|(_, f)| f).next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo<T>> {
        self.by_tag.values()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub fn lift<U: 'static>(&self, type_name: &'static str, projection: Projection<U, T>) -> FieldTable<U> {
        FieldTable {
            by_tag: self
                .by_tag
                .iter()
                .map(|(tag, field)| (*tag, field.lift(type_name, projection)))
                .collect(),
        }
    }
}

/// Metadata of one message type.
pub struct TypeInfo<T> {
    name: &'static str,
    fields: FieldTable<T>,
    create: Arc<dyn Fn() -> T + Send + Sync>,
    ignore_default_fields: bool,
    polymorphic: Option<PolymorphicInfo<T>>,
    ancestors: Vec<u32>,
}

impl<T> fmt::Debug for TypeInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("ignore_default_fields", &self.ignore_default_fields)
            .field("polymorphic", &self.polymorphic.is_some())
            .field("ancestors", &self.ancestors)
            .finish()
    }
}

impl<T: 'static> TypeInfo<T> {
    /// Starts a field table for `T`; `create` builds the empty instance decoding starts from.
    ///
    /// # Example
    /// ```rust
    /// use wirepack::{FieldOptions, TypeInfo};
    ///
    /// #[derive(Default)]
    /// struct Point {
    ///     x: i32,
    ///     y: i32,
    /// }
    ///
    /// let info = TypeInfo::<Point>::builder("Point", Point::default)
    ///     .field(1, "x", |p| &p.x, |p| &mut p.x)
    ///     .field_with(2, "y", FieldOptions::new().signed(), |p| &p.y, |p| &mut p.y)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(info.fields().len(), 2);
    /// ```
    pub fn builder(
        name: &'static str,
        create: impl Fn() -> T + Send + Sync + 'static,
    ) -> TypeInfoBuilder<T> {
        TypeInfoBuilder {
            info: TypeInfo {
                name,
                fields: FieldTable::new(),
                create: Arc::new(create),
                ignore_default_fields: false,
                polymorphic: None,
                ancestors: Vec::new(),
            },
            error: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn fields(&self) -> &FieldTable<T> {
        &self.fields
    }

    /// A fresh instance to decode into.
    #[inline]
    pub fn create(&self) -> T {
        (self.create)()
    }

    pub(crate) fn creator(&self) -> Arc<dyn Fn() -> T + Send + Sync> {
        Arc::clone(&self.create)
    }

    #[inline]
    pub fn ignore_default_fields(&self) -> bool {
        self.ignore_default_fields
    }

    #[inline]
    pub fn polymorphic(&self) -> Option<&PolymorphicInfo<T>> {
        self.polymorphic.as_ref()
    }

    /// Discriminator field numbers of the polymorphic ancestors, root first.
    #[inline]
    pub fn ancestors(&self) -> &[u32] {
        &self.ancestors
    }
}

/// Builder for [`TypeInfo`]. The first registration error is kept and returned by
/// [`build`](Self::build).
pub struct TypeInfoBuilder<T> {
    info: TypeInfo<T>,
    error: Option<WireError>,
}

impl<T: 'static> TypeInfoBuilder<T> {
    /// Adds a member with default options.
    pub fn field<F: WireField>(
        self,
        number: u32,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.field_with(number, name, FieldOptions::new(), get, get_mut)
    }

    /// Adds a member with explicit options.
    pub fn field_with<F: WireField>(
        self,
        number: u32,
        name: &'static str,
        options: FieldOptions,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        let type_name = self.info.name;
        self.add(|| FieldInfo::new(type_name, name, number, options, get, get_mut))
    }

    /// Adds a prebuilt descriptor.
    pub fn insert(self, field: FieldInfo<T>) -> Self {
        self.add(|| Ok(field))
    }

    /// Merges every field of `inner` into this table through `get` / `get_mut`.
    pub fn flatten<V: 'static>(
        mut self,
        inner: &TypeInfo<V>,
        get: fn(&T) -> Option<&V>,
        get_mut: fn(&mut T) -> Option<&mut V>,
    ) -> Self {
        let projection = Projection::new(get, get_mut);
        for field in inner.fields().iter() {
            let type_name = self.info.name;
            self = self.add(|| Ok(field.lift(type_name, projection)));
        }
        self
    }

    pub fn ignore_default_fields(mut self, ignore: bool) -> Self {
        self.info.ignore_default_fields = ignore;
        self
    }

    /// Discriminator field numbers of the polymorphic ancestors, root first.
    pub fn ancestors(mut self, ancestors: Vec<u32>) -> Self {
        self.info.ancestors = ancestors;
        self
    }

    pub fn polymorphic(mut self, polymorphic: PolymorphicInfo<T>) -> Self {
        self.info.polymorphic = Some(polymorphic);
        self
    }

    fn add(mut self, field: impl FnOnce() -> Result<FieldInfo<T>>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let type_name = self.info.name;
        if let Err(e) = field().and_then(|f| self.info.fields.insert(type_name, f)) {
            self.error = Some(e);
        }
        self
    }

    pub fn build(self) -> Result<TypeInfo<T>> {
        if let Some(e) = self.error {
            tracing::debug!(type_name = self.info.name, error = %e, "field table rejected");
            return Err(e);
        }
        tracing::trace!(
            type_name = self.info.name,
            fields = self.info.fields.len(),
            polymorphic = self.info.polymorphic.is_some(),
            "field table built"
        );
        Ok(self.info)
    }
}

fn apply_handling(
    type_name: &'static str,
    member: &'static str,
    kind: ScalarKind,
    handling: NumberHandling,
) -> Result<ValueSpec> {
    if handling.is_empty() {
        return Ok(ValueSpec::new(kind.wire_type, handling));
    }
    if !kind.numeric || kind.wire_type != WireType::VarInt {
        return Err(MetadataError::InvalidNumberHandling { type_name, member }.into());
    }
    Ok(ValueSpec::new(handling.wire_type(), handling))
}

/// Determines the wire layout of a member of type `F`.
fn resolve_spec<F: WireField>(
    type_name: &'static str,
    member: &'static str,
    number: u32,
    options: FieldOptions,
) -> Result<FieldSpec> {
    if number == 0 || number > FIELD_NUMBER_MAX {
        return Err(MetadataError::InvalidFieldNumber {
            type_name,
            member,
            field: number,
        }
        .into());
    }
    match F::wire_kind() {
        WireKind::Scalar(kind) | WireKind::Repeated(kind) => {
            let value = apply_handling(type_name, member, kind, options.handling)?;
            Ok(FieldSpec::new(number, value.wire_type, value.handling))
        }
        WireKind::Node | WireKind::RepeatedNode => {
            let wire_type = options
                .wire_type
                .ok_or(MetadataError::MissingNodeWireType { type_name, member })?;
            Ok(FieldSpec::new(number, wire_type, NumberHandling::NONE))
        }
        WireKind::Map(kind) => {
            let map = MapSpec {
                key: apply_handling(type_name, member, kind.key, options.handling)?,
                value: apply_handling(type_name, member, kind.value, options.value_handling)?,
            };
            Ok(FieldSpec::new(number, WireType::LengthDelimited, NumberHandling::NONE).with_map(map))
        }
        WireKind::Unsupported(reason) => Err(MetadataError::UnsupportedType {
            type_name,
            member,
            reason,
        }
        .into()),
    }
}
