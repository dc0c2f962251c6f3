//! Polymorphic messages.
//!
//! A polymorphic type is an enum with one base variant and any number of derived variants, each
//! keyed by a discriminator value. The discriminator field of every level in the hierarchy is
//! always written first, root level first, so a decoder can pick the concrete variant before
//! reading anything else.

use crate::metadata::{FieldTable, Projection, TypeInfo};
use crate::reader::WireReader;
use crate::registry::TypeRegistry;
use crate::writer::WireWriter;
use crate::{MetadataError, PolymorphicError, Result};
use std::fmt;
use std::sync::Arc;

/// A discriminator value: an integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminator {
    Number(i64),
    Text(String),
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminator::Number(n) => write!(f, "{n}"),
            Discriminator::Text(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! impl_discriminator_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Discriminator {
                fn from(value: $ty) -> Self {
                    Discriminator::Number(value as i64)
                }
            }
        )*
    };
}

impl_discriminator_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<&str> for Discriminator {
    fn from(value: &str) -> Self {
        Discriminator::Text(value.to_owned())
    }
}

impl From<String> for Discriminator {
    fn from(value: String) -> Self {
        Discriminator::Text(value)
    }
}

/// A derived variant, with the fields of its payload lifted onto the polymorphic type.
pub struct DerivedTypeInfo<T> {
    name: &'static str,
    fields: FieldTable<T>,
    create: Arc<dyn Fn() -> T + Send + Sync>,
    is_instance: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    ignore_default_fields: bool,
    polymorphic: Option<PolymorphicInfo<T>>,
}

impl<T: 'static> DerivedTypeInfo<T> {
    /// Describes the variant `wrap` of `T` holding a `V`.
    ///
    /// If `V` is itself polymorphic, its derived variants become the next level of the chain.
    pub fn variant<V: 'static>(
        info: &TypeInfo<V>,
        wrap: fn(V) -> T,
        get: fn(&T) -> Option<&V>,
        get_mut: fn(&mut T) -> Option<&mut V>,
    ) -> Self {
        let projection = Projection::new(get, get_mut);
        let create = info.creator();
        Self {
            name: info.name(),
            fields: info.fields().lift(info.name(), projection),
            create: Arc::new(move || wrap(create())),
            is_instance: Arc::new(move |target: &T| get(target).is_some()),
            ignore_default_fields: info.ignore_default_fields(),
            polymorphic: info
                .polymorphic()
                .map(|inner| inner.lift(projection, wrap)),
        }
    }

    fn lift<U: 'static>(&self, projection: Projection<U, T>, wrap: fn(T) -> U) -> DerivedTypeInfo<U> {
        let create = Arc::clone(&self.create);
        let is_instance = Arc::clone(&self.is_instance);
        DerivedTypeInfo {
            name: self.name,
            fields: self.fields.lift(self.name, projection),
            create: Arc::new(move || wrap(create())),
            is_instance: Arc::new(move |target: &U| {
                projection.get(target).is_some_and(|inner| is_instance(inner))
            }),
            ignore_default_fields: self.ignore_default_fields,
            polymorphic: self
                .polymorphic
                .as_ref()
                .map(|inner| inner.lift(projection, wrap)),
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

    #[inline]
    pub fn create(&self) -> T {
        (self.create)()
    }

    /// Whether `target` already holds this variant.
    #[inline]
    pub fn is_instance(&self, target: &T) -> bool {
        (self.is_instance)(target)
    }

    #[inline]
    pub fn ignore_default_fields(&self) -> bool {
        self.ignore_default_fields
    }

    #[inline]
    pub fn polymorphic(&self) -> Option<&PolymorphicInfo<T>> {
        self.polymorphic.as_ref()
    }
}

/// Discriminator field and derived variants of one polymorphic level.
pub struct PolymorphicInfo<T> {
    discriminator_field: u32,
    fallback_to_base: bool,
    derived: Vec<(Discriminator, DerivedTypeInfo<T>)>,
}

impl<T: 'static> PolymorphicInfo<T> {
    /// Field number 0 selects the default discriminator field, 1.
    pub fn new(discriminator_field: u32, fallback_to_base: bool) -> Self {
        Self {
            discriminator_field: if discriminator_field == 0 {
                1
            } else {
                discriminator_field
            },
            fallback_to_base,
            derived: Vec::new(),
        }
    }

    /// Registers a derived variant under `key`.
    pub fn derived(mut self, key: impl Into<Discriminator>, derived: DerivedTypeInfo<T>) -> Result<Self> {
        let key = key.into();
        if self.lookup(&key).is_some() {
            return Err(MetadataError::DuplicateDiscriminator {
                type_name: derived.name,
                discriminator: key.to_string(),
            }
            .into());
        }
        self.derived.push((key, derived));
        Ok(self)
    }

    #[inline]
    pub fn discriminator_field(&self) -> u32 {
        self.discriminator_field
    }

    #[inline]
    pub fn fallback_to_base(&self) -> bool {
        self.fallback_to_base
    }

    pub fn lookup(&self, key: &Discriminator) -> Option<&DerivedTypeInfo<T>> {
        self.derived.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    /// The derived variant `target` currently holds, if any.
    pub fn find_instance(&self, target: &T) -> Option<&DerivedTypeInfo<T>> {
        self.derived
            .iter()
            .map(|(_, d)| d)
            .find(|d| d.is_instance(target))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Discriminator, &DerivedTypeInfo<T>)> {
        self.derived.iter().map(|(k, d)| (k, d))
    }

    pub fn len(&self) -> usize {
        self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derived.is_empty()
    }

    fn lift<U: 'static>(&self, projection: Projection<U, T>, wrap: fn(T) -> U) -> PolymorphicInfo<U> {
        PolymorphicInfo {
            discriminator_field: self.discriminator_field,
            fallback_to_base: self.fallback_to_base,
            derived: self
                .derived
                .iter()
                .map(|(key, d)| (key.clone(), d.lift(projection, wrap)))
                .collect(),
        }
    }
}

/// Field table selected for the remaining fields of a value.
pub(crate) struct Resolved<'i, T> {
    pub fields: &'i FieldTable<T>,
    pub ignore_default_fields: bool,
    /// Tags already written or read ahead of the remaining fields.
    pub leading: Vec<u32>,
}

/// Writes the ancestor and discriminator fields of `value`, root first, and returns the table
/// of the most derived variant.
pub(crate) fn write_discriminators<'i, T: 'static>(
    info: &'i TypeInfo<T>,
    value: &T,
    writer: &mut WireWriter<'_>,
    registry: &TypeRegistry,
) -> Result<Resolved<'i, T>> {
    let mut numbers = info.ancestors().to_vec();
    let mut fields = info.fields();
    let mut ignore_default_fields = info.ignore_default_fields();
    let mut level = info.polymorphic();
    while let Some(polymorphic) = level {
        numbers.push(polymorphic.discriminator_field());
        let Some(derived) = polymorphic.find_instance(value) else {
            break;
        };
        fields = derived.fields();
        ignore_default_fields = derived.ignore_default_fields();
        level = derived.polymorphic();
    }

    let mut leading = Vec::with_capacity(numbers.len());
    for number in numbers {
        let missing = PolymorphicError::MissingDiscriminator {
            type_name: info.name(),
            field: number,
        };
        let field = fields.by_number(number).ok_or(missing)?;
        if field.discriminator(value).is_none() {
            return Err(PolymorphicError::MissingDiscriminator {
                type_name: info.name(),
                field: number,
            }
            .into());
        }
        field.write(value, writer, registry)?;
        leading.push(field.tag());
    }
    Ok(Resolved {
        fields,
        ignore_default_fields,
        leading,
    })
}

/// Reads the ancestor and discriminator fields at the front of `reader`, switching the target to
/// the variant each discriminator selects.
///
/// Returns the decoded target and the table for the remaining fields.
pub(crate) fn read_discriminators<'i, T: 'static>(
    info: &'i TypeInfo<T>,
    reader: &mut WireReader<'_>,
    registry: &TypeRegistry,
) -> Result<(T, Resolved<'i, T>)> {
    let mut target = info.create();
    let mut fields = info.fields();
    let mut ignore_default_fields = info.ignore_default_fields();
    let mut replay: Vec<(u32, &[u8])> = Vec::new();

    for &number in info.ancestors() {
        let entry = read_leading_field(info.name(), fields, number, &mut target, reader, registry)?;
        replay.push(entry);
    }

    let mut level = info.polymorphic();
    while let Some(polymorphic) = level {
        let number = polymorphic.discriminator_field();
        let (tag, span) = read_leading_field(info.name(), fields, number, &mut target, reader, registry)?;
        replay.push((tag, span));
        let key = fields
            .get(tag)
            .and_then(|field| field.discriminator(&target))
            .ok_or(PolymorphicError::MissingDiscriminator {
                type_name: info.name(),
                field: number,
            })?;

        match polymorphic.lookup(&key) {
            Some(derived) => {
                tracing::trace!(
                    type_name = info.name(),
                    discriminator = %key,
                    derived = derived.name(),
                    "resolved polymorphic variant"
                );
                if !derived.is_instance(&target) {
                    target = derived.create();
                    for &(tag, span) in &replay {
                        let field = derived.fields().get(tag).ok_or(
                            PolymorphicError::CannotConstruct {
                                type_name: info.name(),
                                derived: derived.name(),
                            },
                        )?;
                        field.merge(&mut target, &mut WireReader::new(span), registry)?;
                    }
                }
                fields = derived.fields();
                ignore_default_fields = derived.ignore_default_fields();
                level = derived.polymorphic();
            }
            None if polymorphic.fallback_to_base() => {
                tracing::debug!(
                    type_name = info.name(),
                    discriminator = %key,
                    "unknown discriminator, decoding as base"
                );
                break;
            }
            None => {
                return Err(PolymorphicError::UnknownType {
                    type_name: info.name(),
                    discriminator: key.to_string(),
                }
                .into());
            }
        }
    }

    let leading = replay.iter().map(|(tag, _)| *tag).collect();
    Ok((
        target,
        Resolved {
            fields,
            ignore_default_fields,
            leading,
        },
    ))
}

/// Reads the field that must come next, returning its tag and value bytes.
fn read_leading_field<'a, T: 'static>(
    type_name: &'static str,
    fields: &FieldTable<T>,
    number: u32,
    target: &mut T,
    reader: &mut WireReader<'a>,
    registry: &TypeRegistry,
) -> Result<(u32, &'a [u8])> {
    if reader.is_completed() {
        return Err(PolymorphicError::MissingDiscriminator {
            type_name,
            field: number,
        }
        .into());
    }
    let tag = reader.peek_tag()?;
    let not_first = PolymorphicError::DiscriminatorNotFirst {
        type_name,
        expected: number,
        actual: tag.field_number(),
    };
    if tag.field_number() != number {
        return Err(not_first.into());
    }
    let field = fields.get(tag.raw()).ok_or(not_first)?;
    reader.decode_tag()?;
    let start = reader.position();
    field.merge(target, reader, registry)?;
    Ok((tag.raw(), reader.consumed_since(start)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireError;

    #[derive(Default, Debug, PartialEq)]
    struct Base {
        kind: i32,
        label: String,
    }

    #[derive(Default, Debug, PartialEq)]
    struct Circle {
        base: Base,
        radius: f64,
    }

    #[derive(Debug, PartialEq)]
    enum Shape {
        Base(Base),
        Circle(Circle),
    }

    fn base_info() -> TypeInfo<Base> {
        TypeInfo::<Base>::builder("Base", Base::default)
            .field(1, "kind", |b| &b.kind, |b| &mut b.kind)
            .field(2, "label", |b| &b.label, |b| &mut b.label)
            .build()
            .unwrap()
    }

    fn circle_info() -> TypeInfo<Circle> {
        TypeInfo::<Circle>::builder("Circle", Circle::default)
            .flatten(&base_info(), |c| Some(&c.base), |c| Some(&mut c.base))
            .field(3, "radius", |c| &c.radius, |c| &mut c.radius)
            .ancestors(vec![1])
            .build()
            .unwrap()
    }

    fn shape_info(fallback: bool) -> TypeInfo<Shape> {
        let circle = DerivedTypeInfo::variant(
            &circle_info(),
            Shape::Circle,
            |s| match s {
                Shape::Circle(c) => Some(c),
                _ => None,
            },
            |s| match s {
                Shape::Circle(c) => Some(c),
                _ => None,
            },
        );
        let polymorphic = PolymorphicInfo::new(1, fallback).derived(2, circle).unwrap();
        TypeInfo::<Shape>::builder("Shape", || Shape::Base(Base::default()))
            .flatten(
                &base_info(),
                |s| match s {
                    Shape::Base(b) => Some(b),
                    _ => None,
                },
                |s| match s {
                    Shape::Base(b) => Some(b),
                    _ => None,
                },
            )
            .polymorphic(polymorphic)
            .build()
            .unwrap()
    }

    fn write(info: &TypeInfo<Shape>, value: &Shape) -> Vec<u8> {
        let registry = TypeRegistry::new();
        let mut out = Vec::new();
        let mut writer = WireWriter::new(&mut out);
        let resolved = write_discriminators(info, value, &mut writer, &registry).unwrap();
        for field in resolved.fields.iter() {
            if !resolved.leading.contains(&field.tag()) {
                field.write(value, &mut writer, &registry).unwrap();
            }
        }
        writer.dispose().unwrap();
        drop(writer);
        out
    }

    #[test]
    fn test_discriminator_selects_variant() {
        let info = shape_info(true);
        let circle = Shape::Circle(Circle {
            base: Base {
                kind: 2,
                label: "c".into(),
            },
            radius: 1.5,
        });
        let bytes = write(&info, &circle);
        assert_eq!(&bytes[..2], &[0x08, 0x02]);

        let registry = TypeRegistry::new();
        let mut reader = WireReader::new(&bytes);
        let (target, resolved) = read_discriminators(&info, &mut reader, &registry).unwrap();
        assert!(matches!(&target, Shape::Circle(c) if c.base.kind == 2));
        assert_eq!(resolved.fields.len(), 3);
        assert_eq!(resolved.leading, vec![0x08]);
    }

    #[test]
    fn test_unknown_discriminator_without_fallback() {
        let info = shape_info(false);
        let registry = TypeRegistry::new();
        let bytes = [0x08, 0x63];
        let result = read_discriminators(&info, &mut WireReader::new(&bytes), &registry);
        assert!(matches!(
            result,
            Err(WireError::Polymorphic(PolymorphicError::UnknownType { .. }))
        ));
    }

    #[test]
    fn test_discriminator_must_come_first() {
        let info = shape_info(true);
        let registry = TypeRegistry::new();
        let bytes = [0x12, 0x01, b'x', 0x08, 0x02];
        let result = read_discriminators(&info, &mut WireReader::new(&bytes), &registry);
        assert!(matches!(
            result,
            Err(WireError::Polymorphic(PolymorphicError::DiscriminatorNotFirst {
                expected: 1,
                actual: 2,
                ..
            }))
        ));
    }

    #[test]
    fn test_empty_input_is_missing_discriminator() {
        let info = shape_info(true);
        let registry = TypeRegistry::new();
        let result = read_discriminators(&info, &mut WireReader::new(&[]), &registry);
        assert!(matches!(
            result,
            Err(WireError::Polymorphic(PolymorphicError::MissingDiscriminator { field: 1, .. }))
        ));
    }

    #[test]
    fn test_duplicate_discriminator_rejected() {
        let derived = || {
            DerivedTypeInfo::variant(
                &circle_info(),
                Shape::Circle,
                |s| match s {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                |s| match s {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
            )
        };
        let result = PolymorphicInfo::new(1, true)
            .derived(2, derived())
            .and_then(|p| p.derived(2, derived()));
        assert!(matches!(
            result,
            Err(WireError::Metadata(MetadataError::DuplicateDiscriminator { .. }))
        ));
    }
}
