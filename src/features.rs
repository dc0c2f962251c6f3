#[cfg(feature = "indexmap")]
use indexmap::IndexMap;
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;

#[allow(unused_imports)]
use crate::core::*;
#[allow(unused_imports)]
use crate::metadata::{FieldSpec, ValueSpec};
#[allow(unused_imports)]
use crate::polymorphic::Discriminator;
#[allow(unused_imports)]
use crate::{Result, TypeRegistry, WireError, WireReader, WireType, WireWriter};

// --- IndexMap ---
#[cfg(feature = "indexmap")]
impl<K, V> WireField for IndexMap<K, V>
where
    K: WireField + Default + Eq + std::hash::Hash,
    V: WireField + Default,
{
    map_field_body!();
}

// --- SmolStr ---
#[cfg(feature = "smol_str")]
impl WireField for SmolStr {
    fn wire_kind() -> WireKind {
        WireKind::Scalar(ScalarKind::new(WireType::LengthDelimited, false))
    }

    fn write_value(
        &self,
        spec: ValueSpec,
        writer: &mut WireWriter<'_>,
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match spec.wire_type {
            WireType::LengthDelimited => writer.encode_string(self),
            other => Err(WireError::TypeMismatch {
                expected: "SmolStr",
                wire_type: other,
            }),
        }
    }

    fn read_value(
        spec: ValueSpec,
        reader: &mut WireReader<'_>,
        _registry: &TypeRegistry,
    ) -> Result<Self> {
        match spec.wire_type {
            WireType::LengthDelimited => Ok(SmolStr::new(reader.decode_string()?)),
            other => Err(WireError::TypeMismatch {
                expected: "SmolStr",
                wire_type: other,
            }),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }

    fn discriminator(&self) -> Option<Discriminator> {
        Some(Discriminator::Text(self.to_string()))
    }
}
