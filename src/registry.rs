//! Process-wide cache of field tables.

use crate::metadata::TypeInfo;
use crate::{Result, WireMessage};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type Entry = Arc<dyn Any + Send + Sync>;

/// Maps message types to their field tables.
///
/// Tables are built lazily on first use and never replaced: when two threads race to register
/// the same type, the first installed table wins and both callers receive it.
#[derive(Default)]
pub struct TypeRegistry {
    entries: RwLock<HashMap<TypeId, Entry>>,
}

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the crate-level convenience functions.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// The installed table for `T`, if any.
    pub fn get<T: 'static>(&self) -> Option<Arc<TypeInfo<T>>> {
        let entry = self.entries.read().get(&TypeId::of::<TypeInfo<T>>()).cloned()?;
        entry.downcast::<TypeInfo<T>>().ok()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries
            .read()
            .contains_key(&TypeId::of::<TypeInfo<T>>())
    }

    /// Installs `info` unless a table for `T` is already present, returning the installed table.
    pub fn register<T: 'static>(&self, info: TypeInfo<T>) -> Arc<TypeInfo<T>> {
        self.install(Arc::new(info))
    }

    /// The table for `T`, building and installing it on first use.
    ///
    /// The table is built outside the lock, so building may itself resolve other types.
    pub fn resolve<T: WireMessage>(&self) -> Result<Arc<TypeInfo<T>>> {
        if let Some(info) = self.get::<T>() {
            return Ok(info);
        }
        let candidate = T::type_info()?;
        tracing::debug!(
            type_name = candidate.name(),
            fields = candidate.fields().len(),
            "registering field table"
        );
        Ok(self.install(Arc::new(candidate)))
    }

    fn install<T: 'static>(&self, candidate: Arc<TypeInfo<T>>) -> Arc<TypeInfo<T>> {
        let winner = {
            let mut entries = self.entries.write();
            Arc::clone(
                entries
                    .entry(TypeId::of::<TypeInfo<T>>())
                    .or_insert_with(|| Arc::clone(&candidate) as Entry),
            )
        };
        match winner.downcast::<TypeInfo<T>>() {
            Ok(installed) => {
                if !Arc::ptr_eq(&installed, &candidate) {
                    tracing::trace!(
                        type_name = candidate.name(),
                        "field table already registered"
                    );
                }
                installed
            }
            Err(_) => candidate,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}
