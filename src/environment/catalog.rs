//! Catalog of self-describing types, used for just-in-time bindings.

use std::any::TypeId;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::constructor::{plan_of, ConstructorPlan, Injectable};
use crate::key::Key;
use crate::lifetime::Lifetime;

#[derive(Clone, Copy)]
pub(crate) struct CatalogEntry {
    pub(crate) key: Key,
    pub(crate) plan: fn() -> ConstructorPlan,
    pub(crate) lifetime: fn() -> Lifetime,
}

impl CatalogEntry {
    pub(crate) fn of<T: Injectable>() -> Self {
        Self {
            key: Key::of::<T>(),
            plan: plan_of::<T>,
            lifetime: T::lifetime,
        }
    }
}

/// Types registered through `BindingCollection::describe`, shared by every
/// environment of one injector.
#[derive(Default)]
pub(crate) struct TypeCatalog {
    entries: RwLock<HashMap<TypeId, CatalogEntry>>,
}

impl TypeCatalog {
    pub(crate) fn register(&self, entry: CatalogEntry) {
        self.entries.write().insert(entry.key.type_id(), entry);
    }

    pub(crate) fn get(&self, key: &Key) -> Option<CatalogEntry> {
        self.entries.read().get(&key.type_id()).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
