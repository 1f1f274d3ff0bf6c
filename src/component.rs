// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component registry: dense ids, descriptors, and `Bundle` spawn sugar.
//!
//! Registration is always an explicit call (`register`/`register_type`); the
//! registry never infers a component from type reflection. `T: Component` is
//! just a marker bound — it does not register `T` by itself.

use std::any::TypeId;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

use crate::error::{EcsError, Result};
use crate::storage::{default_storage_provider, StorageProvider};

/// Maximum number of components supported by `Bundle` tuple implementations.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for Rust types usable as component payloads.
///
/// Components must be `'static` (no borrowed data). Implementing this trait
/// does not register the type with any [`ComponentRegistry`] — registration
/// is always an explicit [`ComponentRegistry::register_type`] call.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Dense, small component id assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// `(id, name, size_bytes, storage_provider)` for one registered component.
///
/// `size_bytes == 0` marks a tag component: no column bytes are ever
/// allocated for it, only its presence in an archetype's signature.
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub id: ComponentId,
    pub name: Box<str>,
    pub size_bytes: usize,
    pub storage_provider: Arc<dyn StorageProvider>,
}

impl ComponentDescriptor {
    #[inline]
    pub fn is_tag(&self) -> bool {
        self.size_bytes == 0
    }
}

/// Assigns dense component ids, records descriptors, and resolves
/// name → id lookups. Names are unique and compared case-sensitively.
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
    by_name: FxHashMap<Box<str>, ComponentId>,
    /// Internal convenience cache from a registered Rust type to its id, used
    /// only by the typed sugar (`register_type`/`World::set::<T>`) this crate
    /// layers on top of the byte-oriented core. Never populated implicitly.
    by_type: FxHashMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::with_capacity(32),
            by_name: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    /// Register a component by name, size, and an optional storage provider
    /// (defaulting to the flat-buffer provider). Idempotent when called again
    /// with the same name and size; fails with `DuplicateName` if the size
    /// disagrees with a prior registration.
    pub fn register(
        &mut self,
        name: &str,
        size_bytes: usize,
        storage_provider: Option<Arc<dyn StorageProvider>>,
    ) -> Result<ComponentId> {
        if let Some(&id) = self.by_name.get(name) {
            let existing = &self.descriptors[id.index()];
            return if existing.size_bytes == size_bytes {
                Ok(id)
            } else {
                Err(EcsError::DuplicateName)
            };
        }

        let id = ComponentId(self.descriptors.len() as u32);
        let provider = storage_provider.unwrap_or_else(default_storage_provider);
        self.descriptors.push(ComponentDescriptor {
            id,
            name: name.into(),
            size_bytes,
            storage_provider: provider,
        });
        self.by_name.insert(name.into(), id);
        Ok(id)
    }

    /// Register a Rust type `T` under `name`, caching the `TypeId -> ComponentId`
    /// mapping so `World`'s typed `set`/`get` sugar can find it later. This is
    /// still an explicit call the caller makes per type; nothing is inferred
    /// from `T` beyond its size.
    pub fn register_type<T: Component>(&mut self, name: &str) -> Result<ComponentId> {
        let id = self.register(name, std::mem::size_of::<T>(), None)?;
        self.by_type.insert(TypeId::of::<T>(), id);
        Ok(id)
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn lookup_type<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    #[inline]
    pub fn descriptor(&self, id: ComponentId) -> Option<&ComponentDescriptor> {
        self.descriptors.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A statically-known group of components, spawned together in one
/// archetype transition. Ergonomic sugar over the byte-oriented core: every
/// `T` in a bundle must already be registered via [`ComponentRegistry::register_type`].
pub trait Bundle: Send + Sync + 'static {
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Resolve each field's [`ComponentId`] in the registry, in the same
    /// order as [`Bundle::type_ids`]. Returns `None` if any field's type was
    /// never registered via [`ComponentRegistry::register_type`].
    fn component_ids(registry: &ComponentRegistry) -> Option<SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>>
    where
        Self: Sized;

    /// # Safety
    /// Caller must ensure `ptrs` holds one valid, correctly-sized, properly
    /// aligned pointer per component in registration order.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn component_ids(registry: &ComponentRegistry) -> Option<SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>> {
                Some(smallvec![$(registry.lookup_type::<$T>()?),*])
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
                let _ = i;
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy)]
    struct Velocity {
        x: f32,
    }

    #[test]
    fn register_is_idempotent_for_matching_size() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("Position", 8, None).unwrap();
        let b = reg.register("Position", 8, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_rejects_size_mismatch() {
        let mut reg = ComponentRegistry::new();
        reg.register("Position", 8, None).unwrap();
        assert_eq!(reg.register("Position", 4, None), Err(EcsError::DuplicateName));
    }

    #[test]
    fn lookup_miss_returns_none() {
        let reg = ComponentRegistry::new();
        assert!(reg.lookup("Nope").is_none());
    }

    #[test]
    fn zero_size_registration_is_a_tag() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register("Marker", 0, None).unwrap();
        assert!(reg.descriptor(id).unwrap().is_tag());
    }

    #[test]
    fn bundle_type_ids_preserve_order() {
        let ids = <(Position, Velocity)>::type_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], TypeId::of::<Position>());
        assert_eq!(ids[1], TypeId::of::<Velocity>());
    }
}
