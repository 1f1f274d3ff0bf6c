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

//! `World`: the owner of the component registry, entity directory, and
//! archetype graph, and the single entry point for every mutation.

use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::Archetype;
use crate::archetype_graph::ArchetypeGraph;
use crate::component::{Bundle, Component, ComponentId, ComponentRegistry, MAX_BUNDLE_COMPONENTS};
use crate::entity::{EntityDirectory, EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::hierarchy::{Children, Parent};
use crate::query::QueryBuilder;
use crate::storage::StorageProvider;

type RowHook = Box<dyn Fn(EntityId)>;
type ComponentHook = Box<dyn Fn(EntityId, ComponentId)>;

#[derive(Default)]
struct Hooks {
    on_row_inserted: Vec<RowHook>,
    on_row_removed: Vec<RowHook>,
    on_component_written: Vec<ComponentHook>,
}

impl Hooks {
    fn fire_row_inserted(&self, entity: EntityId) {
        for hook in &self.on_row_inserted {
            hook(entity);
        }
    }

    fn fire_row_removed(&self, entity: EntityId) {
        for hook in &self.on_row_removed {
            hook(entity);
        }
    }

    fn fire_component_written(&self, entity: EntityId, component: ComponentId) {
        for hook in &self.on_component_written {
            hook(entity, component);
        }
    }
}

/// Memory/diagnostic snapshot returned by [`World::memory_stats`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub entity_count: usize,
    pub recycled_entity_count: usize,
    pub archetype_count: usize,
    pub chunk_count: usize,
    pub component_count: usize,
}

pub struct World {
    registry: ComponentRegistry,
    directory: EntityDirectory,
    graph: ArchetypeGraph,
    tick: u32,
    deferred_active: bool,
    hooks: Hooks,
    parent_component: ComponentId,
    children_component: ComponentId,
}

impl World {
    pub fn new() -> Self {
        Self::with_capacity_hints(1024, 64)
    }

    /// Create a world pre-sized for `entity_capacity` entities and
    /// `archetype_capacity` distinct archetypes, avoiding resize churn for
    /// workloads whose shape is known ahead of time.
    pub fn with_capacity_hints(entity_capacity: usize, archetype_capacity: usize) -> Self {
        let _ = archetype_capacity; // ArchetypeGraph pre-sizes its own tables internally.
        let mut registry = ComponentRegistry::new();
        let parent_component = registry
            .register_type::<Parent>("__Parent")
            .expect("built-in hierarchy component registration cannot fail");
        let children_component = registry
            .register_type::<Children>("__Children")
            .expect("built-in hierarchy component registration cannot fail");

        Self {
            registry,
            directory: EntityDirectory::with_capacity(entity_capacity),
            graph: ArchetypeGraph::new(),
            tick: 1, // tick 0 is reserved so every fresh component counts as changed/added.
            deferred_active: false,
            hooks: Hooks::default(),
            parent_component,
            children_component,
        }
    }

    // ---------------------------------------------------------------- tick

    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn increment_tick(&mut self) {
        if self.tick == u32::MAX {
            panic!("world tick overflow at {}", self.tick);
        }
        self.tick += 1;
    }

    // ----------------------------------------------------------- registry

    pub fn register_component(
        &mut self,
        name: &str,
        size_bytes: usize,
        storage_provider: Option<Arc<dyn StorageProvider>>,
    ) -> Result<ComponentId> {
        self.registry.register(name, size_bytes, storage_provider)
    }

    pub fn register_component_type<T: Component>(&mut self, name: &str) -> Result<ComponentId> {
        self.registry.register_type::<T>(name)
    }

    pub fn lookup_component(&self, name: &str) -> Option<ComponentId> {
        self.registry.lookup(name)
    }

    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    // ------------------------------------------------------------ entities

    /// Spawn an entity with no components, in the empty archetype.
    pub fn entity_new(&mut self) -> EntityId {
        let archetype_id = self.graph.empty_archetype_id();
        self.place_new_entity(archetype_id, None)
    }

    /// Spawn an entity at a caller-chosen id. Fails (without side effects) if
    /// that index is already live, or if the generation is stale relative to
    /// what this directory has already retired for that index.
    pub fn entity_new_with_id(&mut self, desired: EntityId) -> Option<EntityId> {
        let archetype_id = self.graph.empty_archetype_id();
        self.place_new_entity(archetype_id, Some(desired))
    }

    fn place_new_entity(&mut self, archetype_id: usize, desired: Option<EntityId>) -> EntityId {
        let placeholder = EntityLocation { archetype_id, chunk_index: usize::MAX, row: usize::MAX };
        let entity = match desired {
            None => self.directory.alloc(placeholder),
            Some(id) => match self.directory.alloc_with_id(id, placeholder) {
                Some(id) => id,
                None => return id, // caller must check `entity_exists`/location to see this failed
            },
        };

        let (chunk_index, row) = self.graph.get_mut(archetype_id).allocate_row(entity, self.tick);
        self.directory.set_location(entity, EntityLocation { archetype_id, chunk_index, row });
        self.hooks.fire_row_inserted(entity);
        entity
    }

    pub fn entity_exists(&self, entity: EntityId) -> bool {
        self.directory.is_live(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.directory.len()
    }

    /// Remove an entity's row, detaching it from any parent/children.
    pub fn entity_delete(&mut self, entity: EntityId) -> Result<()> {
        let location = self.directory.locate(entity).ok_or(EcsError::InvalidEntity)?;
        self.detach_from_hierarchy(entity);

        let swapped = self.graph.get_mut(location.archetype_id).remove_row(location.chunk_index, location.row);
        if let Some(swapped_entity) = swapped {
            self.directory.set_location(swapped_entity, location);
        }
        self.directory.free(entity);
        self.hooks.fire_row_removed(entity);
        Ok(())
    }

    fn detach_from_hierarchy(&mut self, entity: EntityId) {
        if let Some(Parent(parent)) = self.get::<Parent>(entity, self.parent_component).copied() {
            self.remove_child(parent, entity);
        }
        if let Some(children) = self.get::<Children>(entity, self.children_component) {
            let children: Vec<EntityId> = children.iter().copied().collect();
            for child in children {
                let _ = self.unset(child, self.parent_component);
            }
        }
    }

    // --------------------------------------------------------- components

    /// Write `size` bytes from `src` into `entity`'s `component` column,
    /// transitioning to a new archetype if the entity does not already carry
    /// that component.
    ///
    /// # Safety
    /// `src` must be valid for `size` bytes, and `size` must match the
    /// registered size of `component`.
    pub unsafe fn set_raw(&mut self, entity: EntityId, component: ComponentId, src: *const u8, size: usize) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.set", component = component.index());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let location = self.directory.locate(entity).ok_or(EcsError::InvalidEntity)?;
        if self.registry.descriptor(component).is_none() {
            return Err(EcsError::UnknownComponent);
        }

        let archetype = self.graph.get_mut(location.archetype_id);
        if let Some(col_index) = archetype.column_index(component) {
            let chunk = archetype.chunk_mut(location.chunk_index).expect("location must address a live chunk");
            chunk.write_component(col_index, location.row, src, self.tick, false);
        } else {
            self.transition_in_component(entity, location, component, src, size)?;
        }

        self.hooks.fire_component_written(entity, component);
        Ok(())
    }

    /// Move `entity` into the archetype formed by adding `component`, copying
    /// its existing column data across, then write the new component's bytes.
    fn transition_in_component(
        &mut self,
        entity: EntityId,
        old_location: EntityLocation,
        component: ComponentId,
        src: *const u8,
        size: usize,
    ) -> Result<()> {
        let new_archetype_id = self.graph.resolve_add_edge(old_location.archetype_id, component, &self.registry);
        let new_location = self.move_row(entity, old_location, new_archetype_id)?;

        let new_archetype = self.graph.get_mut(new_location.archetype_id);
        let col_index = new_archetype
            .column_index(component)
            .expect("archetype returned by resolve_add_edge must carry the added component");
        let chunk = new_archetype.chunk_mut(new_location.chunk_index).unwrap();
        unsafe {
            chunk.write_component(col_index, new_location.row, src, self.tick, true);
        }
        let _ = size;
        Ok(())
    }

    /// Move `entity`'s row from its current archetype into `new_archetype_id`,
    /// copying every shared component column across, and return its new
    /// location. Rows swapped into the vacated slot have their directory
    /// entries fixed up.
    fn move_row(&mut self, entity: EntityId, old_location: EntityLocation, new_archetype_id: usize) -> Result<EntityLocation> {
        if old_location.archetype_id == new_archetype_id {
            return Ok(old_location);
        }

        let (chunk_index, row) = self.graph.get_mut(new_archetype_id).allocate_row(entity, self.tick);
        let new_location = EntityLocation { archetype_id: new_archetype_id, chunk_index, row };

        let shared: Vec<ComponentId> = {
            let old_archetype = self.graph.get(old_location.archetype_id);
            let new_archetype = self.graph.get(new_archetype_id);
            new_archetype
                .signature()
                .iter()
                .copied()
                .filter(|id| old_archetype.has_component(*id))
                .collect()
        };

        for component in shared {
            unsafe {
                self.copy_component(old_location, new_location, component);
            }
        }

        self.hooks.fire_row_removed(entity);
        let swapped = self.graph.get_mut(old_location.archetype_id).remove_row(old_location.chunk_index, old_location.row);
        if let Some(swapped_entity) = swapped {
            self.directory.set_location(swapped_entity, old_location);
        }

        self.directory.set_location(entity, new_location);
        self.hooks.fire_row_inserted(entity);
        Ok(new_location)
    }

    /// # Safety
    /// Both locations must address live rows carrying `component`.
    unsafe fn copy_component(&mut self, src_location: EntityLocation, dst_location: EntityLocation, component: ComponentId) {
        let size = self.registry.descriptor(component).map(|d| d.size_bytes).unwrap_or(0);
        let (src_ptr, src_added_tick) = {
            let src_archetype = self.graph.get(src_location.archetype_id);
            let idx = src_archetype.column_index(component).unwrap();
            let chunk = src_archetype.chunk(src_location.chunk_index).unwrap();
            let ptr = chunk.component_ptr(idx, src_location.row);
            let added_tick = chunk.column(idx).unwrap().added_tick[src_location.row];
            (ptr, added_tick)
        };
        let dst_archetype = self.graph.get_mut(dst_location.archetype_id);
        let idx = dst_archetype.column_index(component).unwrap();
        let chunk = dst_archetype.chunk_mut(dst_location.chunk_index).unwrap();
        chunk.write_component(idx, dst_location.row, src_ptr, self.tick, false);
        // A carried-over component keeps its original added_tick: the row is
        // new, but the component on it isn't.
        chunk.set_added_tick(idx, dst_location.row, src_added_tick);
        let _ = size;
    }

    /// Remove `component` from `entity`, transitioning it to the archetype
    /// formed by dropping that component. A no-op if the entity does not
    /// carry it.
    pub fn unset(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        let location = self.directory.locate(entity).ok_or(EcsError::InvalidEntity)?;
        if self.graph.get(location.archetype_id).column_index(component).is_none() {
            return Ok(());
        }
        let new_archetype_id = self.graph.resolve_remove_edge(location.archetype_id, component, &self.registry);
        self.move_row(entity, location, new_archetype_id)?;
        Ok(())
    }

    pub fn has(&self, entity: EntityId, component: ComponentId) -> bool {
        self.directory
            .locate(entity)
            .map(|loc| self.graph.get(loc.archetype_id).has_component(component))
            .unwrap_or(false)
    }

    /// Register the presence of a zero-size tag component on `entity`.
    pub fn add_tag(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        unsafe { self.set_raw(entity, component, std::ptr::null(), 0) }
    }

    /// Bump `component`'s changed-tick for `entity` without touching its
    /// bytes — for components written through a host-managed storage
    /// provider that bypasses `set`.
    pub fn mark_changed(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        let location = self.directory.locate(entity).ok_or(EcsError::InvalidEntity)?;
        let archetype = self.graph.get_mut(location.archetype_id);
        let col_index = archetype.column_index(component).ok_or(EcsError::UnknownComponent)?;
        archetype.chunk_mut(location.chunk_index).unwrap().mark_changed(col_index, location.row, self.tick);
        Ok(())
    }

    pub fn set<T: Component>(&mut self, entity: EntityId, component: ComponentId, value: T) -> Result<()> {
        let result = unsafe { self.set_raw(entity, component, &value as *const T as *const u8, std::mem::size_of::<T>()) };
        if result.is_ok() {
            // The bytes were moved into chunk storage by raw copy; forget `value`
            // so its destructor doesn't free memory the chunk now owns.
            std::mem::forget(value);
        }
        result
    }

    pub fn get<T: Component>(&self, entity: EntityId, component: ComponentId) -> Option<&T> {
        let location = self.directory.locate(entity)?;
        let archetype = self.graph.get(location.archetype_id);
        let idx = archetype.column_index(component)?;
        let chunk = archetype.chunk(location.chunk_index)?;
        Some(unsafe { &*(chunk.component_ptr(idx, location.row) as *const T) })
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId, component: ComponentId) -> Option<&mut T> {
        let location = self.directory.locate(entity)?;
        let tick = self.tick;
        let archetype = self.graph.get_mut(location.archetype_id);
        let idx = archetype.column_index(component)?;
        let chunk = archetype.chunk_mut(location.chunk_index)?;
        chunk.mark_changed(idx, location.row, tick);
        Some(unsafe { &mut *(chunk.component_ptr_mut(idx, location.row) as *mut T) })
    }

    // -------------------------------------------------------------- spawn

    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<EntityId> {
        let mut ids = B::component_ids(&self.registry).ok_or(EcsError::UnknownComponent)?;
        let mut sorted: Vec<ComponentId> = ids.drain(..).collect();
        sorted.sort();

        let archetype_id = self.graph.find_or_create(&sorted, &self.registry);
        let entity = self.place_new_entity(archetype_id, None);

        let location = self.directory.locate(entity).unwrap();
        let archetype = self.graph.get_mut(archetype_id);
        let mut ptrs = [std::ptr::null_mut(); MAX_BUNDLE_COMPONENTS];
        let chunk = archetype.chunk_mut(location.chunk_index).unwrap();
        for (i, &id) in sorted.iter().enumerate() {
            let idx = archetype_column_index(archetype, id);
            ptrs[i] = unsafe { chunk_ptr_mut(chunk, idx, location.row) };
        }

        unsafe {
            bundle.write_components(&ptrs[..sorted.len()]);
        }
        Ok(entity)
    }

    /// Spawn many entities sharing one bundle type, amortizing the
    /// archetype lookup across the whole batch.
    pub fn spawn_batch<B, I>(&mut self, bundles: I) -> Result<Vec<EntityId>>
    where
        B: Bundle,
        I: IntoIterator<Item = B>,
    {
        let mut ids = B::component_ids(&self.registry).ok_or(EcsError::UnknownComponent)?;
        let mut sorted: Vec<ComponentId> = ids.drain(..).collect();
        sorted.sort();
        let archetype_id = self.graph.find_or_create(&sorted, &self.registry);

        let mut out = Vec::new();
        for bundle in bundles {
            let entity = self.place_new_entity(archetype_id, None);
            let location = self.directory.locate(entity).unwrap();
            let archetype = self.graph.get_mut(archetype_id);
            let mut ptrs = [std::ptr::null_mut(); MAX_BUNDLE_COMPONENTS];
            let chunk = archetype.chunk_mut(location.chunk_index).unwrap();
            for (i, &id) in sorted.iter().enumerate() {
                let idx = archetype_column_index(archetype, id);
                ptrs[i] = unsafe { chunk_ptr_mut(chunk, idx, location.row) };
            }
            unsafe {
                bundle.write_components(&ptrs[..sorted.len()]);
            }
            out.push(entity);
        }
        Ok(out)
    }

    // --------------------------------------------------------- deferred

    /// Enter a deferred-apply region. Fails with [`EcsError::NestedApply`]
    /// if one is already active.
    pub fn begin_deferred(&mut self) -> Result<()> {
        if self.deferred_active {
            return Err(EcsError::NestedApply);
        }
        self.deferred_active = true;
        Ok(())
    }

    pub fn end_deferred(&mut self) {
        self.deferred_active = false;
    }

    pub fn is_deferred_active(&self) -> bool {
        self.deferred_active
    }

    // ----------------------------------------------------------- queries

    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    pub(crate) fn archetype_graph_version(&self) -> u64 {
        self.graph.graph_version()
    }

    pub(crate) fn archetype(&self, id: usize) -> &Archetype {
        self.graph.get(id)
    }

    pub(crate) fn archetypes_iter(&self) -> impl Iterator<Item = (usize, &Archetype)> {
        self.graph.iter()
    }

    pub fn archetype_count(&self) -> usize {
        self.graph.len()
    }

    // -------------------------------------------------------------- hooks

    pub fn on_row_inserted(&mut self, hook: impl Fn(EntityId) + 'static) {
        self.hooks.on_row_inserted.push(Box::new(hook));
    }

    pub fn on_row_removed(&mut self, hook: impl Fn(EntityId) + 'static) {
        self.hooks.on_row_removed.push(Box::new(hook));
    }

    pub fn on_component_written(&mut self, hook: impl Fn(EntityId, ComponentId) + 'static) {
        self.hooks.on_component_written.push(Box::new(hook));
    }

    // ------------------------------------------------------------ upkeep

    pub fn remove_empty_archetypes(&mut self) {
        self.graph.remove_empty_archetypes();
    }

    /// Despawn every entity and drop every non-bootstrap archetype, keeping
    /// the component registry intact.
    pub fn world_clear(&mut self) {
        self.directory.clear();
        self.graph.clear();
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let chunk_count: usize = self.graph.iter().map(|(_, a)| a.chunks().len()).sum();
        MemoryStats {
            entity_count: self.directory.len(),
            recycled_entity_count: self.directory.recycled_count(),
            archetype_count: self.graph.len(),
            chunk_count,
            component_count: self.registry.len(),
        }
    }

    // -------------------------------------------------------- hierarchy

    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<()> {
        if !self.entity_exists(parent) || !self.entity_exists(child) {
            return Err(EcsError::InvalidEntity);
        }
        if parent == child || self.is_ancestor_of(child, parent) {
            return Err(EcsError::WouldCycle);
        }

        if let Some(&Parent(old_parent)) = self.get::<Parent>(child, self.parent_component) {
            self.remove_child(old_parent, child);
        }

        self.set(child, self.parent_component, Parent::new(parent))?;
        match self.get_mut::<Children>(parent, self.children_component) {
            Some(children) => children.add_child(child),
            None => {
                let mut children = Children::new();
                children.add_child(child);
                self.set(parent, self.children_component, children)?;
            }
        }
        Ok(())
    }

    /// Detach `child` from `parent`. Returns `true` if it was actually
    /// parented there.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        let was_child = self
            .get_mut::<Children>(parent, self.children_component)
            .map(|children| children.remove_child(child))
            .unwrap_or(false);
        if was_child {
            let _ = self.unset(child, self.parent_component);
            let empty = self.get::<Children>(parent, self.children_component).map(|c| c.is_empty()).unwrap_or(false);
            if empty {
                let _ = self.unset(parent, self.children_component);
            }
        }
        was_child
    }

    pub fn remove_all_children(&mut self, parent: EntityId) {
        let children: Vec<EntityId> = self
            .get::<Children>(parent, self.children_component)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();
        for child in children {
            self.remove_child(parent, child);
        }
    }

    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.get::<Parent>(entity, self.parent_component).map(|p| p.entity_id())
    }

    pub fn has_parent(&self, entity: EntityId) -> bool {
        self.has(entity, self.parent_component)
    }

    pub fn children_of(&self, entity: EntityId) -> &[EntityId] {
        self.get::<Children>(entity, self.children_component)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_count(&self, entity: EntityId) -> usize {
        self.children_of(entity).len()
    }

    /// True if `ancestor` appears somewhere in `entity`'s parent chain.
    pub fn is_ancestor_of(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut current = entity;
        let mut steps = 0usize;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
            steps += 1;
            if steps > self.directory.len() {
                // Would only trip if a cycle slipped past add_child, which it cannot.
                return false;
            }
        }
        false
    }

    pub fn is_descendant_of(&self, entity: EntityId, ancestor: EntityId) -> bool {
        self.is_ancestor_of(ancestor, entity)
    }

    pub fn hierarchy_depth(&self, entity: EntityId) -> usize {
        let mut depth = 0;
        let mut current = entity;
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn traverse_children(&self, entity: EntityId, callback: &mut impl FnMut(EntityId)) {
        for &child in self.children_of(entity) {
            callback(child);
            self.traverse_children(child, callback);
        }
    }

    pub fn traverse_ancestors(&self, entity: EntityId, callback: &mut impl FnMut(EntityId)) {
        let mut current = entity;
        while let Some(parent) = self.parent_of(current) {
            callback(parent);
            current = parent;
        }
    }
}

fn archetype_column_index(archetype: &Archetype, id: ComponentId) -> usize {
    archetype.column_index(id).expect("spawned archetype must carry every bundle component")
}

/// # Safety
/// `idx`/`row` must address a live column and row of `chunk`.
unsafe fn chunk_ptr_mut(chunk: &mut crate::chunk::Chunk, idx: usize, row: usize) -> *mut u8 {
    chunk.component_ptr_mut(idx, row)
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
