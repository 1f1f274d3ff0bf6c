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

//! Deferred, plain-data command queue.
//!
//! Every queued mutation is data, not a closure, so a buffer can be built
//! without ever touching the world it will later be applied to — except for
//! `spawn`, which reserves a real entity id up front (component insertion on
//! that id still happens at `apply` time). Insert payloads are staged in a
//! bump arena that resets each time the buffer drains, rather than one heap
//! allocation per queued component.

use std::ptr::NonNull;

use bumpalo::Bump;
use rustc_hash::FxHashSet;

use crate::component::{Component, ComponentId};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::world::World;

#[derive(Debug)]
pub enum Command {
    Spawn(EntityId),
    Despawn(EntityId),
    Insert {
        entity: EntityId,
        component: ComponentId,
        bytes: NonNull<u8>,
        size: usize,
    },
    Remove {
        entity: EntityId,
        component: ComponentId,
    },
}

/// FIFO queue of deferred world mutations.
pub struct CommandBuffer {
    commands: Vec<Command>,
    arena: Bump,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            arena: Bump::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            arena: Bump::new(),
        }
    }

    /// Reserve a new entity id immediately and queue its spawn. Component
    /// insertion on that id may be queued right away, even though the row
    /// itself is not placed in any archetype until `apply`.
    pub fn spawn(&mut self, world: &mut World) -> EntityId {
        let entity = world.entity_new();
        self.commands.push(Command::Spawn(entity));
        entity
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue a typed component insert, copying `value` into the buffer's arena.
    pub fn insert<T: Component>(&mut self, entity: EntityId, component: ComponentId, value: T) {
        let stored: &mut T = self.arena.alloc(value);
        let bytes = NonNull::from(stored).cast::<u8>();
        self.commands.push(Command::Insert {
            entity,
            component,
            bytes,
            size: std::mem::size_of::<T>(),
        });
    }

    /// Queue a raw-byte component insert, copying `bytes` into the buffer's arena.
    pub fn insert_raw(&mut self, entity: EntityId, component: ComponentId, bytes: &[u8]) {
        let stored = self.arena.alloc_slice_copy(bytes);
        let ptr = NonNull::new(stored.as_mut_ptr()).unwrap_or(NonNull::dangling());
        self.commands.push(Command::Insert {
            entity,
            component,
            bytes: ptr,
            size: bytes.len(),
        });
    }

    pub fn remove(&mut self, entity: EntityId, component: ComponentId) {
        self.commands.push(Command::Remove { entity, component });
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.arena.reset();
    }

    /// Drain and apply every queued command against `world`, in order.
    ///
    /// Operations targeting an entity despawned earlier in the same batch,
    /// or one that never existed, are skipped silently rather than erroring
    /// — a batch is a single logical unit of work, not a transaction that
    /// must validate every step in isolation. Calling `apply` while another
    /// `apply` on this world is already in progress fails with
    /// [`EcsError::NestedApply`].
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = tracing::info_span!("command_buffer.apply", queued = self.commands.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        world.begin_deferred()?;

        let mut despawned: FxHashSet<EntityId> = FxHashSet::default();
        for command in self.commands.drain(..) {
            match command {
                Command::Spawn(_) => {
                    // Entity id was already reserved in `spawn`; nothing further
                    // to do unless the caller also queued inserts for it.
                }
                Command::Despawn(entity) => {
                    if world.entity_exists(entity) {
                        let _ = world.entity_delete(entity);
                    }
                    despawned.insert(entity);
                }
                Command::Insert { entity, component, bytes, size } => {
                    if despawned.contains(&entity) || !world.entity_exists(entity) {
                        continue;
                    }
                    // SAFETY: `bytes` was allocated by this buffer's arena with
                    // exactly `size` bytes and has not been reset since.
                    let result = unsafe { world.set_raw(entity, component, bytes.as_ptr(), size) };
                    if let Err(err) = result {
                        self.arena.reset();
                        world.end_deferred();
                        return Err(err);
                    }
                }
                Command::Remove { entity, component } => {
                    if despawned.contains(&entity) || !world.entity_exists(entity) {
                        continue;
                    }
                    let _ = world.unset(entity, component);
                }
            }
        }

        self.arena.reset();
        world.end_deferred();
        Ok(())
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_applies_as_a_noop() {
        let mut world = World::new();
        let mut buffer = CommandBuffer::new();
        assert!(buffer.is_empty());
        buffer.apply(&mut world).unwrap();
    }

    #[test]
    fn despawn_then_insert_on_same_entity_skips_the_insert() {
        let mut world = World::new();
        let position = world.register_component("Position", 8, None).unwrap();
        let entity = world.entity_new();

        let mut buffer = CommandBuffer::new();
        buffer.despawn(entity);
        buffer.insert(entity, position, (1.0f32, 2.0f32));
        buffer.apply(&mut world).unwrap();

        assert!(!world.entity_exists(entity));
    }

    #[test]
    fn spawn_reserves_an_id_immediately_and_insert_targets_it() {
        let mut world = World::new();
        let position = world.register_component("Position", 8, None).unwrap();

        let mut buffer = CommandBuffer::new();
        let entity = buffer.spawn(&mut world);
        buffer.insert(entity, position, (3.0f32, 4.0f32));
        buffer.apply(&mut world).unwrap();

        assert!(world.entity_exists(entity));
        assert!(world.has(entity, position));
    }

    #[test]
    fn insert_on_an_unknown_entity_is_skipped_not_an_error() {
        let mut world = World::new();
        let position = world.register_component("Position", 8, None).unwrap();
        let ghost = EntityId::from_bits(0xFFFF);

        let mut buffer = CommandBuffer::new();
        buffer.insert(ghost, position, (0.0f32, 0.0f32));
        assert!(buffer.apply(&mut world).is_ok());
    }

    #[test]
    fn reentrant_apply_is_rejected() {
        let mut world = World::new();
        world.begin_deferred().unwrap();
        let mut buffer = CommandBuffer::new();
        assert_eq!(buffer.apply(&mut world), Err(EcsError::NestedApply));
        world.end_deferred();
    }

    #[test]
    fn clear_resets_the_arena_and_drops_queued_commands() {
        let mut world = World::new();
        let position = world.register_component("Position", 8, None).unwrap();
        let mut buffer = CommandBuffer::new();
        buffer.insert(EntityId::from_bits(1), position, (1.0f32, 1.0f32));
        buffer.clear();
        assert_eq!(buffer.len(), 0);
    }
}
