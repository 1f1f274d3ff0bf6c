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

//! Runtime, declarative queries over component ids.
//!
//! A [`QueryBuilder`] collects `With`/`Without`/`Optional`/`Changed`/`Added`
//! terms and builds a [`Query`], which caches the set of matching archetypes
//! against the world's archetype-graph version so repeated `run` calls only
//! rescan archetypes created since the last call.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::chunk::Chunk;
use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    With(ComponentId),
    Without(ComponentId),
    Optional(ComponentId),
    Changed(ComponentId),
    Added(ComponentId),
}

/// Accumulates query terms before validation in [`QueryBuilder::build`].
pub struct QueryBuilder<'w> {
    world: &'w World,
    with: SmallVec<[ComponentId; 8]>,
    without: SmallVec<[ComponentId; 4]>,
    optional: SmallVec<[ComponentId; 4]>,
    changed: SmallVec<[ComponentId; 4]>,
    added: SmallVec<[ComponentId; 4]>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            with: SmallVec::new(),
            without: SmallVec::new(),
            optional: SmallVec::new(),
            changed: SmallVec::new(),
            added: SmallVec::new(),
        }
    }

    pub fn with(mut self, component: ComponentId) -> Self {
        self.with.push(component);
        self
    }

    pub fn without(mut self, component: ComponentId) -> Self {
        self.without.push(component);
        self
    }

    pub fn optional(mut self, component: ComponentId) -> Self {
        self.optional.push(component);
        self
    }

    pub fn changed(mut self, component: ComponentId) -> Self {
        self.changed.push(component);
        self
    }

    pub fn added(mut self, component: ComponentId) -> Self {
        self.added.push(component);
        self
    }

    /// Validate the accumulated terms and produce a runnable [`Query`].
    /// Fails with [`EcsError::InvalidQuery`] if any component is required
    /// (via `With`/`Changed`/`Added`) and excluded (via `Without`) at once.
    pub fn build(self) -> Result<Query> {
        let required: FxHashSet<ComponentId> = self
            .with
            .iter()
            .chain(&self.changed)
            .chain(&self.added)
            .copied()
            .collect();
        if self.without.iter().any(|id| required.contains(id)) {
            return Err(EcsError::InvalidQuery);
        }

        Ok(Query {
            with: self.with,
            without: self.without,
            optional: self.optional,
            changed: self.changed,
            added: self.added,
            matched_archetypes: Vec::new(),
            graph_version_seen: u64::MAX,
            last_run_tick: 0,
            _world_hint: self.world as *const World as usize,
        })
    }
}

/// A validated, runnable query. Holds the matched-archetype cache and the
/// tick watermark used for `Changed`/`Added` filtering across runs.
pub struct Query {
    with: SmallVec<[ComponentId; 8]>,
    without: SmallVec<[ComponentId; 4]>,
    optional: SmallVec<[ComponentId; 4]>,
    changed: SmallVec<[ComponentId; 4]>,
    added: SmallVec<[ComponentId; 4]>,
    matched_archetypes: Vec<usize>,
    graph_version_seen: u64,
    last_run_tick: u32,
    // Diagnostic only: which world this query was built against, so a
    // debug build can assert callers don't hand it a different world.
    _world_hint: usize,
}

impl Query {
    fn matches(&self, archetype: &Archetype) -> bool {
        self.with.iter().all(|&id| archetype.has_component(id))
            && self.changed.iter().all(|&id| archetype.has_component(id))
            && self.added.iter().all(|&id| archetype.has_component(id))
            && self.without.iter().all(|&id| !archetype.has_component(id))
    }

    fn refresh(&mut self, world: &World) {
        if world.archetype_graph_version() == self.graph_version_seen {
            return;
        }
        self.matched_archetypes.clear();
        for (id, archetype) in world.archetypes_iter() {
            if self.matches(archetype) {
                self.matched_archetypes.push(id);
            }
        }
        self.graph_version_seen = world.archetype_graph_version();
    }

    /// Run the query against `world`, returning a streaming iterator over
    /// matching rows. `Changed`/`Added` terms are evaluated against the tick
    /// watermark left by the previous `run` call (or tick 0 on the first run,
    /// so everything counts as changed/added).
    pub fn run<'w>(&mut self, world: &'w World) -> QueryIter<'w> {
        debug_assert_eq!(self._world_hint, world as *const World as usize, "query run against a different world than it was built for");
        self.refresh(world);
        let compare_tick = self.last_run_tick;
        self.last_run_tick = world.tick();

        QueryIter {
            world,
            matched: self.matched_archetypes.clone(),
            changed: self.changed.clone(),
            added: self.added.clone(),
            compare_tick,
            archetype_pos: 0,
            chunk_pos: 0,
            row_pos: 0,
        }
    }

    pub fn matched_archetype_count(&self) -> usize {
        self.matched_archetypes.len()
    }
}

/// Streaming iterator over the rows matched by a [`Query::run`] call.
///
/// Holds `&'w World` for its entire lifetime, so the borrow checker — not a
/// runtime guard — rejects any attempt to structurally mutate the world
/// (which needs `&mut World`) while an iterator is live.
pub struct QueryIter<'w> {
    world: &'w World,
    matched: Vec<usize>,
    changed: SmallVec<[ComponentId; 4]>,
    added: SmallVec<[ComponentId; 4]>,
    compare_tick: u32,
    archetype_pos: usize,
    chunk_pos: usize,
    row_pos: usize,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = QueryItem<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &archetype_id = self.matched.get(self.archetype_pos)?;
            let archetype = self.world.archetype(archetype_id);

            let chunk = match archetype.chunk(self.chunk_pos) {
                Some(chunk) => chunk,
                None => {
                    self.archetype_pos += 1;
                    self.chunk_pos = 0;
                    self.row_pos = 0;
                    continue;
                }
            };

            if self.row_pos >= chunk.count() {
                self.chunk_pos += 1;
                self.row_pos = 0;
                continue;
            }

            let row = self.row_pos;
            self.row_pos += 1;

            if self.row_is_stale(archetype, chunk, row) {
                continue;
            }

            return Some(QueryItem {
                entity: chunk.entities()[row],
                archetype,
                chunk,
                row,
                compare_tick: self.compare_tick,
            });
        }
    }
}

impl<'w> QueryIter<'w> {
    fn row_is_stale(&self, archetype: &Archetype, chunk: &Chunk, row: usize) -> bool {
        let changed_stale = self.changed.iter().any(|&id| {
            let idx = archetype
                .column_index(id)
                .expect("matched archetype must carry every `changed` term");
            chunk.column(idx).unwrap().changed_tick[row] <= self.compare_tick
        });
        if changed_stale {
            return true;
        }
        self.added.iter().any(|&id| {
            let idx = archetype
                .column_index(id)
                .expect("matched archetype must carry every `added` term");
            chunk.column(idx).unwrap().added_tick[row] <= self.compare_tick
        })
    }
}

/// One matched row, with raw accessors keyed by [`ComponentId`].
pub struct QueryItem<'w> {
    entity: EntityId,
    archetype: &'w Archetype,
    chunk: &'w Chunk,
    row: usize,
    compare_tick: u32,
}

impl<'w> QueryItem<'w> {
    #[inline]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[inline]
    pub fn has(&self, component: ComponentId) -> bool {
        self.archetype.has_component(component)
    }

    /// Pointer to this row's column data for `component`, or `None` if the
    /// matched archetype doesn't carry it (only possible for `Optional` terms).
    pub fn component(&self, component: ComponentId) -> Option<*const u8> {
        let idx = self.archetype.column_index(component)?;
        Some(unsafe { self.chunk.component_ptr(idx, self.row) })
    }

    pub fn was_added(&self, component: ComponentId) -> bool {
        self.archetype
            .column_index(component)
            .map(|idx| self.chunk.column(idx).unwrap().added_tick[self.row] > self.compare_tick)
            .unwrap_or(false)
    }

    pub fn was_changed(&self, component: ComponentId) -> bool {
        self.archetype
            .column_index(component)
            .map(|idx| self.chunk.column(idx).unwrap().changed_tick[self.row] > self.compare_tick)
            .unwrap_or(false)
    }
}
