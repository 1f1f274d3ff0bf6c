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

//! Archetype: an invariant, sorted set of component ids, the chunks that
//! hold its rows, and the cached add/remove edges to neighbor archetypes.

use rustc_hash::FxHashMap;

use crate::chunk::{Chunk, ColumnSpec};
use crate::component::ComponentId;
use crate::entity::EntityId;

/// Sorted list of component ids; this sort order is also the column order
/// within every chunk of the archetype.
pub type ArchetypeSignature = Vec<ComponentId>;

/// Cached neighbor archetypes for one component, populated lazily on first
/// transition through that component.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypeEdge {
    pub add: Option<usize>,
    pub remove: Option<usize>,
}

/// An archetype: the set of entities sharing one component signature.
pub struct Archetype {
    signature: ArchetypeSignature,
    column_index: FxHashMap<ComponentId, usize>,
    column_specs: Vec<ColumnSpec>,
    chunks: Vec<Chunk>,
    edges: FxHashMap<ComponentId, ArchetypeEdge>,
    structural_version: u64,
}

impl Archetype {
    pub fn new(signature: ArchetypeSignature, column_specs: Vec<ColumnSpec>) -> Self {
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]), "signature must be sorted ascending with no duplicates");
        let mut column_index = FxHashMap::default();
        for (i, spec) in column_specs.iter().enumerate() {
            column_index.insert(spec.component_id, i);
        }
        Self {
            signature,
            column_index,
            column_specs,
            chunks: Vec::new(),
            edges: FxHashMap::default(),
            structural_version: 0,
        }
    }

    #[inline]
    pub fn signature(&self) -> &[ComponentId] {
        &self.signature
    }

    #[inline]
    pub fn has_component(&self, id: ComponentId) -> bool {
        self.column_index.contains_key(&id)
    }

    #[inline]
    pub fn column_index(&self, id: ComponentId) -> Option<usize> {
        self.column_index.get(&id).copied()
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    #[inline]
    pub fn chunk_mut(&mut self, index: usize) -> Option<&mut Chunk> {
        self.chunks.get_mut(index)
    }

    #[inline]
    pub fn structural_version(&self) -> u64 {
        self.structural_version
    }

    /// Total live row count across every chunk.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::count).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if every chunk is empty (a candidate for pruning).
    pub fn is_prunable(&self) -> bool {
        self.chunks.iter().all(Chunk::is_empty)
    }

    /// Release every chunk (used when an archetype is pruned by the graph).
    pub fn drop_chunks(&mut self) {
        self.chunks.clear();
        self.structural_version += 1;
    }

    pub fn edge(&self, id: ComponentId) -> ArchetypeEdge {
        self.edges.get(&id).copied().unwrap_or_default()
    }

    pub fn set_add_edge(&mut self, id: ComponentId, target: usize) {
        self.edges.entry(id).or_default().add = Some(target);
    }

    pub fn set_remove_edge(&mut self, id: ComponentId, target: usize) {
        self.edges.entry(id).or_default().remove = Some(target);
    }

    /// Allocate a row for `entity`, creating a new chunk if the last one is
    /// full or none exists yet. Returns `(chunk_index, row)`.
    pub fn allocate_row(&mut self, entity: EntityId, tick: u32) -> (usize, usize) {
        if self.chunks.last().map(Chunk::is_full).unwrap_or(true) {
            self.chunks.push(Chunk::new(&self.column_specs));
            self.structural_version += 1;
        }
        let chunk_index = self.chunks.len() - 1;
        let row = self.chunks[chunk_index].allocate_row(entity, tick);
        self.structural_version += 1;
        (chunk_index, row)
    }

    /// Remove `row` from `chunk_index` via swap-with-last. Returns the entity
    /// swapped into that row, if any — the caller MUST update its directory
    /// location.
    pub fn remove_row(&mut self, chunk_index: usize, row: usize) -> Option<EntityId> {
        let swapped = self.chunks[chunk_index].remove_row(row);
        self.structural_version += 1;
        swapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentRegistry;

    fn make_archetype(ids: &[ComponentId], registry: &ComponentRegistry) -> Archetype {
        let specs: Vec<ColumnSpec> = ids
            .iter()
            .map(|&id| {
                let d = registry.descriptor(id).unwrap();
                ColumnSpec {
                    component_id: id,
                    size_bytes: d.size_bytes,
                    storage_provider: d.storage_provider.clone(),
                }
            })
            .collect();
        Archetype::new(ids.to_vec(), specs)
    }

    #[test]
    fn new_archetype_is_empty() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("A", 4, None).unwrap();
        let arch = make_archetype(&[a], &reg);
        assert_eq!(arch.len(), 0);
        assert!(arch.is_empty());
        assert!(arch.has_component(a));
    }

    #[test]
    fn filling_a_chunk_allocates_a_second_one_at_row_zero() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("A", 0, None).unwrap(); // tag, cheap to fill
        let mut arch = make_archetype(&[a], &reg);

        for i in 0..crate::chunk::CHUNK_CAPACITY {
            let e = EntityId::from_bits(i as u64 + 1);
            let (chunk_idx, row) = arch.allocate_row(e, 1);
            assert_eq!(chunk_idx, 0);
            assert_eq!(row, i);
        }

        let e = EntityId::from_bits(crate::chunk::CHUNK_CAPACITY as u64 + 1);
        let (chunk_idx, row) = arch.allocate_row(e, 1);
        assert_eq!(chunk_idx, 1);
        assert_eq!(row, 0);
        assert_eq!(arch.chunks().len(), 2);
    }

    #[test]
    fn edges_round_trip() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("A", 4, None).unwrap();
        let mut arch = make_archetype(&[a], &reg);
        arch.set_add_edge(a, 7);
        assert_eq!(arch.edge(a).add, Some(7));
        assert_eq!(arch.edge(a).remove, None);
    }
}
