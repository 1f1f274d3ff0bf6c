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

//! Hash-indexed set of archetypes keyed by component-set signature.
//!
//! Archetype slots are never reused across a prune: pruning only releases an
//! empty archetype's chunks (see [`Archetype::drop_chunks`]), so every other
//! archetype's cached edge indices and every entity's `archetype_id` stay
//! valid for the lifetime of the world.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::chunk::ColumnSpec;
use crate::component::{ComponentId, ComponentRegistry};

/// FNV-1a over the sorted component id list.
fn signature_hash(signature: &[ComponentId]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for id in signature {
        for byte in id.index().to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

pub struct ArchetypeGraph {
    archetypes: Vec<Archetype>,
    /// Hash bucket -> candidate archetype indices; full-signature equality is
    /// still checked to resolve collisions.
    by_hash: FxHashMap<u64, SmallVec<[usize; 2]>>,
    /// Bumped whenever an archetype is created or a chunk set changes.
    graph_version: u64,
}

impl ArchetypeGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            archetypes: Vec::with_capacity(64),
            by_hash: FxHashMap::with_capacity_and_hasher(64, Default::default()),
            graph_version: 0,
        };
        // Bootstrap the empty-signature archetype at index 0 (entities with
        // no components live here), simplifying lookups elsewhere.
        graph.find_or_create(&[], &ComponentRegistry::new());
        graph
    }

    #[inline]
    pub fn empty_archetype_id(&self) -> usize {
        0
    }

    #[inline]
    pub fn graph_version(&self) -> u64 {
        self.graph_version
    }

    #[inline]
    pub fn get(&self, id: usize) -> &Archetype {
        &self.archetypes[id]
    }

    #[inline]
    pub fn get_mut(&mut self, id: usize) -> &mut Archetype {
        &mut self.archetypes[id]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Archetype)> {
        self.archetypes.iter().enumerate()
    }

    fn find_by_signature(&self, signature: &[ComponentId]) -> Option<usize> {
        let hash = signature_hash(signature);
        self.by_hash.get(&hash)?.iter().copied().find(|&idx| self.archetypes[idx].signature() == signature)
    }

    /// Resolve the archetype for `signature`, creating it (with lazily
    /// allocated chunks) if it does not exist yet.
    pub fn find_or_create(&mut self, signature: &[ComponentId], registry: &ComponentRegistry) -> usize {
        if let Some(id) = self.find_by_signature(signature) {
            return id;
        }

        let column_specs: Vec<ColumnSpec> = signature
            .iter()
            .map(|&id| {
                let d = registry.descriptor(id).expect("component id must be registered");
                ColumnSpec {
                    component_id: id,
                    size_bytes: d.size_bytes,
                    storage_provider: d.storage_provider.clone(),
                }
            })
            .collect();

        let id = self.archetypes.len();
        self.archetypes.push(Archetype::new(signature.to_vec(), column_specs));
        self.by_hash.entry(signature_hash(signature)).or_default().push(id);
        self.graph_version += 1;
        id
    }

    /// Resolve the add-edge for `from + component`, creating the neighbor
    /// archetype and caching both directions if this is the first transition
    /// through that component.
    pub fn resolve_add_edge(&mut self, from: usize, component: ComponentId, registry: &ComponentRegistry) -> usize {
        if let Some(target) = self.archetypes[from].edge(component).add {
            return target;
        }
        let mut signature = self.archetypes[from].signature().to_vec();
        let pos = signature.binary_search(&component).unwrap_err();
        signature.insert(pos, component);
        let target = self.find_or_create(&signature, registry);
        self.archetypes[from].set_add_edge(component, target);
        self.archetypes[target].set_remove_edge(component, from);
        target
    }

    /// Resolve the remove-edge for `from - component`.
    pub fn resolve_remove_edge(&mut self, from: usize, component: ComponentId, registry: &ComponentRegistry) -> usize {
        if let Some(target) = self.archetypes[from].edge(component).remove {
            return target;
        }
        let mut signature = self.archetypes[from].signature().to_vec();
        signature.retain(|&c| c != component);
        let target = self.find_or_create(&signature, registry);
        self.archetypes[from].set_remove_edge(component, target);
        self.archetypes[target].set_add_edge(component, from);
        target
    }

    /// Release chunks for every fully-empty archetype (except index 0, the
    /// permanent empty-signature archetype, which has no columns to free
    /// anyway). Bumps `graph_version` if anything was freed, so a query
    /// holding a stale matched-archetype cache knows to recheck it.
    pub fn remove_empty_archetypes(&mut self) {
        let mut pruned_any = false;
        for (idx, archetype) in self.archetypes.iter_mut().enumerate() {
            if idx == 0 {
                continue;
            }
            if archetype.is_prunable() && !archetype.chunks().is_empty() {
                archetype.drop_chunks();
                pruned_any = true;
            }
        }
        if pruned_any {
            self.graph_version += 1;
        }
    }

    /// Drop every archetype except the bootstrap empty-signature one,
    /// discarding all chunk data. Used by `World::clear`.
    pub fn clear(&mut self) {
        self.archetypes.truncate(1);
        self.archetypes[0].drop_chunks();
        self.by_hash.retain(|_, v| {
            v.retain(|&idx| idx == 0);
            !v.is_empty()
        });
        self.graph_version += 1;
    }
}

impl Default for ArchetypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_has_empty_archetype_at_zero() {
        let graph = ArchetypeGraph::new();
        assert_eq!(graph.len(), 1);
        assert!(graph.get(0).signature().is_empty());
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("A", 4, None).unwrap();
        let mut graph = ArchetypeGraph::new();
        let id1 = graph.find_or_create(&[a], &reg);
        let id2 = graph.find_or_create(&[a], &reg);
        assert_eq!(id1, id2);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn add_and_remove_edges_are_mutual_inverses() {
        let mut reg = ComponentRegistry::new();
        let a = reg.register("A", 4, None).unwrap();
        let mut graph = ArchetypeGraph::new();
        let empty = graph.empty_archetype_id();
        let with_a = graph.resolve_add_edge(empty, a, &reg);
        assert_eq!(graph.get(with_a).signature(), &[a]);
        let back_to_empty = graph.resolve_remove_edge(with_a, a, &reg);
        assert_eq!(back_to_empty, empty);
    }
}
