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

//! `Parent`/`Children` relationship components.
//!
//! These are ordinary registered components — nothing here maintains the
//! parent/child invariant by itself. `World::add_child` and friends keep the
//! two sides in sync and reject structural cycles; see `world.rs`.

use crate::entity::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub EntityId);

impl Parent {
    pub fn new(parent: EntityId) -> Self {
        Self(parent)
    }

    pub fn entity_id(&self) -> EntityId {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Children {
    children: Vec<EntityId>,
}

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, child: EntityId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub fn remove_child(&mut self, child: EntityId) -> bool {
        if let Some(pos) = self.children.iter().position(|&c| c == child) {
            self.children.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, child: EntityId) -> bool {
        self.children.contains(&child)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(i: u64) -> EntityId {
        EntityId::from_bits(i + 1)
    }

    #[test]
    fn children_add_is_deduplicated() {
        let mut children = Children::new();
        children.add_child(e(1));
        children.add_child(e(1));
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn children_remove_reports_whether_it_was_present() {
        let mut children = Children::new();
        children.add_child(e(1));
        assert!(children.remove_child(e(1)));
        assert!(!children.remove_child(e(1)));
        assert!(children.is_empty());
    }
}
