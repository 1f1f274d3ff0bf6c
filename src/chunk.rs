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

//! Fixed-capacity columnar slab: the entity-ID column, per-component data
//! columns, and per-component `added_tick`/`changed_tick` arrays.

use std::sync::Arc;

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::storage::StorageHandle;
use crate::storage::StorageProvider;

/// Rows per chunk. Kept a power of two for cheap index arithmetic.
pub const CHUNK_CAPACITY: usize = 4096;

/// One component's data column within a chunk: a provider-owned handle plus
/// that column's add/change tick arrays, kept in lockstep with `count`.
pub struct Column {
    pub component_id: ComponentId,
    pub size_bytes: usize,
    pub provider: Arc<dyn StorageProvider>,
    pub handle: StorageHandle,
    pub added_tick: Vec<u32>,
    pub changed_tick: Vec<u32>,
}

impl Column {
    fn new(component_id: ComponentId, size_bytes: usize, provider: Arc<dyn StorageProvider>) -> Self {
        let handle = provider.alloc_chunk(size_bytes, CHUNK_CAPACITY);
        Self {
            component_id,
            size_bytes,
            provider,
            handle,
            added_tick: Vec::new(),
            changed_tick: Vec::new(),
        }
    }

    #[inline]
    pub unsafe fn row_ptr(&self, row: usize) -> *mut u8 {
        self.provider.row_ptr(self.handle, row, self.size_bytes)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        unsafe {
            self.provider.free_chunk(self.handle, self.size_bytes, CHUNK_CAPACITY);
        }
    }
}

/// A column specification used to build a chunk for some archetype, in the
/// archetype's ascending-component-id column order.
#[derive(Clone)]
pub struct ColumnSpec {
    pub component_id: ComponentId,
    pub size_bytes: usize,
    pub storage_provider: Arc<dyn StorageProvider>,
}

/// Capacity-bounded row store. Rows are densely packed `[0, count)`; removing
/// a row swaps the last row into its place (§3, §4.4).
pub struct Chunk {
    entities: Vec<EntityId>,
    columns: Vec<Column>,
}

impl Chunk {
    pub fn new(specs: &[ColumnSpec]) -> Self {
        let columns = specs
            .iter()
            .map(|s| Column::new(s.component_id, s.size_bytes, s.storage_provider.clone()))
            .collect();
        Self {
            entities: Vec::with_capacity(CHUNK_CAPACITY),
            columns,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entities.len() >= CHUNK_CAPACITY
    }

    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Append a new row for `entity`, stamping every column's tick arrays to
    /// `tick` (the caller writes the actual component bytes separately).
    /// Returns the new row index. Caller must check `!is_full()` first.
    pub fn allocate_row(&mut self, entity: EntityId, tick: u32) -> usize {
        debug_assert!(!self.is_full());
        let row = self.entities.len();
        self.entities.push(entity);
        for column in &mut self.columns {
            column.added_tick.push(tick);
            column.changed_tick.push(tick);
        }
        row
    }

    /// Remove `row` via swap-with-last. Returns the entity that used to sit
    /// in the last row, if a swap happened (i.e. `row` was not already last).
    /// The caller MUST update that entity's directory location afterward —
    /// this invariant is unconditional.
    pub fn remove_row(&mut self, row: usize) -> Option<EntityId> {
        let last = self.entities.len() - 1;
        let swapped = if row != last { Some(self.entities[last]) } else { None };

        self.entities.swap_remove(row);
        for column in &mut self.columns {
            if row != last {
                unsafe {
                    column
                        .provider
                        .copy(column.handle, last, column.handle, row, column.size_bytes);
                }
            }
            column.added_tick.swap_remove(row);
            column.changed_tick.swap_remove(row);
        }
        swapped
    }

    /// Write raw bytes into `row`'s column `col_index`, stamping `changed_tick`.
    /// `added` additionally stamps `added_tick` (component newly present).
    ///
    /// # Safety
    /// `src` must point to `size_bytes` valid bytes for that column.
    pub unsafe fn write_component(
        &mut self,
        col_index: usize,
        row: usize,
        src: *const u8,
        tick: u32,
        added: bool,
    ) {
        let column = &mut self.columns[col_index];
        column
            .provider
            .write(column.handle, row, src, column.size_bytes);
        column.changed_tick[row] = tick;
        if added {
            column.added_tick[row] = tick;
        }
    }

    pub fn mark_changed(&mut self, col_index: usize, row: usize, tick: u32) {
        self.columns[col_index].changed_tick[row] = tick;
    }

    /// Overwrite `added_tick` directly, bypassing the "just added" stamp
    /// `write_component` applies — used when carrying a component across an
    /// archetype transition, where the row is new but the component isn't.
    pub fn set_added_tick(&mut self, col_index: usize, row: usize, tick: u32) {
        self.columns[col_index].added_tick[row] = tick;
    }

    #[inline]
    pub unsafe fn component_ptr(&self, col_index: usize, row: usize) -> *const u8 {
        self.columns[col_index].row_ptr(row)
    }

    #[inline]
    pub unsafe fn component_ptr_mut(&mut self, col_index: usize, row: usize) -> *mut u8 {
        self.columns[col_index].row_ptr(row)
    }
}
