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

//! Archetype ECS — an embeddable, archetype-based entity component system.
//!
//! Entities live in [`archetype::Archetype`]s keyed by their exact component
//! signature; rows are packed into fixed-capacity [`chunk::Chunk`]s with
//! per-component change-tick tracking. [`world::World`] is the single entry
//! point: component registration, entity creation and mutation, structural
//! transitions, queries, and hierarchy all go through it.

pub mod archetype;
pub mod archetype_graph;
pub mod chunk;
pub mod command;
pub mod component;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod world;

pub use archetype::Archetype;
pub use command::{Command, CommandBuffer};
pub use component::{Bundle, Component, ComponentDescriptor, ComponentId, ComponentRegistry};
pub use entity::{EntityDirectory, EntityId, EntityLocation};
pub use error::{EcsError, Result};
pub use hierarchy::{Children, Parent};
pub use query::{Query, QueryBuilder, QueryItem, QueryIter, Term};
pub use storage::{default_storage_provider, DefaultStorageProvider, StorageHandle, StorageProvider};
pub use world::{MemoryStats, World};
