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

//! Error types
//!
//! Read paths and mutator no-ops recover locally (`None`/`false`/sentinel);
//! only registration and query-build failures propagate as `Err`.

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// Operation on a handle whose generation does not match the live slot.
    InvalidEntity,

    /// `lookup_component` found no component registered under that name.
    UnknownComponent,

    /// `register_component` was called twice for a name with a different size.
    DuplicateName,

    /// A query declared contradictory terms (e.g. `With(c)` and `Without(c)`).
    InvalidQuery,

    /// `add_child` would create a cycle in the parent/child relation.
    WouldCycle,

    /// `CommandBuffer::apply` was called reentrantly from within an apply.
    NestedApply,

    /// Allocator failure. Never constructed: Rust aborts the process on
    /// allocation failure before this variant could be returned, but the
    /// error-kind table names it so the enum stays exhaustive for callers
    /// matching on it.
    OutOfMemory,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidEntity => write!(f, "invalid or dead entity handle"),
            EcsError::UnknownComponent => write!(f, "unknown component name"),
            EcsError::DuplicateName => {
                write!(f, "component name already registered with a different size")
            }
            EcsError::InvalidQuery => write!(f, "contradictory query terms"),
            EcsError::WouldCycle => write!(f, "operation would create a hierarchy cycle"),
            EcsError::NestedApply => write!(f, "command buffer apply called reentrantly"),
            EcsError::OutOfMemory => write!(f, "allocator failure"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(EcsError::WouldCycle.to_string(), "operation would create a hierarchy cycle");
        assert_eq!(EcsError::NestedApply.to_string(), "command buffer apply called reentrantly");
    }
}
