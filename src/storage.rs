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

//! `StorageProvider`: the vtable backing a single component's column.
//!
//! A provider owns one opaque, chunk-scoped handle per chunk and knows how to
//! allocate it, address a row within it, write into a row, copy a row between
//! two chunks of the same component, and swap two rows in place. The default
//! provider is a flat `size * capacity` byte buffer; a host may supply its own
//! provider to back a component with a managed data structure (e.g. a side
//! table keyed by `(handle, row)`).

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

/// Opaque, chunk-owned handle produced by [`StorageProvider::alloc_chunk`].
/// The default provider stores a pointer to its backing buffer in it; a
/// host-managed provider may stash any pointer-sized token it likes (e.g. an
/// index into its own side table cast to a pointer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageHandle(pub NonNull<u8>);

// SAFETY: the handle is an opaque token; providers are responsible for
// synchronizing any access to whatever it points at. The ECS core itself is
// single-threaded, so no concurrent access to a handle ever originates from
// this crate.
unsafe impl Send for StorageHandle {}
unsafe impl Sync for StorageHandle {}

/// The column storage vtable, keyed by the owning chunk. Implementations
/// MUST tolerate `size == 0` (tag components) by returning a stable non-null
/// sentinel from `row_ptr` and treating every other method as a no-op.
///
/// # Safety
/// Implementors must uphold the row-pointer stability contract: a pointer
/// returned by `row_ptr` stays valid until the next mutating call on the same
/// chunk handle.
pub unsafe trait StorageProvider: Send + Sync {
    /// Allocate backing storage for up to `capacity` rows of `size` bytes each.
    fn alloc_chunk(&self, size: usize, capacity: usize) -> StorageHandle;

    /// Free storage allocated by `alloc_chunk` with the same `size`/`capacity`.
    ///
    /// # Safety
    /// `handle` must have come from this provider's `alloc_chunk` with the
    /// same `size`/`capacity`, and must not be used again afterward.
    unsafe fn free_chunk(&self, handle: StorageHandle, size: usize, capacity: usize);

    /// Address of `row`'s data, stable until the next mutating call on `handle`.
    ///
    /// # Safety
    /// `handle` must be live and `row < capacity` as passed to `alloc_chunk`.
    unsafe fn row_ptr(&self, handle: StorageHandle, row: usize, size: usize) -> *mut u8;

    /// Copy `size` bytes from `src` into `row`.
    ///
    /// # Safety
    /// `handle` must be live, `row` in bounds, and `src` valid for `size` bytes.
    unsafe fn write(&self, handle: StorageHandle, row: usize, src: *const u8, size: usize);

    /// Copy one row from `src_handle` (possibly a different chunk of the same
    /// component) into `dst_handle`.
    ///
    /// # Safety
    /// Both handles must be live and both rows in bounds.
    unsafe fn copy(
        &self,
        src_handle: StorageHandle,
        src_row: usize,
        dst_handle: StorageHandle,
        dst_row: usize,
        size: usize,
    );

    /// Swap two rows within the same chunk in place (used by swap-with-last
    /// row removal).
    ///
    /// # Safety
    /// `handle` must be live and both rows in bounds.
    unsafe fn swap(&self, handle: StorageHandle, row_a: usize, row_b: usize, size: usize);
}

/// A well-aligned non-null sentinel used for tag components (`size == 0`),
/// never dereferenced.
fn tag_sentinel() -> StorageHandle {
    StorageHandle(NonNull::<u8>::dangling())
}

fn layout_for(size: usize, capacity: usize) -> Layout {
    Layout::array::<u8>(size.max(1) * capacity.max(1)).expect("chunk layout overflow")
}

/// The default storage provider: a single contiguous, zero-initialized byte
/// buffer of `size * capacity` bytes per chunk.
pub struct DefaultStorageProvider;

unsafe impl StorageProvider for DefaultStorageProvider {
    fn alloc_chunk(&self, size: usize, capacity: usize) -> StorageHandle {
        if size == 0 {
            return tag_sentinel();
        }
        // SAFETY: layout is non-zero-sized by construction above.
        let ptr = unsafe { alloc_zeroed(layout_for(size, capacity)) };
        let ptr = NonNull::new(ptr).expect("allocation failure (out of memory)");
        StorageHandle(ptr)
    }

    unsafe fn free_chunk(&self, handle: StorageHandle, size: usize, capacity: usize) {
        if size == 0 {
            return;
        }
        dealloc(handle.0.as_ptr(), layout_for(size, capacity));
    }

    unsafe fn row_ptr(&self, handle: StorageHandle, row: usize, size: usize) -> *mut u8 {
        if size == 0 {
            return handle.0.as_ptr();
        }
        handle.0.as_ptr().add(row * size)
    }

    unsafe fn write(&self, handle: StorageHandle, row: usize, src: *const u8, size: usize) {
        if size == 0 {
            return;
        }
        let dst = self.row_ptr(handle, row, size);
        std::ptr::copy_nonoverlapping(src, dst, size);
    }

    unsafe fn copy(
        &self,
        src_handle: StorageHandle,
        src_row: usize,
        dst_handle: StorageHandle,
        dst_row: usize,
        size: usize,
    ) {
        if size == 0 {
            return;
        }
        let src = self.row_ptr(src_handle, src_row, size);
        let dst = self.row_ptr(dst_handle, dst_row, size);
        std::ptr::copy_nonoverlapping(src, dst, size);
    }

    unsafe fn swap(&self, handle: StorageHandle, row_a: usize, row_b: usize, size: usize) {
        if size == 0 || row_a == row_b {
            return;
        }
        let a = self.row_ptr(handle, row_a, size);
        let b = self.row_ptr(handle, row_b, size);
        // Byte-wise swap; components are POD from this provider's point of
        // view (no Drop glue is run, matching the default buffer's flat layout).
        for i in 0..size {
            std::ptr::swap(a.add(i), b.add(i));
        }
    }
}

/// Shared handle to the default storage provider, suitable for every
/// component that does not need host-managed storage.
pub fn default_storage_provider() -> Arc<dyn StorageProvider> {
    Arc::new(DefaultStorageProvider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back_round_trips() {
        let provider = DefaultStorageProvider;
        let handle = provider.alloc_chunk(4, 8);
        let value: u32 = 0xDEAD_BEEF;
        unsafe {
            provider.write(handle, 2, &value as *const u32 as *const u8, 4);
            let ptr = provider.row_ptr(handle, 2, 4) as *const u32;
            assert_eq!(*ptr, value);
            provider.free_chunk(handle, 4, 8);
        }
    }

    #[test]
    fn swap_exchanges_row_contents() {
        let provider = DefaultStorageProvider;
        let handle = provider.alloc_chunk(4, 8);
        unsafe {
            provider.write(handle, 0, &1u32 as *const u32 as *const u8, 4);
            provider.write(handle, 1, &2u32 as *const u32 as *const u8, 4);
            provider.swap(handle, 0, 1, 4);
            assert_eq!(*(provider.row_ptr(handle, 0, 4) as *const u32), 2);
            assert_eq!(*(provider.row_ptr(handle, 1, 4) as *const u32), 1);
            provider.free_chunk(handle, 4, 8);
        }
    }

    #[test]
    fn tag_component_storage_is_a_noop() {
        let provider = DefaultStorageProvider;
        let handle = provider.alloc_chunk(0, 4096);
        unsafe {
            // Must not panic or segfault: all ops on a zero-size column are no-ops.
            provider.write(handle, 10, std::ptr::null(), 0);
            let ptr = provider.row_ptr(handle, 10, 0);
            assert!(!ptr.is_null());
            provider.swap(handle, 0, 1, 0);
            provider.free_chunk(handle, 0, 4096);
        }
    }

    #[test]
    fn copy_between_chunks() {
        let provider = DefaultStorageProvider;
        let src = provider.alloc_chunk(4, 4);
        let dst = provider.alloc_chunk(4, 4);
        unsafe {
            provider.write(src, 0, &99u32 as *const u32 as *const u8, 4);
            provider.copy(src, 0, dst, 3, 4);
            assert_eq!(*(provider.row_ptr(dst, 3, 4) as *const u32), 99);
            provider.free_chunk(src, 4, 4);
            provider.free_chunk(dst, 4, 4);
        }
    }
}
