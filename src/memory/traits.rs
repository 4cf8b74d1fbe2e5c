/*!
 * Memory Traits
 * Allocator capability shared by every allocator variant
 */

use super::types::*;
use crate::core::types::Size;
use std::sync::Arc;

/// Minimal allocator interface consumed by asset loaders
///
/// Implemented by single-owner allocators through `&mut self`; a plain
/// `Arena` is therefore single-writer by construction. Shared allocators
/// reach this trait through `Arc<T: SharedAllocator>`.
pub trait Allocator: Send {
    /// Allocate `count * elem_size` bytes
    fn alloc(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation>;

    /// Release one allocation (no-op for bulk allocators)
    fn free(&mut self, allocation: Allocation) -> MemoryResult<()>;

    /// Resize an allocation, possibly moving it
    fn realloc(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation>;

    /// Copy `data` into the start of an allocation
    fn write(&mut self, allocation: Allocation, data: &[u8]) -> MemoryResult<()>;

    /// Copy the contents of an allocation out
    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>>;

    /// Allocate exactly `data.len()` bytes and fill them
    fn alloc_copy(&mut self, data: &[u8]) -> MemoryResult<Allocation> {
        let allocation = self.alloc(data.len(), 1)?;
        self.write(allocation, data)?;
        Ok(allocation)
    }
}

/// Borrowed byte access for single-owner allocators
pub trait ByteView {
    fn bytes(&self, allocation: Allocation) -> MemoryResult<&[u8]>;

    fn bytes_mut(&mut self, allocation: Allocation) -> MemoryResult<&mut [u8]>;

    /// Recorded (requested) size of an allocation
    fn size_of(&self, allocation: Allocation) -> MemoryResult<Size> {
        Ok(self.bytes(allocation)?.len())
    }
}

/// Allocators that reclaim in bulk and can be constructed by an allocator pool
pub trait BulkAllocator: Allocator + Sized {
    /// Construct with the requested starting capacity in bytes
    fn with_capacity(size: Size) -> MemoryResult<Self>;

    /// Make all memory reusable without returning it to the system
    fn reset(&mut self);

    /// Return all memory to the system; terminal state
    fn free_all(&mut self);
}

/// Allocator usable concurrently from several threads through `&self`
pub trait SharedAllocator: Send + Sync {
    fn alloc(&self, count: Size, elem_size: Size) -> MemoryResult<Allocation>;

    fn free(&self, allocation: Allocation) -> MemoryResult<()>;

    fn realloc(&self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation>;

    fn write(&self, allocation: Allocation, data: &[u8]) -> MemoryResult<()>;

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>>;
}

impl<T> Allocator for Arc<T>
where
    T: SharedAllocator + ?Sized,
{
    fn alloc(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        (**self).alloc(count, elem_size)
    }

    fn free(&mut self, allocation: Allocation) -> MemoryResult<()> {
        (**self).free(allocation)
    }

    fn realloc(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        (**self).realloc(allocation, new_size)
    }

    fn write(&mut self, allocation: Allocation, data: &[u8]) -> MemoryResult<()> {
        (**self).write(allocation, data)
    }

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>> {
        (**self).read(allocation)
    }
}

/// Copy helper shared by implementations of `write`
pub(crate) fn copy_into(dst: &mut [u8], data: &[u8]) -> MemoryResult<()> {
    if data.len() > dst.len() {
        return Err(MemoryError::OutOfBounds {
            len: data.len(),
            size: dst.len(),
        });
    }
    dst[..data.len()].copy_from_slice(data);
    Ok(())
}
