/*!
 * Memory Types
 * Common types for the allocator family
 */

use crate::core::types::{AllocatorId, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
///
/// Fatal-class variants end the loading operation that hit them; programmer-error
/// variants indicate a handle was used against the wrong allocator or after reclaim.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MemoryError {
    #[error("Allocation size overflow: {count} x {elem_size} bytes")]
    #[diagnostic(
        code(memory::size_overflow),
        help("The element count times element size does not fit in usize.")
    )]
    SizeOverflow { count: Size, elem_size: Size },

    #[error("Block too large: {requested} bytes requested, maximum block is {max} bytes")]
    #[diagnostic(
        code(memory::block_too_large),
        help("A single allocation needs a block larger than the arena may create.")
    )]
    BlockTooLarge { requested: Size, max: Size },

    #[error("Out of memory: system refused a {requested} byte block")]
    #[diagnostic(code(memory::out_of_memory))]
    OutOfMemory { requested: Size },

    #[error("Allocator pool exhausted: all {capacity} slots are in use")]
    #[diagnostic(
        code(memory::pool_exhausted),
        help("Raise the pool capacity; slots are never recycled during the pool lifetime.")
    )]
    PoolExhausted { capacity: usize },

    #[error("Unknown allocation {index} (generation {generation}) for allocator {owner}")]
    #[diagnostic(
        code(memory::unknown_allocation),
        help("The handle belongs to another allocator or was invalidated by reset().")
    )]
    UnknownAllocation {
        owner: AllocatorId,
        index: u32,
        generation: u32,
    },

    #[error("Double free of allocation {index}")]
    #[diagnostic(code(memory::double_free))]
    DoubleFree { index: u32 },

    #[error("Allocator {0} was released by free_all() and cannot be used")]
    #[diagnostic(code(memory::released))]
    Released(AllocatorId),

    #[error("Write of {len} bytes does not fit allocation of {size} bytes")]
    #[diagnostic(code(memory::out_of_bounds))]
    OutOfBounds { len: Size, size: Size },
}

impl MemoryError {
    /// Unrecoverable conditions: the caller is expected to abort the load
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MemoryError::SizeOverflow { .. }
                | MemoryError::BlockTooLarge { .. }
                | MemoryError::OutOfMemory { .. }
                | MemoryError::PoolExhausted { .. }
        )
    }

    /// Misuse of a handle or of a released allocator
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            MemoryError::UnknownAllocation { .. }
                | MemoryError::DoubleFree { .. }
                | MemoryError::Released(_)
                | MemoryError::OutOfBounds { .. }
        )
    }
}

/// Handle to one allocation
///
/// Handles are plain values: copying one does not duplicate memory. The
/// generation ties the handle to the allocator epoch it was issued in, so a
/// handle kept across `reset()` is rejected instead of aliasing new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    owner: AllocatorId,
    index: u32,
    generation: u32,
}

impl Allocation {
    pub(crate) const fn new(owner: AllocatorId, index: u32, generation: u32) -> Self {
        Self {
            owner,
            index,
            generation,
        }
    }

    /// Allocator that issued this handle
    pub const fn owner(&self) -> AllocatorId {
        self.owner
    }

    /// Node (arena) or slot (tracking allocator) index
    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn unknown(&self) -> MemoryError {
        MemoryError::UnknownAllocation {
            owner: self.owner,
            index: self.index,
            generation: self.generation,
        }
    }
}

/// Arena statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    pub block_count: usize,
    pub reserved_bytes: usize,
    pub used_bytes: usize,
    pub live_allocations: usize,
    pub reset_count: u64,
    pub blocks_appended: u64,
    pub in_place_reallocs: u64,
    pub copying_reallocs: u64,
}

impl ArenaStats {
    /// Fraction of reserved block memory currently handed out (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.reserved_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.reserved_bytes as f64
        }
    }
}

/// Tracking allocator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStats {
    pub live_allocations: usize,
    pub live_bytes: usize,
    pub total_allocations: u64,
    pub total_frees: u64,
}
