/*!
 * Runtime Limits and Constants
 *
 * Centralized location for allocator geometry, pool sizing and worker defaults.
 * Organized by domain:
 * - Allocation geometry (word size, node header, block bounds)
 * - Size helpers used by asset call sites
 * - Allocator pool and task pool defaults
 */

use std::mem::size_of;

// =============================================================================
// ALLOCATION GEOMETRY
// =============================================================================

/// Machine word size; every node start and data region is aligned to it
pub const WORD_SIZE: usize = size_of::<usize>();

/// Bytes reserved in front of every allocation inside a block
/// Mirrors the per-allocation node header so zero-size requests still advance the cursor
pub const NODE_HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Largest block an arena will ever request from the system (1GB)
/// Requests that would need a bigger block are fatal
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024 * 1024;

/// Smallest block an arena creates, whatever capacity was requested
pub const MIN_BLOCK_SIZE: usize = 64;

// =============================================================================
// SIZE HELPERS
// =============================================================================

pub const SIZE_1K: usize = 1024;
pub const SIZE_8K: usize = 8 * SIZE_1K;
pub const SIZE_1M: usize = SIZE_1K * SIZE_1K;

// =============================================================================
// POOL DEFAULTS
// =============================================================================

/// Fixed slot count of an allocator pool (one arena per loaded asset)
pub const DEFAULT_POOL_CAPACITY: usize = 512;

/// Default starting capacity of a per-asset arena (1MB)
pub const DEFAULT_ARENA_SIZE: usize = SIZE_1M;

/// Starting capacity of the scratch arena that holds glTF section JSON while
/// a model's sections are tallied (1KB)
pub const DEFAULT_SCRATCH_SIZE: usize = SIZE_1K;

/// Upper bound on worker threads accepted from configuration
pub const MAX_WORKER_THREADS: usize = 256;

/// Round `size` up to the next multiple of `align` (power of two)
#[inline]
pub const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// Checked variant of [`align_up`], `None` on overflow
#[inline]
pub const fn checked_align_up(size: usize, align: usize) -> Option<usize> {
    match size.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}
