/*!
 * Core Types
 * Common types used across the runtime
 */

use std::sync::atomic::{AtomicU32, Ordering};

/// Size type for memory operations
pub type Size = usize;

/// Address type, used only for identity and alignment checks
pub type Address = usize;

/// Identifier of one allocator instance; handles carry it to reject foreign use
pub type AllocatorId = u32;

/// Task identifier, unique within one task pool
pub type TaskId = u64;

/// Common result type for runtime operations
pub type RuntimeResult<T> = Result<T, super::errors::RuntimeError>;

static NEXT_ALLOCATOR_ID: AtomicU32 = AtomicU32::new(1);

/// Hand out a process-unique allocator id
pub fn next_allocator_id() -> AllocatorId {
    NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed)
}
