/*!
 * Memory Module
 * Arena allocators, thread-safe wrappers and the per-asset allocator pool
 */

pub mod arena;
pub mod locked;
pub mod pool;
pub mod tracking;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use arena::Arena;
pub use locked::{Locked, ThreadSafeArena, ThreadSafeTracking};
pub use pool::{AllocatorPool, PoolSlot};
pub use tracking::TrackingAllocator;
pub use traits::*;
pub use types::*;
