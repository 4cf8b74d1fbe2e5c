/*!
 * Asset Runtime Library
 *
 * Concurrent memory allocation and task scheduling for asset loading:
 * block-chained arena allocators, a thread-safe allocator wrapper, a
 * fixed-capacity pool of per-asset arenas, a worker-thread task pool, and a
 * lock that serializes one GL context across the loading threads.
 */

pub mod assets;
pub mod core;
pub mod gl;
pub mod memory;
pub mod monitoring;
pub mod tasks;

// Re-exports
pub use assets::{AssetError, AssetLoader, LoadReport, ModelRequest, TextureRequest};
pub use core::{RuntimeConfig, RuntimeError, RuntimeResult};
pub use gl::{GlContext, GlError, GlLock, HeadlessContext};
pub use memory::{
    Allocation, Allocator, AllocatorPool, Arena, MemoryError, SharedAllocator, ThreadSafeArena,
    TrackingAllocator,
};
pub use monitoring::init_tracing;
pub use tasks::{TaskError, TaskHandle, TaskPool};
