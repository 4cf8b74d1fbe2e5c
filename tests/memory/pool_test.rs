/*!
 * Allocator Pool Tests
 */

use asset_runtime::core::limits::{DEFAULT_POOL_CAPACITY, SIZE_1M};
use asset_runtime::memory::{Allocator, AllocatorPool, MemoryError, TrackingAllocator};
use std::sync::Arc;
use std::thread;

#[test]
fn test_default_capacity() {
    let pool: AllocatorPool = AllocatorPool::default();
    assert_eq!(pool.capacity(), DEFAULT_POOL_CAPACITY);
    assert!(pool.is_empty());
}

#[test]
fn test_concurrent_gets_respect_capacity() {
    let pool: Arc<AllocatorPool> = Arc::new(AllocatorPool::new(16));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || (0..4).map(|_| pool.get(256).is_ok()).filter(|&ok| ok).count())
        })
        .collect();
    let granted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(granted, 16);
    assert!(pool.is_full());
    assert_eq!(
        pool.get(256).unwrap_err(),
        MemoryError::PoolExhausted { capacity: 16 }
    );
}

#[test]
fn test_slot_arena_has_requested_capacity() {
    let pool: AllocatorPool = AllocatorPool::new(2);
    let slot = pool.get(4096).unwrap();
    let mut arena = slot.lock();
    arena.alloc(4096, 1).unwrap();
    assert_eq!(arena.block_count(), 1);
}

#[test]
fn test_pool_of_tracking_allocators() {
    let pool: AllocatorPool<TrackingAllocator> = AllocatorPool::new(2);
    let slot = pool.get(8).unwrap();
    let a = slot.lock().alloc(3, 1).unwrap();
    slot.lock().free(a).unwrap();

    pool.free_all();
    assert!(slot.lock().is_released());
}

#[test]
fn test_tracking_slot_takes_size_as_bytes() {
    let pool: AllocatorPool<TrackingAllocator> = AllocatorPool::new(1);
    let slot = pool.get(SIZE_1M).unwrap();
    let tracker = slot.lock();
    assert_eq!(tracker.slot_capacity(), 0);
    assert_eq!(tracker.live_allocations(), 0);
}
