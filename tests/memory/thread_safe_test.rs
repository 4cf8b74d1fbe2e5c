/*!
 * Thread-Safe Arena Tests
 * Mutual exclusion under contention and lock-order instrumentation
 */

use asset_runtime::core::sync::LockOrderLog;
use asset_runtime::memory::{
    Arena, Locked, SharedAllocator, ThreadSafeArena, ThreadSafeTracking, TrackingAllocator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const ALLOCS_PER_THREAD: usize = 200;

#[test]
fn test_concurrent_allocations_never_overlap() {
    let arena = Arc::new(ThreadSafeArena::with_capacity(4096).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let arena = Arc::clone(&arena);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let mut mine = Vec::with_capacity(ALLOCS_PER_THREAD);
                for i in 0..ALLOCS_PER_THREAD {
                    let size = rng.gen_range(0..256);
                    let allocation = arena.alloc(size, 1).unwrap();
                    let tag = (t * 31 + i) as u8;
                    arena
                        .with_bytes_mut(allocation, |bytes| bytes.fill(tag))
                        .unwrap();
                    mine.push((allocation, size, tag));
                }
                mine
            })
        })
        .collect();

    let all: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(all.len(), THREADS * ALLOCS_PER_THREAD);

    // Any overlap would have let a later writer clobber an earlier tag
    for (allocation, size, tag) in all {
        let intact = arena
            .with_bytes(allocation, |bytes| {
                bytes.len() == size && bytes.iter().all(|&b| b == tag)
            })
            .unwrap();
        assert!(intact);
    }

    let stats = arena.with(|inner| inner.stats());
    assert_eq!(stats.live_allocations, THREADS * ALLOCS_PER_THREAD);
}

#[test]
fn test_concurrent_realloc_through_shared_handle() {
    let arena = Arc::new(ThreadSafeArena::with_capacity(1024).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let shared = Arc::clone(&arena);
            thread::spawn(move || {
                let mut allocation = shared.alloc(8, 1).unwrap();
                shared.write(allocation, &[t as u8; 8]).unwrap();
                for step in 1..20 {
                    allocation = shared.realloc(allocation, 8 + step * 8).unwrap();
                }
                (allocation, t as u8)
            })
        })
        .collect();

    for handle in handles {
        let (allocation, tag) = handle.join().unwrap();
        let bytes = arena.read(allocation).unwrap();
        assert_eq!(bytes.len(), 8 + 19 * 8);
        assert!(bytes[..8].iter().all(|&b| b == tag));
    }
}

#[test]
fn test_lock_order_log_sees_every_operation() {
    let log = Arc::new(LockOrderLog::new());
    let arena = Arc::new(Locked::with_lock_order(
        Arena::new(512).unwrap(),
        Arc::clone(&log),
        "asset-arena",
    ));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let arena = Arc::clone(&arena);
            thread::spawn(move || {
                for _ in 0..10 {
                    arena.alloc(4, 4).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(log.events().len(), 2 * 40);
    assert!(log.is_balanced());
    assert!(log.detect_inversions().is_empty());
    assert_eq!(log.name(arena.lock_id().unwrap()).as_deref(), Some("asset-arena"));
}

#[test]
fn test_thread_safe_tracking_allocator() {
    let tracker = Arc::new(ThreadSafeTracking::new(TrackingAllocator::new(64)));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for _ in 0..50 {
                    let a = tracker.alloc(16, 1).unwrap();
                    tracker.free(a).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = tracker.with(|inner| inner.stats());
    assert_eq!(stats.total_allocations, 200);
    assert_eq!(stats.total_frees, 200);
    assert_eq!(stats.live_bytes, 0);
}
