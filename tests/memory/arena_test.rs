/*!
 * Arena Tests
 * Bump placement, block growth, reset and realloc behavior
 */

use asset_runtime::core::limits::{align_up, NODE_HEADER_SIZE, WORD_SIZE};
use asset_runtime::memory::{Allocation, Allocator, Arena, ByteView, MemoryError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn span(arena: &Arena, allocation: Allocation) -> (usize, usize) {
    let start = arena.address(allocation).unwrap();
    (start, start + arena.size_of(allocation).unwrap())
}

#[test]
fn test_first_allocation_fills_initial_block() {
    let mut arena = Arena::new(256).unwrap();
    let a = arena.alloc(256, 1).unwrap();
    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.block_of(a).unwrap(), 0);

    // Block is full to its boundary: the next request takes the overflow path
    let b = arena.alloc(1, 1).unwrap();
    assert_eq!(arena.block_count(), 2);
    assert_eq!(arena.block_of(b).unwrap(), 1);
    assert_eq!(arena.header(a).unwrap(), (256, 0));
}

#[test]
fn test_exact_remaining_space_is_accepted() {
    let mut arena = Arena::new(100).unwrap();
    let block = arena.block_capacity(0).unwrap();
    let first = arena.alloc(10, 1).unwrap();
    let used = align_up(10 + NODE_HEADER_SIZE, WORD_SIZE);

    let rest = block - used - NODE_HEADER_SIZE;
    let second = arena.alloc(rest, 1).unwrap();
    assert_eq!(arena.block_of(second).unwrap(), 0);
    assert_eq!(arena.stats().used_bytes, block);
    assert_eq!(arena.header(first).unwrap(), (10, 0));
}

#[test]
fn test_oversized_request_gets_doubled_block() {
    let mut arena = Arena::new(64).unwrap();
    let big = arena.alloc(10_000, 1).unwrap();
    let aligned = align_up(10_000 + NODE_HEADER_SIZE, WORD_SIZE);

    assert_eq!(arena.block_count(), 2);
    assert_eq!(arena.block_of(big).unwrap(), 1);
    assert_eq!(arena.block_capacity(1), Some(2 * aligned));
    assert_eq!(arena.stats().blocks_appended, 1);
}

#[test]
fn test_overflow_appends_configured_block_size() {
    let mut arena = Arena::new(128).unwrap();
    let block_size = arena.block_size();
    arena.alloc(100, 1).unwrap();
    let spilled = arena.alloc(100, 1).unwrap();
    assert_eq!(arena.block_of(spilled).unwrap(), 1);
    assert_eq!(arena.block_capacity(1), Some(block_size));
}

#[test]
fn test_zero_size_allocations() {
    let mut arena = Arena::new(128).unwrap();
    let handles: Vec<_> = (0..4).map(|_| arena.alloc(0, 16).unwrap()).collect();
    let mut addresses: Vec<_> = handles.iter().map(|&h| arena.address(h).unwrap()).collect();
    addresses.dedup();
    assert_eq!(addresses.len(), 4);
    assert!(handles.iter().all(|&h| arena.bytes(h).unwrap().is_empty()));
}

#[test]
fn test_free_is_a_validated_noop() {
    let mut arena = Arena::new(128).unwrap();
    let a = arena.alloc(8, 1).unwrap();
    let used = arena.stats().used_bytes;
    arena.free(a).unwrap();
    arena.free(a).unwrap();
    assert_eq!(arena.stats().used_bytes, used);
}

#[test]
fn test_stale_handle_after_reset() {
    let mut arena = Arena::new(128).unwrap();
    let a = arena.alloc(8, 1).unwrap();
    arena.reset();
    assert!(matches!(
        arena.read(a),
        Err(MemoryError::UnknownAllocation { .. })
    ));

    // The slot index is reused, the handle is not
    let b = arena.alloc(8, 1).unwrap();
    assert_eq!(a.index(), b.index());
    assert_ne!(a, b);
}

#[test]
fn test_foreign_handle_rejected() {
    let mut one = Arena::new(128).unwrap();
    let two = Arena::new(128).unwrap();
    let a = one.alloc(8, 1).unwrap();
    let err = two.read(a).unwrap_err();
    assert!(err.is_programmer_error());
}

#[test]
fn test_free_all_is_terminal() {
    let mut arena = Arena::new(128).unwrap();
    let a = arena.alloc(8, 1).unwrap();
    arena.free_all();

    assert_eq!(arena.block_count(), 0);
    assert!(arena.is_released());
    assert_eq!(arena.alloc(1, 1), Err(MemoryError::Released(arena.id())));
    assert_eq!(arena.read(a), Err(MemoryError::Released(arena.id())));
    arena.reset();
    assert!(arena.is_released());
}

#[test]
fn test_block_too_large_is_fatal() {
    let mut arena = Arena::new(64).unwrap();
    let err = arena
        .alloc(asset_runtime::core::limits::MAX_BLOCK_SIZE, 1)
        .unwrap_err();
    assert!(matches!(err, MemoryError::BlockTooLarge { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_copying_realloc_preserves_prefix() {
    let mut arena = Arena::new(256).unwrap();
    let a = arena.alloc_copy(b"0123456789").unwrap();
    let _pin = arena.alloc(1, 1).unwrap();

    let moved = arena.realloc(a, 4).unwrap();
    assert_ne!(moved, a);
    assert_eq!(arena.read(moved).unwrap(), b"0123");
    assert_eq!(arena.stats().copying_reallocs, 1);

    // The old region stays readable until reset
    assert_eq!(arena.read(a).unwrap(), b"0123456789");
}

#[test]
fn test_realloc_across_blocks() {
    let mut arena = Arena::new(64).unwrap();
    let a = arena.alloc_copy(&[7u8; 32]).unwrap();
    let moved = arena.realloc(a, 4096).unwrap();

    // Latest node but too big for its block: copied into a new block
    assert_ne!(arena.block_of(moved).unwrap(), arena.block_of(a).unwrap());
    let bytes = arena.bytes(moved).unwrap();
    assert_eq!(bytes.len(), 4096);
    assert!(bytes[..32].iter().all(|&b| b == 7));
}

fn placements(arena: &Arena, handles: &[Allocation]) -> Vec<(usize, usize)> {
    handles
        .iter()
        .map(|&h| (arena.block_of(h).unwrap(), arena.address(h).unwrap()))
        .collect()
}

proptest! {
    #[test]
    fn prop_allocations_are_aligned_and_disjoint(
        sizes in proptest::collection::vec(0_usize..600, 1..64),
        capacity in 16_usize..1024,
    ) {
        let mut arena = Arena::new(capacity).unwrap();
        let handles: Vec<_> = sizes.iter().map(|&s| arena.alloc(s, 1).unwrap()).collect();

        let mut spans: Vec<_> = handles.iter().map(|&h| span(&arena, h)).collect();
        for &(start, _) in &spans {
            prop_assert_eq!(start % WORD_SIZE, 0);
        }
        for (&h, &s) in handles.iter().zip(&sizes) {
            prop_assert_eq!(arena.bytes(h).unwrap().len(), s);
        }

        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0);
            prop_assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn prop_growth_adds_exactly_one_block(
        fill in 1_usize..512,
        extra in 1_usize..256,
    ) {
        let mut arena = Arena::new(512).unwrap();
        arena.alloc(fill, 1).unwrap();
        let remaining = arena.block_capacity(0).unwrap() - arena.stats().used_bytes;
        let needed = align_up(extra + NODE_HEADER_SIZE, WORD_SIZE);

        let before = arena.block_count();
        arena.alloc(extra, 1).unwrap();
        let expected = if needed <= remaining { before } else { before + 1 };
        prop_assert_eq!(arena.block_count(), expected);
    }

    #[test]
    fn prop_reset_replays_identically(
        sizes in proptest::collection::vec(0_usize..2048, 1..48),
    ) {
        let mut arena = Arena::new(256).unwrap();
        let first: Vec<_> = sizes.iter().map(|&s| arena.alloc(s, 1).unwrap()).collect();
        let first = placements(&arena, &first);
        let blocks = arena.block_count();

        arena.reset();
        arena.reset();
        prop_assert_eq!(arena.block_count(), blocks);
        prop_assert_eq!(arena.stats().used_bytes, 0);

        let second: Vec<_> = sizes.iter().map(|&s| arena.alloc(s, 1).unwrap()).collect();
        prop_assert_eq!(placements(&arena, &second), first);
        prop_assert_eq!(arena.block_count(), blocks);
    }

    #[test]
    fn prop_realloc_latest_in_place_when_it_fits(
        initial in 0_usize..128,
        new_size in 0_usize..512,
    ) {
        let mut arena = Arena::new(256).unwrap();
        let a = arena.alloc(initial, 1).unwrap();
        let fill: Vec<u8> = (0..initial).map(|i| i as u8).collect();
        arena.write(a, &fill).unwrap();
        let address = arena.address(a).unwrap();
        let fits = align_up(new_size + NODE_HEADER_SIZE, WORD_SIZE) <= arena.block_capacity(0).unwrap();

        let b = arena.realloc(a, new_size).unwrap();
        if fits {
            prop_assert_eq!(a, b);
            prop_assert_eq!(arena.address(b).unwrap(), address);
        } else {
            prop_assert_ne!(a, b);
        }

        let kept = initial.min(new_size);
        prop_assert_eq!(&arena.bytes(b).unwrap()[..kept], &fill[..kept]);
        prop_assert_eq!(arena.size_of(b).unwrap(), new_size);
    }
}
