/*!
 * Allocator Pool
 *
 * Fixed-capacity collection of allocators, one handed out per loaded asset.
 * The slot vector is reserved once at construction and never grows; each
 * slot is an `Arc<Mutex<A>>` whose address stays stable for the life of the
 * pool. Slots are not recycled: running out is a fatal-class error.
 */

use super::arena::Arena;
use super::traits::BulkAllocator;
use super::types::{MemoryError, MemoryResult};
use crate::core::limits::DEFAULT_POOL_CAPACITY;
use crate::core::types::{next_allocator_id, AllocatorId, Size};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared handle to one pool slot
pub type PoolSlot<A> = Arc<Mutex<A>>;

/// Pool of per-asset allocators
#[derive(Debug)]
pub struct AllocatorPool<A: BulkAllocator = Arena> {
    id: AllocatorId,
    state: Mutex<PoolState<A>>,
    capacity: usize,
}

#[derive(Debug)]
struct PoolState<A> {
    slots: Vec<PoolSlot<A>>,
    released: bool,
}

impl<A: BulkAllocator> AllocatorPool<A> {
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "Allocator pool created");
        Self {
            id: next_allocator_id(),
            state: Mutex::new(PoolState {
                slots: Vec::with_capacity(capacity),
                released: false,
            }),
            capacity,
        }
    }

    /// Reserve the next slot and construct an allocator of `size` bytes in it
    pub fn get(&self, size: Size) -> MemoryResult<PoolSlot<A>> {
        let mut state = self.state.lock();
        if state.released {
            return Err(MemoryError::Released(self.id));
        }
        if state.slots.len() >= self.capacity {
            error!(capacity = self.capacity, "Allocator pool exhausted");
            return Err(MemoryError::PoolExhausted {
                capacity: self.capacity,
            });
        }

        let slot = Arc::new(Mutex::new(A::with_capacity(size)?));
        state.slots.push(Arc::clone(&slot));
        debug!(slot = state.slots.len() - 1, size, "Allocator pool slot reserved");
        Ok(slot)
    }

    /// Number of slots handed out so far
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Release every occupied slot in slot order, then the slot storage
    ///
    /// Slots still referenced elsewhere are released in place; their holders
    /// see `MemoryError::Released` on further use, and so does `get()`.
    pub fn free_all(&self) {
        let mut state = self.state.lock();
        if state.released {
            return;
        }
        for slot in state.slots.iter() {
            slot.lock().free_all();
        }
        let released = state.slots.len();
        state.slots = Vec::new();
        state.released = true;
        debug!(released, "Allocator pool released");
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

impl<A: BulkAllocator> Default for AllocatorPool<A> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
