/*!
 * Tracking Allocator
 *
 * Individually freeable allocations kept in a slot table. Unlike the arena,
 * `free()` returns the memory immediately, and misuse is detected: freeing a
 * slot twice is `DoubleFree`, a handle from another allocator or epoch is
 * `UnknownAllocation`. Freed slots are reused by later allocations under a
 * bumped per-slot generation, so stale handles never alias new data.
 */

use super::traits::{copy_into, Allocator, BulkAllocator, ByteView};
use super::types::{Allocation, MemoryError, MemoryResult, TrackingStats};
use crate::core::types::{next_allocator_id, AllocatorId, Size};
use tracing::{debug, trace};

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<Vec<u8>>,
}

/// Allocator with per-allocation ownership and free
#[derive(Debug)]
pub struct TrackingAllocator {
    id: AllocatorId,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    released: bool,
    live_bytes: usize,
    total_allocations: u64,
    total_frees: u64,
}

impl TrackingAllocator {
    /// Create an allocator with room for `slots` allocations before the table grows
    pub fn new(slots: usize) -> Self {
        Self {
            id: next_allocator_id(),
            slots: Vec::with_capacity(slots),
            free_slots: Vec::new(),
            released: false,
            live_bytes: 0,
            total_allocations: 0,
            total_frees: 0,
        }
    }

    pub fn id(&self) -> AllocatorId {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Slots the table holds before it has to grow
    pub fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn live_allocations(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    pub fn stats(&self) -> TrackingStats {
        TrackingStats {
            live_allocations: self.live_allocations(),
            live_bytes: self.live_bytes,
            total_allocations: self.total_allocations,
            total_frees: self.total_frees,
        }
    }

    /// Free every live allocation and invalidate all outstanding handles
    pub fn reset(&mut self) {
        if self.released {
            return;
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.data.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(index as u32);
                self.total_frees += 1;
            }
        }
        self.live_bytes = 0;
    }

    /// Drop all memory including the slot table; terminal state
    pub fn free_all(&mut self) {
        if self.released {
            return;
        }
        debug!(
            allocator = self.id,
            live = self.live_allocations(),
            live_bytes = self.live_bytes,
            "Tracking allocator released"
        );
        self.slots = Vec::new();
        self.free_slots = Vec::new();
        self.live_bytes = 0;
        self.released = true;
    }

    fn ensure_live(&self) -> MemoryResult<()> {
        if self.released {
            Err(MemoryError::Released(self.id))
        } else {
            Ok(())
        }
    }

    /// Slot of a handle that matches this allocator and epoch, live or freed
    fn slot_index(&self, allocation: Allocation) -> MemoryResult<usize> {
        self.ensure_live()?;
        let index = allocation.index() as usize;
        match self.slots.get(index) {
            Some(slot) if allocation.owner() == self.id => {
                if slot.generation == allocation.generation() {
                    Ok(index)
                } else if slot.generation == allocation.generation().wrapping_add(1)
                    && slot.data.is_none()
                {
                    Err(MemoryError::DoubleFree {
                        index: allocation.index(),
                    })
                } else {
                    Err(allocation.unknown())
                }
            }
            _ => Err(allocation.unknown()),
        }
    }

    fn data(&self, allocation: Allocation) -> MemoryResult<&Vec<u8>> {
        let index = self.slot_index(allocation)?;
        self.slots[index]
            .data
            .as_ref()
            .ok_or_else(|| allocation.unknown())
    }

    fn data_mut(&mut self, allocation: Allocation) -> MemoryResult<&mut Vec<u8>> {
        let index = self.slot_index(allocation)?;
        self.slots[index]
            .data
            .as_mut()
            .ok_or_else(|| allocation.unknown())
    }

    fn insert(&mut self, data: Vec<u8>) -> MemoryResult<Allocation> {
        let len = data.len();
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize].data = Some(data);
                index
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| {
                    MemoryError::SizeOverflow {
                        count: self.slots.len(),
                        elem_size: 1,
                    }
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                index
            }
        };

        self.live_bytes += len;
        self.total_allocations += 1;
        let generation = self.slots[index as usize].generation;
        trace!(allocator = self.id, index, len, "Tracked allocation");
        Ok(Allocation::new(self.id, index, generation))
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Allocator for TrackingAllocator {
    fn alloc(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        self.ensure_live()?;
        let requested = count
            .checked_mul(elem_size)
            .ok_or(MemoryError::SizeOverflow { count, elem_size })?;
        let mut data = Vec::new();
        data.try_reserve_exact(requested)
            .map_err(|_| MemoryError::OutOfMemory { requested })?;
        data.resize(requested, 0);
        self.insert(data)
    }

    fn free(&mut self, allocation: Allocation) -> MemoryResult<()> {
        let index = self.slot_index(allocation)?;
        let slot = &mut self.slots[index];
        let data = slot.data.take().ok_or(MemoryError::DoubleFree {
            index: allocation.index(),
        })?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(allocation.index());
        self.live_bytes -= data.len();
        self.total_frees += 1;
        Ok(())
    }

    fn realloc(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        let data = self.data_mut(allocation)?;
        let old = data.len();
        if new_size > old {
            data.try_reserve_exact(new_size - old)
                .map_err(|_| MemoryError::OutOfMemory {
                    requested: new_size,
                })?;
        }
        data.resize(new_size, 0);
        self.live_bytes = self.live_bytes - old + new_size;
        Ok(allocation)
    }

    fn write(&mut self, allocation: Allocation, data: &[u8]) -> MemoryResult<()> {
        copy_into(self.data_mut(allocation)?, data)
    }

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>> {
        self.data(allocation).cloned()
    }
}

impl ByteView for TrackingAllocator {
    fn bytes(&self, allocation: Allocation) -> MemoryResult<&[u8]> {
        self.data(allocation).map(Vec::as_slice)
    }

    fn bytes_mut(&mut self, allocation: Allocation) -> MemoryResult<&mut [u8]> {
        self.data_mut(allocation).map(Vec::as_mut_slice)
    }
}

impl BulkAllocator for TrackingAllocator {
    /// `size` is a byte budget; allocations own their bytes, so no slots are reserved
    fn with_capacity(size: Size) -> MemoryResult<Self> {
        trace!(size, "Tracking allocator created without reserved slots");
        Ok(TrackingAllocator::new(0))
    }

    fn reset(&mut self) {
        TrackingAllocator::reset(self)
    }

    fn free_all(&mut self) {
        TrackingAllocator::free_all(self)
    }
}
