/*!
 * Thread-Safe Allocators
 *
 * `Locked<A>` composes one allocator with one `parking_lot::Mutex`. Every
 * operation takes the lock exactly once and then calls the wrapped
 * allocator's own `&mut self` implementation, so a moving `realloc` reaches
 * the inner `alloc` without locking again. No re-entrant mutex exists.
 */

use super::arena::Arena;
use super::tracking::TrackingAllocator;
use super::traits::{Allocator, BulkAllocator, ByteView, SharedAllocator};
use super::types::{Allocation, MemoryResult};
use crate::core::sync::{LockId, LockOrderLog};
use crate::core::types::Size;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Arena shareable across worker threads
pub type ThreadSafeArena = Locked<Arena>;

/// Tracking allocator shareable across worker threads
pub type ThreadSafeTracking = Locked<TrackingAllocator>;

/// Allocator behind a single mutex
#[derive(Debug)]
pub struct Locked<A> {
    inner: Mutex<A>,
    order: Option<(Arc<LockOrderLog>, LockId)>,
}

/// Lock guard that reports its release to the lock-order log before unlocking
struct Held<'a, A> {
    guard: MutexGuard<'a, A>,
    order: Option<&'a (Arc<LockOrderLog>, LockId)>,
}

impl<A> Drop for Held<'_, A> {
    fn drop(&mut self) {
        if let Some((log, id)) = self.order {
            log.released(*id);
        }
    }
}

impl<A> Locked<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner: Mutex::new(inner),
            order: None,
        }
    }

    /// Wrap `inner`, reporting acquire/release events to `log` under `name`
    pub fn with_lock_order(inner: A, log: Arc<LockOrderLog>, name: &str) -> Self {
        let id = log.register(name);
        Self {
            inner: Mutex::new(inner),
            order: Some((log, id)),
        }
    }

    /// Lock id in the attached lock-order log, if any
    pub fn lock_id(&self) -> Option<LockId> {
        self.order.as_ref().map(|(_, id)| *id)
    }

    fn hold(&self) -> Held<'_, A> {
        let guard = self.inner.lock();
        let order = self.order.as_ref();
        if let Some((log, id)) = order {
            log.acquired(*id);
        }
        Held { guard, order }
    }

    /// Run `f` with exclusive access to the wrapped allocator
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        let mut held = self.hold();
        f(&mut held.guard)
    }

    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

impl<A: ByteView> Locked<A> {
    /// Borrow an allocation's bytes for the duration of `f`, under the lock
    pub fn with_bytes<R>(
        &self,
        allocation: Allocation,
        f: impl FnOnce(&[u8]) -> R,
    ) -> MemoryResult<R> {
        let held = self.hold();
        held.guard.bytes(allocation).map(f)
    }

    /// Mutably borrow an allocation's bytes for the duration of `f`, under the lock
    pub fn with_bytes_mut<R>(
        &self,
        allocation: Allocation,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> MemoryResult<R> {
        let mut held = self.hold();
        held.guard.bytes_mut(allocation).map(f)
    }

    pub fn size_of(&self, allocation: Allocation) -> MemoryResult<Size> {
        self.hold().guard.size_of(allocation)
    }
}

impl<A: BulkAllocator> Locked<A> {
    pub fn with_capacity(size: Size) -> MemoryResult<Self> {
        A::with_capacity(size).map(Self::new)
    }

    pub fn reset(&self) {
        self.hold().guard.reset();
    }

    pub fn free_all(&self) {
        self.hold().guard.free_all();
    }
}

impl<A: Allocator> SharedAllocator for Locked<A> {
    fn alloc(&self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        self.hold().guard.alloc(count, elem_size)
    }

    fn free(&self, allocation: Allocation) -> MemoryResult<()> {
        self.hold().guard.free(allocation)
    }

    fn realloc(&self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        self.hold().guard.realloc(allocation, new_size)
    }

    fn write(&self, allocation: Allocation, data: &[u8]) -> MemoryResult<()> {
        self.hold().guard.write(allocation, data)
    }

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>> {
        self.hold().guard.read(allocation)
    }
}

impl<A: Allocator> Allocator for Locked<A> {
    fn alloc(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        SharedAllocator::alloc(&*self, count, elem_size)
    }

    fn free(&mut self, allocation: Allocation) -> MemoryResult<()> {
        SharedAllocator::free(&*self, allocation)
    }

    fn realloc(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        SharedAllocator::realloc(&*self, allocation, new_size)
    }

    fn write(&mut self, allocation: Allocation, data: &[u8]) -> MemoryResult<()> {
        SharedAllocator::write(&*self, allocation, data)
    }

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>> {
        SharedAllocator::read(self, allocation)
    }
}

impl<A: BulkAllocator> BulkAllocator for Locked<A> {
    fn with_capacity(size: Size) -> MemoryResult<Self> {
        Locked::with_capacity(size)
    }

    fn reset(&mut self) {
        Locked::reset(self)
    }

    fn free_all(&mut self) {
        Locked::free_all(self)
    }
}
