/*!
 * Arena Block
 * One fixed-capacity, word-aligned region of system memory
 */

use crate::core::limits::{align_up, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, WORD_SIZE};
use crate::core::types::{Address, Size};
use crate::memory::types::{MemoryError, MemoryResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Contiguous memory block owned by an arena
///
/// The capacity is fixed at creation; the block only moves its bump cursor.
#[derive(Debug)]
pub(super) struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
    cursor: Size,
}

impl Block {
    /// Allocate a zeroed block of at least `capacity` bytes
    pub fn new(capacity: Size) -> MemoryResult<Self> {
        if capacity > MAX_BLOCK_SIZE {
            return Err(MemoryError::BlockTooLarge {
                requested: capacity,
                max: MAX_BLOCK_SIZE,
            });
        }

        let capacity = align_up(capacity.max(MIN_BLOCK_SIZE), WORD_SIZE);
        let layout = Layout::from_size_align(capacity, WORD_SIZE).map_err(|_| {
            MemoryError::BlockTooLarge {
                requested: capacity,
                max: MAX_BLOCK_SIZE,
            }
        })?;

        // SAFETY: layout has a non-zero size (at least MIN_BLOCK_SIZE)
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::OutOfMemory {
            requested: capacity,
        })?;

        Ok(Self {
            ptr,
            layout,
            cursor: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> Size {
        self.layout.size()
    }

    #[inline]
    pub fn cursor(&self) -> Size {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> Size {
        self.capacity() - self.cursor
    }

    /// Whether `aligned` more bytes fit; an exact fit is accepted
    #[inline]
    pub fn fits(&self, aligned: Size) -> bool {
        aligned <= self.remaining()
    }

    /// Advance the cursor by `aligned` bytes, returning the old cursor
    #[inline]
    pub fn bump(&mut self, aligned: Size) -> Size {
        debug_assert!(self.fits(aligned));
        let start = self.cursor;
        self.cursor += aligned;
        start
    }

    #[inline]
    pub fn set_cursor(&mut self, cursor: Size) {
        debug_assert!(cursor <= self.capacity());
        self.cursor = cursor;
    }

    #[inline]
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    #[inline]
    pub fn address(&self, offset: Size) -> Address {
        self.ptr.as_ptr() as Address + offset
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for capacity bytes for the lifetime of self
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for capacity bytes and uniquely borrowed through &mut self
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity()) }
    }

    pub fn slice(&self, offset: Size, len: Size) -> &[u8] {
        &self.as_slice()[offset..offset + len]
    }

    pub fn slice_mut(&mut self, offset: Size, len: Size) -> &mut [u8] {
        &mut self.as_mut_slice()[offset..offset + len]
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

// SAFETY: a block exclusively owns its memory and has no interior mutability
unsafe impl Send for Block {}
unsafe impl Sync for Block {}
