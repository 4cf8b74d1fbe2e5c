/*!
 * Arena Allocator
 *
 * Bump allocator over a chain of fixed-capacity blocks.
 *
 * ## Layout
 *
 * Every allocation occupies `align_up(requested + NODE_HEADER_SIZE, WORD_SIZE)`
 * bytes of one block: a header carrying the requested size and block index,
 * then the data region. Node records live in a side table, so "is this the
 * latest allocation" is an index comparison.
 *
 * ## Growth
 *
 * - Requests larger than the latest block go to a later chained block that can
 *   hold them, or to a freshly appended block of twice the aligned size.
 * - Requests that merely overflow the latest block walk forward through the
 *   chain; running off its end appends one block of the configured size.
 *
 * ## Reclaim
 *
 * `free()` is a no-op. `reset()` rewinds all blocks for reuse; `free_all()`
 * returns them to the system and leaves the arena released.
 */

mod block;
mod node;

use crate::core::limits::{checked_align_up, MAX_BLOCK_SIZE, NODE_HEADER_SIZE, WORD_SIZE};
use crate::core::types::{next_allocator_id, Address, AllocatorId, Size};
use crate::memory::traits::{copy_into, Allocator, BulkAllocator, ByteView};
use crate::memory::types::{Allocation, ArenaStats, MemoryError, MemoryResult};
use block::Block;
use node::Node;
use tracing::{debug, trace, warn};

/// Block-chained bump allocator
///
/// Single-writer: mutation requires `&mut self`. Share across threads through
/// [`crate::memory::ThreadSafeArena`].
#[derive(Debug)]
pub struct Arena {
    id: AllocatorId,
    blocks: Vec<Block>,
    latest_block: usize,
    nodes: Vec<Node>,
    block_size: Size,
    generation: u32,
    released: bool,
    reset_count: u64,
    blocks_appended: u64,
    in_place_reallocs: u64,
    copying_reallocs: u64,
}

impl Arena {
    /// Create an arena whose first block can hold one `capacity`-byte allocation
    pub fn new(capacity: Size) -> MemoryResult<Self> {
        let block_size = aligned_span(capacity).ok_or(MemoryError::BlockTooLarge {
            requested: capacity,
            max: MAX_BLOCK_SIZE,
        })?;
        let first = Block::new(block_size)?;

        let arena = Self {
            id: next_allocator_id(),
            block_size: first.capacity(),
            blocks: vec![first],
            latest_block: 0,
            nodes: Vec::new(),
            generation: 0,
            released: false,
            reset_count: 0,
            blocks_appended: 0,
            in_place_reallocs: 0,
            copying_reallocs: 0,
        };

        debug!(
            arena = arena.id,
            block_size = arena.block_size,
            "Arena created"
        );
        Ok(arena)
    }

    pub fn id(&self) -> AllocatorId {
        self.id
    }

    /// Configured block size used when the chain runs out
    pub fn block_size(&self) -> Size {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_capacity(&self, block: usize) -> Option<Size> {
        self.blocks.get(block).map(Block::capacity)
    }

    /// Index of the block new allocations are served from
    pub fn latest_block(&self) -> usize {
        self.latest_block
    }

    /// Handle of the most recent allocation, the only one eligible for in-place realloc
    pub fn latest(&self) -> Option<Allocation> {
        let index = self.nodes.len().checked_sub(1)?;
        Some(Allocation::new(self.id, index as u32, self.generation))
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Number of allocations made since the last reset
    pub fn live_allocations(&self) -> usize {
        self.nodes.len()
    }

    /// Address of the data region; for identity and alignment checks
    pub fn address(&self, allocation: Allocation) -> MemoryResult<Address> {
        let node = self.node(allocation)?;
        Ok(self.blocks[node.block].address(node.data_offset()))
    }

    /// Pointer to the data region
    pub fn as_ptr(&self, allocation: Allocation) -> MemoryResult<*const u8> {
        self.bytes(allocation).map(<[u8]>::as_ptr)
    }

    /// Index of the block holding an allocation
    pub fn block_of(&self, allocation: Allocation) -> MemoryResult<usize> {
        Ok(self.node(allocation)?.block)
    }

    /// Decode the in-block header of an allocation: (requested size, block index)
    pub fn header(&self, allocation: Allocation) -> MemoryResult<(Size, usize)> {
        let node = self.node(allocation)?;
        let bytes = self.blocks[node.block].slice(node.start, NODE_HEADER_SIZE);
        Node::decode_header(bytes).ok_or_else(|| allocation.unknown())
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            block_count: self.blocks.len(),
            reserved_bytes: self.blocks.iter().map(Block::capacity).sum(),
            used_bytes: self.blocks.iter().map(Block::cursor).sum(),
            live_allocations: self.nodes.len(),
            reset_count: self.reset_count,
            blocks_appended: self.blocks_appended,
            in_place_reallocs: self.in_place_reallocs,
            copying_reallocs: self.copying_reallocs,
        }
    }

    /// Rewind every block; existing handles become stale
    pub fn reset(&mut self) {
        if self.released {
            warn!(arena = self.id, "reset() on a released arena ignored");
            return;
        }

        for block in &mut self.blocks {
            block.rewind();
        }
        self.nodes.clear();
        self.latest_block = 0;
        self.generation = self.generation.wrapping_add(1);
        self.reset_count += 1;

        trace!(arena = self.id, blocks = self.blocks.len(), "Arena reset");
    }

    /// Return every block to the system; the arena is unusable afterwards
    pub fn free_all(&mut self) {
        if self.released {
            return;
        }

        let reserved: Size = self.blocks.iter().map(Block::capacity).sum();
        self.blocks.clear();
        self.nodes.clear();
        self.latest_block = 0;
        self.generation = self.generation.wrapping_add(1);
        self.released = true;

        debug!(arena = self.id, reserved, "Arena released");
    }

    fn ensure_live(&self) -> MemoryResult<()> {
        if self.released {
            Err(MemoryError::Released(self.id))
        } else {
            Ok(())
        }
    }

    fn node_index(&self, allocation: Allocation) -> MemoryResult<usize> {
        self.ensure_live()?;
        let index = allocation.index() as usize;
        if allocation.owner() != self.id
            || allocation.generation() != self.generation
            || index >= self.nodes.len()
        {
            return Err(allocation.unknown());
        }
        Ok(index)
    }

    fn node(&self, allocation: Allocation) -> MemoryResult<Node> {
        self.node_index(allocation).map(|index| self.nodes[index])
    }

    fn append_block(&mut self, capacity: Size) -> MemoryResult<usize> {
        let block = Block::new(capacity)?;
        debug!(
            arena = self.id,
            capacity = block.capacity(),
            blocks = self.blocks.len() + 1,
            "Arena grew by one block"
        );
        self.blocks.push(block);
        self.blocks_appended += 1;
        Ok(self.blocks.len() - 1)
    }

    /// Pick the block that will receive `aligned` bytes, growing the chain if needed
    fn block_for(&mut self, aligned: Size) -> MemoryResult<usize> {
        let mut index = self.latest_block;

        if aligned > self.blocks[index].capacity() {
            debug!(
                arena = self.id,
                aligned,
                block_capacity = self.blocks[index].capacity(),
                "Request larger than one block"
            );
            let chained = (index + 1..self.blocks.len()).find(|&i| self.blocks[i].fits(aligned));
            index = match chained {
                Some(i) => i,
                None => {
                    let doubled = aligned
                        .checked_mul(2)
                        .filter(|size| *size <= MAX_BLOCK_SIZE)
                        .unwrap_or(aligned);
                    self.append_block(doubled)?
                }
            };
        }

        while !self.blocks[index].fits(aligned) {
            trace!(arena = self.id, block = index, "Block overflow");
            index += 1;
            if index == self.blocks.len() {
                index = self.append_block(self.block_size.max(aligned))?;
            }
        }

        Ok(index)
    }

    fn alloc_inner(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        self.ensure_live()?;

        let overflow = MemoryError::SizeOverflow { count, elem_size };
        let requested = count.checked_mul(elem_size).ok_or(overflow.clone())?;
        let aligned = aligned_span(requested).ok_or(overflow.clone())?;
        let index = u32::try_from(self.nodes.len()).map_err(|_| overflow)?;

        let block = self.block_for(aligned)?;
        let start = self.blocks[block].bump(aligned);
        let node = Node {
            block,
            start,
            size: requested,
            end: start + aligned,
        };
        self.blocks[block]
            .slice_mut(start, NODE_HEADER_SIZE)
            .copy_from_slice(&node.header());

        self.latest_block = block;
        self.nodes.push(node);

        Ok(Allocation::new(self.id, index, self.generation))
    }

    fn realloc_inner(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        let index = self.node_index(allocation)?;
        let mut node = self.nodes[index];
        let aligned = aligned_span(new_size).ok_or(MemoryError::SizeOverflow {
            count: new_size,
            elem_size: 1,
        })?;

        let is_latest = index + 1 == self.nodes.len();
        let fits_in_place = node
            .start
            .checked_add(aligned)
            .map_or(false, |end| end <= self.blocks[node.block].capacity());

        if is_latest && fits_in_place {
            node.size = new_size;
            node.end = node.start + aligned;
            let block = &mut self.blocks[node.block];
            block.set_cursor(node.end);
            block
                .slice_mut(node.start, NODE_HEADER_SIZE)
                .copy_from_slice(&node.header());
            self.nodes[index] = node;
            self.in_place_reallocs += 1;
            return Ok(allocation);
        }

        let moved = self.alloc_inner(new_size, 1)?;
        let target = self.nodes[moved.index() as usize];
        self.copy_data(node, target, node.size.min(new_size));
        self.copying_reallocs += 1;

        trace!(
            arena = self.id,
            from = index,
            to = moved.index(),
            new_size,
            "Realloc moved allocation"
        );
        Ok(moved)
    }

    fn copy_data(&mut self, from: Node, to: Node, len: Size) {
        if len == 0 {
            return;
        }
        if from.block == to.block {
            let src = from.data_offset();
            self.blocks[from.block]
                .as_mut_slice()
                .copy_within(src..src + len, to.data_offset());
            return;
        }

        let (src, dst) = pair_mut(&mut self.blocks, from.block, to.block);
        dst.slice_mut(to.data_offset(), len)
            .copy_from_slice(src.slice(from.data_offset(), len));
    }
}

/// Bytes one allocation of `requested` bytes occupies, header included
fn aligned_span(requested: Size) -> Option<Size> {
    requested
        .checked_add(NODE_HEADER_SIZE)
        .and_then(|size| checked_align_up(size, WORD_SIZE))
}

/// Borrow two distinct blocks, the first shared and the second mutable
fn pair_mut(blocks: &mut [Block], src: usize, dst: usize) -> (&Block, &mut Block) {
    debug_assert_ne!(src, dst);
    if src < dst {
        let (left, right) = blocks.split_at_mut(dst);
        (&left[src], &mut right[0])
    } else {
        let (left, right) = blocks.split_at_mut(src);
        (&right[0], &mut left[dst])
    }
}

impl Allocator for Arena {
    fn alloc(&mut self, count: Size, elem_size: Size) -> MemoryResult<Allocation> {
        self.alloc_inner(count, elem_size)
    }

    fn free(&mut self, allocation: Allocation) -> MemoryResult<()> {
        // Validate only; arenas reclaim in bulk
        self.node_index(allocation).map(|_| ())
    }

    fn realloc(&mut self, allocation: Allocation, new_size: Size) -> MemoryResult<Allocation> {
        self.realloc_inner(allocation, new_size)
    }

    fn write(&mut self, allocation: Allocation, data: &[u8]) -> MemoryResult<()> {
        copy_into(self.bytes_mut(allocation)?, data)
    }

    fn read(&self, allocation: Allocation) -> MemoryResult<Vec<u8>> {
        self.bytes(allocation).map(<[u8]>::to_vec)
    }
}

impl ByteView for Arena {
    fn bytes(&self, allocation: Allocation) -> MemoryResult<&[u8]> {
        let node = self.node(allocation)?;
        Ok(self.blocks[node.block].slice(node.data_offset(), node.size))
    }

    fn bytes_mut(&mut self, allocation: Allocation) -> MemoryResult<&mut [u8]> {
        let node = self.node(allocation)?;
        Ok(self.blocks[node.block].slice_mut(node.data_offset(), node.size))
    }

    fn size_of(&self, allocation: Allocation) -> MemoryResult<Size> {
        Ok(self.node(allocation)?.size)
    }
}

impl BulkAllocator for Arena {
    fn with_capacity(size: Size) -> MemoryResult<Self> {
        Arena::new(size)
    }

    fn reset(&mut self) {
        Arena::reset(self)
    }

    fn free_all(&mut self) {
        Arena::free_all(self)
    }
}
