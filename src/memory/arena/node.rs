/*!
 * Arena Node
 * Per-allocation bookkeeping record
 */

use crate::core::limits::{NODE_HEADER_SIZE, WORD_SIZE};
use crate::core::types::Size;

/// Bookkeeping for one arena allocation
///
/// `start` is the header position inside the owning block; the data region
/// follows the header. `end` is the cursor the block had after this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Node {
    pub block: usize,
    pub start: Size,
    pub size: Size,
    pub end: Size,
}

impl Node {
    #[inline]
    pub fn data_offset(&self) -> Size {
        self.start + NODE_HEADER_SIZE
    }

    /// Header bytes as stored in front of the data: requested size, then block index
    pub fn header(&self) -> [u8; NODE_HEADER_SIZE] {
        let mut header = [0u8; NODE_HEADER_SIZE];
        header[..WORD_SIZE].copy_from_slice(&self.size.to_ne_bytes());
        header[WORD_SIZE..].copy_from_slice(&self.block.to_ne_bytes());
        header
    }

    /// Decode a header previously written by [`Node::header`]
    pub fn decode_header(bytes: &[u8]) -> Option<(Size, usize)> {
        if bytes.len() < NODE_HEADER_SIZE {
            return None;
        }
        let size = Size::from_ne_bytes(bytes[..WORD_SIZE].try_into().ok()?);
        let block = usize::from_ne_bytes(bytes[WORD_SIZE..NODE_HEADER_SIZE].try_into().ok()?);
        Some((size, block))
    }
}
