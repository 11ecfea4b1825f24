//! Block - the fundamental unit of storage.
//!
//! A [`Block`] is a raw, fixed-size byte buffer that serves as the unit of
//! I/O between a [`BlockStore`](crate::storage::BlockStore) and the tree.
//! Every tree node occupies exactly one block.

use super::node_header::NodeHeader;

/// A block of data.
///
/// The size is chosen by the store and is the same for every block of one
/// store; the tree reads it once at attach time.
///
/// # Clone Implementation
/// `Block` does NOT implement `Clone` in production code; copying a block
/// should be explicit ([`Block::from_slice`]). A `#[cfg(test)]` Clone is
/// provided for tests.
///
/// # Example
/// ```
/// use blocktree::storage::block::Block;
///
/// let mut block = Block::new(512);
/// block.as_mut_slice()[0] = 0xFF;
/// assert_eq!(block.as_slice()[0], 0xFF);
/// assert_eq!(block.len(), 512);
/// ```
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Create a new zeroed block of `size` bytes.
    #[inline]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Create a block holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec().into_boxed_slice(),
        }
    }

    /// Get immutable slice of block data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of block data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of this block in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the node header.
    pub fn header(&self) -> NodeHeader {
        NodeHeader::from_bytes(&self.data)
    }

    /// Write a node header.
    pub fn set_header(&mut self, header: &NodeHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the block are complete.
    pub fn update_checksum(&mut self) {
        let checksum = NodeHeader::compute_checksum(&self.data);
        self.data[NodeHeader::OFFSET_CHECKSUM..NodeHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the block checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Block {
    fn clone(&self) -> Self {
        Block::from_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block::NodeType;

    #[test]
    fn test_block_new() {
        let block = Block::new(256);
        assert_eq!(block.len(), 256);
        assert!(block.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_block_read_write() {
        let mut block = Block::new(128);

        block.as_mut_slice()[0] = 0xFF;
        block.as_mut_slice()[127] = 0xCD;

        assert_eq!(block.as_slice()[0], 0xFF);
        assert_eq!(block.as_slice()[127], 0xCD);
    }

    #[test]
    fn test_block_checksum_roundtrip() {
        let mut block = Block::new(128);
        block.set_header(&NodeHeader::new(NodeType::Leaf));
        block.as_mut_slice()[100] = 0x42;
        block.update_checksum();
        assert!(block.verify_checksum());

        block.as_mut_slice()[100] = 0x43;
        assert!(!block.verify_checksum());
    }

    #[test]
    fn test_block_from_slice_copies() {
        let src = [1u8, 2, 3, 4];
        let block = Block::from_slice(&src);
        assert_eq!(block.as_slice(), &src);
    }
}
