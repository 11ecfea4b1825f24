//! Node header and node type definitions.
//!
//! Every tree block starts with a [`NodeHeader`] containing:
//! - [`NodeType`] discriminator
//! - CRC32 checksum for integrity
//! - Slot count and the three sizing constants
//! - Two link fields used by the superblock and by free blocks

use crate::common::BlockId;

/// Kind of node stored in a block.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Block on the free list; `free_list` links to the next free block.
    Unallocated = 0,
    /// Tree metadata: sizes, root address, free-list head, key count.
    Superblock = 1,
    /// Internal node installed at the root address.
    Root = 2,
    /// Internal node below the root.
    Interior = 3,
    /// Key/value node.
    Leaf = 4,
}

impl NodeType {
    /// Convert from u8, returning `None` for unknown tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeType::Unallocated),
            1 => Some(NodeType::Superblock),
            2 => Some(NodeType::Root),
            3 => Some(NodeType::Interior),
            4 => Some(NodeType::Leaf),
            _ => None,
        }
    }

    /// True for `Root` and `Interior`.
    #[inline]
    pub fn is_internal(self) -> bool {
        matches!(self, NodeType::Root | NodeType::Interior)
    }
}

/// Metadata stored at the beginning of every block.
///
/// # Layout (41 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     node_type (NodeType as u8)
/// 1       4     checksum (CRC32)
/// 5       8     num_keys
/// 13      4     key_size
/// 17      4     value_size
/// 21      4     block_size
/// 25      8     root (superblock only)
/// 33      8     free_list (superblock: list head, unallocated: next link)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire block with the checksum field
/// itself set to zero. This allows verification without special handling.
///
/// The raw tag byte is kept as-is so that an unknown tag survives a
/// `from_bytes` call and can be reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    /// Raw node type tag.
    pub tag: u8,
    /// CRC32 checksum of the block contents.
    pub checksum: u32,
    /// Live slots (superblock: total key count of the tree).
    pub num_keys: u64,
    /// Key width of the owning tree.
    pub key_size: u32,
    /// Value width of the owning tree.
    pub value_size: u32,
    /// Block size of the owning store.
    pub block_size: u32,
    /// Root address.
    pub root: BlockId,
    /// Free-list head or next free block.
    pub free_list: BlockId,
}

impl NodeHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 41;

    /// Offset of each field within the header.
    pub const OFFSET_NODE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_NUM_KEYS: usize = 5;
    pub const OFFSET_KEY_SIZE: usize = 13;
    pub const OFFSET_VALUE_SIZE: usize = 17;
    pub const OFFSET_BLOCK_SIZE: usize = 21;
    pub const OFFSET_ROOT: usize = 25;
    pub const OFFSET_FREE_LIST: usize = 33;

    /// Create a new header with the given node type; all other fields zero.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            tag: node_type as u8,
            checksum: 0,
            num_keys: 0,
            key_size: 0,
            value_size: 0,
            block_size: 0,
            root: BlockId::NULL,
            free_list: BlockId::NULL,
        }
    }

    /// Decoded node type, `None` for an unknown tag.
    #[inline]
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_u8(self.tag)
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        Self {
            tag: data[Self::OFFSET_NODE_TYPE],
            checksum: read_u32(data, Self::OFFSET_CHECKSUM),
            num_keys: read_u64(data, Self::OFFSET_NUM_KEYS),
            key_size: read_u32(data, Self::OFFSET_KEY_SIZE),
            value_size: read_u32(data, Self::OFFSET_VALUE_SIZE),
            block_size: read_u32(data, Self::OFFSET_BLOCK_SIZE),
            root: BlockId(read_u64(data, Self::OFFSET_ROOT)),
            free_list: BlockId(read_u64(data, Self::OFFSET_FREE_LIST)),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        data[Self::OFFSET_NODE_TYPE] = self.tag;
        write_u32(data, Self::OFFSET_CHECKSUM, self.checksum);
        write_u64(data, Self::OFFSET_NUM_KEYS, self.num_keys);
        write_u32(data, Self::OFFSET_KEY_SIZE, self.key_size);
        write_u32(data, Self::OFFSET_VALUE_SIZE, self.value_size);
        write_u32(data, Self::OFFSET_BLOCK_SIZE, self.block_size);
        write_u64(data, Self::OFFSET_ROOT, self.root.0);
        write_u64(data, Self::OFFSET_FREE_LIST, self.free_list.0);
    }

    /// Compute CRC32 checksum of a block.
    ///
    /// The checksum is computed with the checksum field (bytes 1-4) zeroed out,
    /// so the checksum doesn't include itself.
    pub fn compute_checksum(block_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();

        // Hash bytes before checksum field (just byte 0: node_type)
        hasher.update(&block_data[..Self::OFFSET_CHECKSUM]);

        // Skip checksum field by feeding zeros instead
        hasher.update(&[0u8; 4]);

        hasher.update(&block_data[Self::OFFSET_CHECKSUM + 4..]);

        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, block_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(block_data)
    }
}

/// Read a little-endian `u32` at `offset`.
#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

/// Read a little-endian `u64` at `offset`.
#[inline]
pub(crate) fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

// ============================================================================
// TESTS
// ============================================================================
