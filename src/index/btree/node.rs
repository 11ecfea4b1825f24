//! Node codec - the in-memory view of one tree block.
//!
//! A [`Node`] owns a copy of its block and reads/writes slots in place.
//! The header is kept decoded alongside and written back, with a fresh
//! checksum, when the node is serialized.
//!
//! # Slot layout
//! ```text
//! Leaf:      [header][k0 v0][k1 v1]...            slot = key + max(value, 8)
//! Interior:  [header][c0 k0][c1 k1]...[cN]        slot = 8 + key
//! ```

use std::cmp::Ordering;

use crate::common::config::{MIN_NODE_CAPACITY, POINTER_SIZE};
use crate::common::{BTreeConfig, BlockId, Error, Result};
use crate::storage::block::node_header::{read_u64, write_u64};
use crate::storage::block::{Block, NodeHeader, NodeType};
use crate::storage::BlockStore;

/// Sizing shared by every node of one tree.
///
/// Computed once at attach time; capacities are pure functions of the
/// three sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub key_size: usize,
    pub value_size: usize,
    pub block_size: usize,
}

impl NodeLayout {
    /// Build a layout for `config` on blocks of `block_size` bytes.
    ///
    /// # Errors
    /// `InvalidConfig` if either node kind would hold fewer than two slots.
    pub fn new(config: &BTreeConfig, block_size: usize) -> Result<Self> {
        config.validate()?;
        if u32::try_from(block_size).is_err() {
            return Err(Error::InvalidConfig(format!(
                "block size {} does not fit in 32 bits",
                block_size
            )));
        }

        let layout = Self {
            key_size: config.key_size,
            value_size: config.value_size,
            block_size,
        };

        if layout.leaf_capacity() < MIN_NODE_CAPACITY
            || layout.interior_capacity() < MIN_NODE_CAPACITY
        {
            return Err(Error::InvalidConfig(format!(
                "block size {} holds {} leaf / {} interior slots for key {} value {}; need at least {}",
                block_size,
                layout.leaf_capacity(),
                layout.interior_capacity(),
                config.key_size,
                config.value_size,
                MIN_NODE_CAPACITY
            )));
        }

        Ok(layout)
    }

    /// Bytes per leaf slot.
    #[inline]
    pub fn leaf_slot_size(&self) -> usize {
        self.key_size + self.value_size.max(POINTER_SIZE)
    }

    /// Bytes per interior slot (child pointer + key).
    #[inline]
    pub fn interior_slot_size(&self) -> usize {
        POINTER_SIZE + self.key_size
    }

    /// Maximum key/value pairs in a leaf.
    pub fn leaf_capacity(&self) -> usize {
        self.block_size.saturating_sub(NodeHeader::SIZE) / self.leaf_slot_size()
    }

    /// Maximum keys in a root/interior node (children = keys + 1).
    pub fn interior_capacity(&self) -> usize {
        self.block_size
            .saturating_sub(NodeHeader::SIZE + POINTER_SIZE)
            / self.interior_slot_size()
    }

    /// The config this layout was built from.
    pub fn config(&self) -> BTreeConfig {
        BTreeConfig::new(self.key_size, self.value_size)
    }
}

/// A decoded tree block.
pub struct Node {
    layout: NodeLayout,
    node_type: NodeType,
    header: NodeHeader,
    block: Block,
}

impl Node {
    /// Create an empty node of the given kind.
    pub fn new(node_type: NodeType, layout: NodeLayout) -> Self {
        let mut header = NodeHeader::new(node_type);
        header.key_size = layout.key_size as u32;
        header.value_size = layout.value_size as u32;
        header.block_size = layout.block_size as u32;

        Self {
            layout,
            node_type,
            header,
            block: Block::new(layout.block_size),
        }
    }

    /// Leaf holding `entries`, which must already be sorted.
    pub fn leaf_from_entries(layout: NodeLayout, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<Self> {
        let mut node = Node::new(NodeType::Leaf, layout);
        for (i, (key, value)) in entries.iter().enumerate() {
            node.set_key(i, key)?;
            node.set_value(i, value)?;
        }
        node.set_num_keys(entries.len())?;
        Ok(node)
    }

    /// Root or interior node with `keys` and `keys.len() + 1` children.
    pub fn internal_from_parts(
        node_type: NodeType,
        layout: NodeLayout,
        keys: &[Vec<u8>],
        children: &[BlockId],
    ) -> Result<Self> {
        if !node_type.is_internal() {
            return Err(Error::corrupt(format!(
                "{:?} is not an internal node type",
                node_type
            )));
        }
        if children.len() != keys.len() + 1 {
            return Err(Error::corrupt(format!(
                "{} keys need {} children, got {}",
                keys.len(),
                keys.len() + 1,
                children.len()
            )));
        }

        let mut node = Node::new(node_type, layout);
        for (i, key) in keys.iter().enumerate() {
            node.set_key(i, key)?;
        }
        for (i, &child) in children.iter().enumerate() {
            node.set_child(i, child)?;
        }
        node.set_num_keys(keys.len())?;
        Ok(node)
    }

    /// Deserialize a node from `block`.
    ///
    /// # Errors
    /// `Corrupt` on a checksum mismatch, an unknown tag, or sizes that
    /// don't belong to this tree.
    pub fn from_block(block: Block, layout: NodeLayout) -> Result<Self> {
        if block.len() != layout.block_size {
            return Err(Error::corrupt(format!(
                "block is {} bytes, tree uses {}",
                block.len(),
                layout.block_size
            )));
        }

        let header = block.header();
        if !header.verify_checksum(block.as_slice()) {
            return Err(Error::corrupt("checksum mismatch"));
        }

        let node_type = header
            .node_type()
            .ok_or_else(|| Error::corrupt(format!("unknown node type tag {}", header.tag)))?;

        if header.key_size as usize != layout.key_size
            || header.value_size as usize != layout.value_size
            || header.block_size as usize != layout.block_size
        {
            return Err(Error::corrupt(format!(
                "node sizes key {} value {} block {} don't match tree",
                header.key_size, header.value_size, header.block_size
            )));
        }

        let node = Self {
            layout,
            node_type,
            header,
            block,
        };

        if node.num_keys() > node.capacity() {
            return Err(Error::corrupt(format!(
                "{:?} node claims {} keys, capacity is {}",
                node_type,
                node.num_keys(),
                node.capacity()
            )));
        }

        Ok(node)
    }

    /// Read and deserialize block `block_id` from `store`.
    pub fn read<S: BlockStore + ?Sized>(
        store: &S,
        block_id: BlockId,
        layout: NodeLayout,
    ) -> Result<Self> {
        let block = store.read_block(block_id)?;
        Node::from_block(block, layout).map_err(|e| match e {
            Error::Corrupt(msg) => Error::Corrupt(format!("block {}: {}", block_id, msg)),
            other => other,
        })
    }

    /// Serialize and write this node to block `block_id`.
    pub fn write<S: BlockStore + ?Sized>(&mut self, store: &S, block_id: BlockId) -> Result<()> {
        store.write_block(block_id, self.serialize())
    }

    /// Write the header and checksum into the block and return it.
    pub fn serialize(&mut self) -> &Block {
        self.header.tag = self.node_type as u8;
        self.block.set_header(&self.header);
        self.block.update_checksum();
        &self.block
    }

    /// Serialize and hand back the underlying block.
    pub fn into_block(mut self) -> Block {
        self.serialize();
        self.block
    }

    // ========================================================================
    // Header fields
    // ========================================================================

    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Retag the node. Slot contents are left as they are.
    #[inline]
    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type;
    }

    #[inline]
    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    /// Number of live keys.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.header.num_keys as usize
    }

    /// Set the number of live keys.
    ///
    /// # Errors
    /// `IndexInvalid` if `n` exceeds the node's capacity.
    pub fn set_num_keys(&mut self, n: usize) -> Result<()> {
        if n > self.capacity() {
            return Err(Error::IndexInvalid {
                index: n,
                limit: self.capacity(),
            });
        }
        self.header.num_keys = n as u64;
        Ok(())
    }

    /// Slot capacity for this node's kind; zero for metadata blocks.
    pub fn capacity(&self) -> usize {
        match self.node_type {
            NodeType::Leaf => self.layout.leaf_capacity(),
            NodeType::Root | NodeType::Interior => self.layout.interior_capacity(),
            NodeType::Unallocated | NodeType::Superblock => 0,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_keys() >= self.capacity()
    }

    /// Free-list link of an `Unallocated` block.
    #[inline]
    pub fn next_free(&self) -> BlockId {
        self.header.free_list
    }

    #[inline]
    pub fn set_next_free(&mut self, next: BlockId) {
        self.header.free_list = next;
    }

    // ========================================================================
    // Slot accessors
    // ========================================================================

    /// Key at slot `i`.
    pub fn key(&self, i: usize) -> Result<&[u8]> {
        self.check_read(i, self.num_keys())?;
        let offset = self.key_offset(i);
        Ok(&self.block.as_slice()[offset..offset + self.layout.key_size])
    }

    /// Overwrite the key at slot `i`.
    pub fn set_key(&mut self, i: usize, key: &[u8]) -> Result<()> {
        check_width("key", key, self.layout.key_size)?;
        self.check_read(i, self.capacity())?;
        let offset = self.key_offset(i);
        self.block.as_mut_slice()[offset..offset + key.len()].copy_from_slice(key);
        Ok(())
    }

    /// Value at slot `i` of a leaf.
    pub fn value(&self, i: usize) -> Result<&[u8]> {
        self.expect_leaf("value")?;
        self.check_read(i, self.num_keys())?;
        let offset = self.value_offset(i);
        Ok(&self.block.as_slice()[offset..offset + self.layout.value_size])
    }

    /// Overwrite the value at slot `i` of a leaf.
    pub fn set_value(&mut self, i: usize, value: &[u8]) -> Result<()> {
        self.expect_leaf("value")?;
        check_width("value", value, self.layout.value_size)?;
        self.check_read(i, self.capacity())?;
        let offset = self.value_offset(i);
        self.block.as_mut_slice()[offset..offset + value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Child pointer `i` (0..=num_keys) of an internal node.
    pub fn child(&self, i: usize) -> Result<BlockId> {
        self.expect_internal("child")?;
        self.check_read(i, self.num_keys() + 1)?;
        Ok(BlockId(read_u64(self.block.as_slice(), self.child_offset(i))))
    }

    /// Overwrite child pointer `i` of an internal node.
    pub fn set_child(&mut self, i: usize, child: BlockId) -> Result<()> {
        self.expect_internal("child")?;
        self.check_read(i, self.capacity() + 1)?;
        let offset = self.child_offset(i);
        write_u64(self.block.as_mut_slice(), offset, child.0);
        Ok(())
    }

    // ========================================================================
    // Search and bulk access
    // ========================================================================

    /// Index of the child to follow for `key`: the slot left of the first
    /// key strictly greater than `key`, or the last child if none is.
    pub fn child_index(&self, key: &[u8]) -> Result<usize> {
        for i in 0..self.num_keys() {
            if key < self.key(i)? {
                return Ok(i);
            }
        }
        Ok(self.num_keys())
    }

    /// Binary search the live keys: `Ok(i)` on an exact match, otherwise
    /// `Err(i)` with the sorted insert position.
    pub fn find_slot(&self, key: &[u8]) -> Result<std::result::Result<usize, usize>> {
        let (mut lo, mut hi) = (0, self.num_keys());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key(mid)?.cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    /// Insert a pair at slot `pos` of a non-full leaf, shifting later
    /// slots one to the right.
    pub fn insert_entry(&mut self, pos: usize, key: &[u8], value: &[u8]) -> Result<()> {
        self.expect_leaf("entry")?;
        let n = self.num_keys();
        if n >= self.capacity() {
            return Err(Error::IndexInvalid {
                index: n,
                limit: self.capacity(),
            });
        }
        self.check_read(pos, n + 1)?;

        let slot = self.layout.leaf_slot_size();
        let start = self.key_offset(pos);
        let end = self.key_offset(n);
        self.block
            .as_mut_slice()
            .copy_within(start..end, start + slot);

        self.set_num_keys(n + 1)?;
        self.set_key(pos, key)?;
        self.set_value(pos, value)
    }

    /// All live keys, in slot order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        (0..self.num_keys())
            .map(|i| self.key(i).map(<[u8]>::to_vec))
            .collect()
    }

    /// All live children of an internal node, in slot order.
    pub fn children(&self) -> Result<Vec<BlockId>> {
        (0..=self.num_keys()).map(|i| self.child(i)).collect()
    }

    /// All live pairs of a leaf, in slot order.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (0..self.num_keys())
            .map(|i| Ok((self.key(i)?.to_vec(), self.value(i)?.to_vec())))
            .collect()
    }

    // ========================================================================
    // Internal: offsets and checks
    // ========================================================================

    fn key_offset(&self, i: usize) -> usize {
        match self.node_type {
            NodeType::Leaf => NodeHeader::SIZE + i * self.layout.leaf_slot_size(),
            _ => self.child_offset(i) + POINTER_SIZE,
        }
    }

    fn value_offset(&self, i: usize) -> usize {
        self.key_offset(i) + self.layout.key_size
    }

    fn child_offset(&self, i: usize) -> usize {
        NodeHeader::SIZE + i * self.layout.interior_slot_size()
    }

    fn check_read(&self, index: usize, limit: usize) -> Result<()> {
        if index >= limit {
            return Err(Error::IndexInvalid { index, limit });
        }
        Ok(())
    }

    fn expect_leaf(&self, what: &str) -> Result<()> {
        match self.node_type {
            NodeType::Leaf => Ok(()),
            other => Err(Error::corrupt(format!("{} access on {:?} node", what, other))),
        }
    }

    fn expect_internal(&self, what: &str) -> Result<()> {
        if self.node_type.is_internal() {
            Ok(())
        } else {
            Err(Error::corrupt(format!(
                "{} access on {:?} node",
                what, self.node_type
            )))
        }
    }
}

/// Reject a key or value of the wrong width.
pub(crate) fn check_width(what: &'static str, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(Error::SizeMismatch {
            what,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8-byte keys and values on blocks that fit exactly 4 slots of each kind.
    fn small_layout() -> NodeLayout {
        NodeLayout::new(&BTreeConfig::new(8, 8), 113).unwrap()
    }

    fn k(n: u64) -> Vec<u8> {
        n.to_be_bytes().to_vec()
    }

    #[test]
    fn test_layout_capacities() {
        let layout = small_layout();
        assert_eq!(layout.leaf_capacity(), 4);
        assert_eq!(layout.interior_capacity(), 4);

        let big = NodeLayout::new(&BTreeConfig::new(8, 8), 4096).unwrap();
        assert_eq!(big.leaf_capacity(), (4096 - 41) / 16);
        assert_eq!(big.interior_capacity(), (4096 - 49) / 16);
    }

    #[test]
    fn test_small_value_uses_pointer_width() {
        let layout = NodeLayout::new(&BTreeConfig::new(4, 2), 4096).unwrap();
        assert_eq!(layout.leaf_slot_size(), 12);
    }

    #[test]
    fn test_layout_rejects_tiny_blocks() {
        let result = NodeLayout::new(&BTreeConfig::new(8, 8), 64);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_leaf_roundtrip() {
        let layout = small_layout();
        let entries = vec![(k(1), k(10)), (k(2), k(20)), (k(3), k(30))];
        let block = Node::leaf_from_entries(layout, &entries)
            .unwrap()
            .into_block();

        let node = Node::from_block(block, layout).unwrap();
        assert_eq!(node.node_type(), NodeType::Leaf);
        assert_eq!(node.num_keys(), 3);
        assert_eq!(node.entries().unwrap(), entries);
    }

    #[test]
    fn test_interior_roundtrip() {
        let layout = small_layout();
        let keys = vec![k(10), k(20)];
        let children = vec![BlockId(5), BlockId(6), BlockId(7)];
        let block = Node::internal_from_parts(NodeType::Interior, layout, &keys, &children)
            .unwrap()
            .into_block();

        let node = Node::from_block(block, layout).unwrap();
        assert_eq!(node.node_type(), NodeType::Interior);
        assert_eq!(node.keys().unwrap(), keys);
        assert_eq!(node.children().unwrap(), children);
    }

    #[test]
    fn test_unallocated_roundtrip_keeps_link() {
        let layout = small_layout();
        let mut node = Node::new(NodeType::Unallocated, layout);
        node.set_next_free(BlockId(9));
        let node = Node::from_block(node.into_block(), layout).unwrap();
        assert_eq!(node.node_type(), NodeType::Unallocated);
        assert_eq!(node.next_free(), BlockId(9));
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let layout = small_layout();
        let mut block = Node::leaf_from_entries(layout, &[(k(1), k(1))])
            .unwrap()
            .into_block();
        block.as_mut_slice()[NodeHeader::SIZE] ^= 0xFF;

        assert!(matches!(
            Node::from_block(block, layout),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_corrupt() {
        let layout = small_layout();
        let mut block = Node::new(NodeType::Leaf, layout).into_block();
        block.as_mut_slice()[0] = 42;
        block.update_checksum();

        assert!(matches!(
            Node::from_block(block, layout),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_mismatched_sizes_are_corrupt() {
        let layout = small_layout();
        let other = NodeLayout::new(&BTreeConfig::new(4, 8), 113).unwrap();
        let block = Node::new(NodeType::Leaf, other).into_block();

        assert!(matches!(
            Node::from_block(block, layout),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_accessors_bounds_checked() {
        let layout = small_layout();
        let mut node = Node::leaf_from_entries(layout, &[(k(1), k(1))]).unwrap();

        assert!(matches!(
            node.key(1),
            Err(Error::IndexInvalid { index: 1, limit: 1 })
        ));
        assert!(matches!(
            node.set_key(4, &k(9)),
            Err(Error::IndexInvalid { index: 4, limit: 4 })
        ));
        assert!(matches!(node.child(0), Err(Error::Corrupt(_))));
        assert!(matches!(
            node.set_key(0, &[1, 2]),
            Err(Error::SizeMismatch { .. })
        ));

        let interior =
            Node::internal_from_parts(NodeType::Root, layout, &[k(5)], &[BlockId(2), BlockId(3)])
                .unwrap();
        assert_eq!(interior.child(1).unwrap(), BlockId(3));
        assert!(matches!(
            interior.child(2),
            Err(Error::IndexInvalid { index: 2, limit: 2 })
        ));
        assert!(matches!(interior.value(0), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_child_index_routes_equal_keys_right() {
        let layout = small_layout();
        let node = Node::internal_from_parts(
            NodeType::Root,
            layout,
            &[k(10), k(20)],
            &[BlockId(2), BlockId(3), BlockId(4)],
        )
        .unwrap();

        assert_eq!(node.child_index(&k(5)).unwrap(), 0);
        assert_eq!(node.child_index(&k(10)).unwrap(), 1);
        assert_eq!(node.child_index(&k(15)).unwrap(), 1);
        assert_eq!(node.child_index(&k(20)).unwrap(), 2);
        assert_eq!(node.child_index(&k(99)).unwrap(), 2);
    }

    #[test]
    fn test_find_slot() {
        let layout = small_layout();
        let node =
            Node::leaf_from_entries(layout, &[(k(2), k(0)), (k(4), k(0)), (k(6), k(0))]).unwrap();

        assert_eq!(node.find_slot(&k(4)).unwrap(), Ok(1));
        assert_eq!(node.find_slot(&k(1)).unwrap(), Err(0));
        assert_eq!(node.find_slot(&k(5)).unwrap(), Err(2));
        assert_eq!(node.find_slot(&k(7)).unwrap(), Err(3));
    }

    #[test]
    fn test_insert_entry_shifts_right() {
        let layout = small_layout();
        let mut node =
            Node::leaf_from_entries(layout, &[(k(1), k(10)), (k(3), k(30))]).unwrap();

        node.insert_entry(1, &k(2), &k(20)).unwrap();
        node.insert_entry(0, &k(0), &k(0)).unwrap();

        assert_eq!(node.keys().unwrap(), vec![k(0), k(1), k(2), k(3)]);
        assert_eq!(node.value(2).unwrap(), &k(20)[..]);
        assert!(node.is_full());

        assert!(matches!(
            node.insert_entry(0, &k(9), &k(9)),
            Err(Error::IndexInvalid { .. })
        ));
    }

    #[test]
    fn test_byte_order_is_unsigned() {
        let layout = small_layout();
        let node = Node::leaf_from_entries(layout, &[(vec![0x01; 8], k(0)), (vec![0xFF; 8], k(0))])
            .unwrap();
        assert_eq!(node.find_slot(&[0x80; 8]).unwrap(), Err(1));
    }
}
