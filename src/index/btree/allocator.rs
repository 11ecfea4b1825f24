//! Superblock and free-list block allocator.
//!
//! Free blocks are tagged `Unallocated` and chained through the header's
//! `free_list` field; the superblock holds the head. Allocation pops the
//! head and deallocation pushes onto it, so a freed block is the next one
//! handed out.

use crate::common::{BlockId, Error, Result};
use crate::storage::block::{Block, NodeHeader, NodeType};
use crate::storage::BlockStore;

use super::node::{Node, NodeLayout};
use super::tree::BTreeIndex;

/// Decoded superblock (block 0).
///
/// The header's `num_keys` field carries the tree's total key count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Superblock {
    pub key_size: usize,
    pub value_size: usize,
    pub block_size: usize,
    pub root: BlockId,
    pub free_list: BlockId,
    pub key_count: u64,
}

impl Superblock {
    pub fn new(layout: NodeLayout, root: BlockId, free_list: BlockId) -> Self {
        Self {
            key_size: layout.key_size,
            value_size: layout.value_size,
            block_size: layout.block_size,
            root,
            free_list,
            key_count: 0,
        }
    }

    /// Parse and validate a superblock.
    ///
    /// # Errors
    /// `Corrupt` if the block is not a superblock or its checksum is wrong.
    pub fn decode(block: &Block) -> Result<Self> {
        if block.len() < NodeHeader::SIZE {
            return Err(Error::corrupt(format!(
                "block of {} bytes can't hold a superblock",
                block.len()
            )));
        }

        let header = block.header();
        if !header.verify_checksum(block.as_slice()) {
            return Err(Error::corrupt("superblock checksum mismatch"));
        }
        if header.node_type() != Some(NodeType::Superblock) {
            return Err(Error::corrupt(format!(
                "block 0 has tag {}, expected a superblock",
                header.tag
            )));
        }

        Ok(Self {
            key_size: header.key_size as usize,
            value_size: header.value_size as usize,
            block_size: header.block_size as usize,
            root: header.root,
            free_list: header.free_list,
            key_count: header.num_keys,
        })
    }

    pub fn encode(&self) -> Block {
        let mut header = NodeHeader::new(NodeType::Superblock);
        header.num_keys = self.key_count;
        header.key_size = self.key_size as u32;
        header.value_size = self.value_size as u32;
        header.block_size = self.block_size as u32;
        header.root = self.root;
        header.free_list = self.free_list;

        let mut block = Block::new(self.block_size);
        block.set_header(&header);
        block.update_checksum();
        block
    }
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Write the in-memory superblock to its block.
    pub(super) fn write_superblock(&self) -> Result<()> {
        self.store
            .write_block(self.superblock_id, &self.superblock.encode())
    }

    /// Pop a block off the free list.
    ///
    /// The returned block still carries its `Unallocated` tag; the caller
    /// is expected to write a node to it.
    ///
    /// # Errors
    /// `OutOfSpace` when the list is empty, `Corrupt` if the head is not a
    /// free block.
    pub(super) fn allocate(&mut self) -> Result<BlockId> {
        let head = self.superblock.free_list;
        if head.is_null() {
            return Err(Error::OutOfSpace);
        }

        let node = self.read_linked(head)?;
        if node.node_type() != NodeType::Unallocated {
            return Err(Error::corrupt(format!(
                "free-list head {} is a {:?} node",
                head,
                node.node_type()
            )));
        }

        self.superblock.free_list = node.next_free();
        self.write_superblock()?;
        self.store.notify_allocated(head);

        tracing::debug!(block = %head, next_free = %self.superblock.free_list, "allocated block");
        Ok(head)
    }

    /// Push `block_id` onto the free list.
    ///
    /// # Errors
    /// `Corrupt` for the superblock, the root, or a block that is already
    /// free.
    pub(super) fn deallocate(&mut self, block_id: BlockId) -> Result<()> {
        if block_id == self.superblock_id || block_id == self.superblock.root {
            return Err(Error::corrupt(format!(
                "refusing to free reserved block {}",
                block_id
            )));
        }

        let node = self.read_node(block_id)?;
        if node.node_type() == NodeType::Unallocated {
            return Err(Error::corrupt(format!("double free of block {}", block_id)));
        }

        let mut free = Node::new(NodeType::Unallocated, self.layout);
        free.set_next_free(self.superblock.free_list);
        self.write_node(block_id, &mut free)?;

        self.superblock.free_list = block_id;
        self.write_superblock()?;
        self.store.notify_deallocated(block_id);

        tracing::debug!(block = %block_id, "deallocated block");
        Ok(())
    }

    /// Check that at least `needed` blocks are on the free list.
    pub(super) fn ensure_free(&self, needed: usize) -> Result<()> {
        let mut current = self.superblock.free_list;
        for _ in 0..needed {
            if current.is_null() {
                return Err(Error::OutOfSpace);
            }
            current = self.read_linked(current)?.next_free();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BTreeConfig;
    use crate::storage::MemoryStore;

    fn tree(store: &MemoryStore) -> BTreeIndex<&MemoryStore> {
        BTreeIndex::create(store, BTreeConfig::new(8, 8)).unwrap()
    }

    fn occupy(tree: &BTreeIndex<&MemoryStore>, id: BlockId) {
        let mut leaf = Node::new(NodeType::Leaf, tree.layout);
        tree.write_node(id, &mut leaf).unwrap();
    }

    #[test]
    fn test_superblock_roundtrip() {
        let layout = NodeLayout::new(&BTreeConfig::new(8, 8), 256).unwrap();
        let mut sb = Superblock::new(layout, BlockId(1), BlockId(5));
        sb.key_count = 42;

        assert_eq!(Superblock::decode(&sb.encode()).unwrap(), sb);
    }

    #[test]
    fn test_superblock_rejects_wrong_tag() {
        let layout = NodeLayout::new(&BTreeConfig::new(8, 8), 256).unwrap();
        let block = Node::new(NodeType::Leaf, layout).into_block();
        assert!(matches!(Superblock::decode(&block), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_allocate_in_ascending_order() {
        let store = MemoryStore::new(256, 6);
        let mut tree = tree(&store);

        assert_eq!(tree.allocate().unwrap(), BlockId(2));
        assert_eq!(tree.allocate().unwrap(), BlockId(3));
        assert!(store.is_allocated(BlockId(3)));
    }

    #[test]
    fn test_deallocate_is_lifo() {
        let store = MemoryStore::new(256, 6);
        let mut tree = tree(&store);

        let a = tree.allocate().unwrap();
        let b = tree.allocate().unwrap();
        occupy(&tree, a);
        occupy(&tree, b);

        tree.deallocate(a).unwrap();
        assert!(!store.is_allocated(a));
        assert_eq!(tree.allocate().unwrap(), a);
        assert_eq!(tree.allocate().unwrap(), BlockId(4));
    }

    #[test]
    fn test_allocate_exhausts_store() {
        let store = MemoryStore::new(256, 4);
        let mut tree = tree(&store);

        tree.allocate().unwrap();
        tree.allocate().unwrap();
        assert!(matches!(tree.allocate(), Err(Error::OutOfSpace)));
    }

    #[test]
    fn test_deallocate_rejects_reserved_and_free_blocks() {
        let store = MemoryStore::new(256, 6);
        let mut tree = tree(&store);

        assert!(matches!(tree.deallocate(BlockId(0)), Err(Error::Corrupt(_))));
        assert!(matches!(tree.deallocate(BlockId(1)), Err(Error::Corrupt(_))));
        assert!(matches!(tree.deallocate(BlockId(5)), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_allocator_state_survives_reopen() {
        let store = MemoryStore::new(256, 8);
        let mut tree = tree(&store);
        let a = tree.allocate().unwrap();
        occupy(&tree, a);
        tree.deallocate(a).unwrap();
        drop(tree);

        let mut tree = BTreeIndex::open(&store).unwrap();
        assert_eq!(tree.allocate().unwrap(), a);
    }

    #[test]
    fn test_ensure_free() {
        let store = MemoryStore::new(256, 5);
        let tree = tree(&store);

        assert!(tree.ensure_free(3).is_ok());
        assert!(matches!(tree.ensure_free(4), Err(Error::OutOfSpace)));
    }
}
