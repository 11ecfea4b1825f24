//! In-memory block store.

use std::collections::HashSet;

use parking_lot::{Mutex, RwLock};

use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::BlockStore;

/// A volatile [`BlockStore`] holding every block in memory.
///
/// Useful for tests and for trees that never need to outlive the process.
/// Allocation notifications are recorded so callers can check the tree's
/// bookkeeping against the store's.
///
/// # Example
/// ```
/// use blocktree::storage::{BlockStore, MemoryStore};
/// use blocktree::BlockId;
///
/// let store = MemoryStore::new(512, 16);
/// let mut block = store.read_block(BlockId::new(3)).unwrap();
/// block.as_mut_slice()[0] = 7;
/// store.write_block(BlockId::new(3), &block).unwrap();
/// assert_eq!(store.read_block(BlockId::new(3)).unwrap().as_slice()[0], 7);
/// ```
pub struct MemoryStore {
    block_size: usize,
    blocks: RwLock<Vec<Block>>,
    /// Blocks the tree has announced as allocated.
    allocated: Mutex<HashSet<BlockId>>,
}

impl MemoryStore {
    /// Create a store of `block_count` zeroed blocks of `block_size` bytes.
    pub fn new(block_size: usize, block_count: u64) -> Self {
        let blocks = (0..block_count).map(|_| Block::new(block_size)).collect();
        Self {
            block_size,
            blocks: RwLock::new(blocks),
            allocated: Mutex::new(HashSet::new()),
        }
    }

    /// Whether the tree announced `block_id` as allocated and not yet freed.
    pub fn is_allocated(&self, block_id: BlockId) -> bool {
        self.allocated.lock().contains(&block_id)
    }

    /// Number of blocks currently announced as allocated.
    pub fn allocated_count(&self) -> usize {
        self.allocated.lock().len()
    }

    fn index(&self, block_id: BlockId, len: usize) -> Result<usize> {
        usize::try_from(block_id.0)
            .ok()
            .filter(|&i| i < len)
            .ok_or(Error::BlockNotFound(block_id.0))
    }
}

impl BlockStore for MemoryStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.blocks.read().len() as u64
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        let blocks = self.blocks.read();
        let i = self.index(block_id, blocks.len())?;
        Ok(Block::from_slice(blocks[i].as_slice()))
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }
        let mut blocks = self.blocks.write();
        let i = self.index(block_id, blocks.len())?;
        blocks[i].as_mut_slice().copy_from_slice(block.as_slice());
        Ok(())
    }

    fn notify_allocated(&self, block_id: BlockId) {
        self.allocated.lock().insert(block_id);
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        self.allocated.lock().remove(&block_id);
    }
}
