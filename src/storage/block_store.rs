//! The block store contract.

use std::sync::Arc;

use crate::common::{BlockId, Result};
use crate::storage::block::Block;

/// Fixed-size block storage used by the tree.
///
/// Implementations take `&self` and synchronize internally, the same way
/// the buffer cache does. The tree never assumes any caching or batching
/// beyond what the store itself provides.
pub trait BlockStore {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Number of addressable blocks.
    fn block_count(&self) -> u64;

    /// Read a copy of block `block_id`.
    fn read_block(&self, block_id: BlockId) -> Result<Block>;

    /// Overwrite block `block_id` with `block`.
    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()>;

    /// Make every completed write durable. Stores without a write-back
    /// layer have nothing to do.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Advisory hook: `block_id` was taken off the free list.
    fn notify_allocated(&self, _block_id: BlockId) {}

    /// Advisory hook: `block_id` was returned to the free list.
    fn notify_deallocated(&self, _block_id: BlockId) {}
}

impl<S: BlockStore + ?Sized> BlockStore for &S {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn block_count(&self) -> u64 {
        (**self).block_count()
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        (**self).read_block(block_id)
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        (**self).write_block(block_id, block)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn notify_allocated(&self, block_id: BlockId) {
        (**self).notify_allocated(block_id)
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        (**self).notify_deallocated(block_id)
    }
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn block_count(&self) -> u64 {
        (**self).block_count()
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        (**self).read_block(block_id)
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        (**self).write_block(block_id, block)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn notify_allocated(&self, block_id: BlockId) {
        (**self).notify_allocated(block_id)
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        (**self).notify_deallocated(block_id)
    }
}
