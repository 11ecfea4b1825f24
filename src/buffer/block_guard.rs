//! RAII guards for block access.
//!
//! These guards provide safe access to blocks in the buffer cache:
//! - [`BlockReadGuard`] - Shared read access (multiple allowed)
//! - [`BlockWriteGuard`] - Exclusive write access (auto-marks dirty)
//!
//! Both guards auto-unpin the block when dropped.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::BlockId;
use crate::storage::block::Block;

use super::buffer_cache::BufferCache;

/// Guard for read-only block access.
///
/// The block is automatically unpinned when the guard is dropped.
pub struct BlockReadGuard<'a> {
    cache: &'a BufferCache,
    slot: usize,
    block_id: BlockId,
    lock: RwLockReadGuard<'a, Block>,
}

impl<'a> BlockReadGuard<'a> {
    pub(crate) fn new(
        cache: &'a BufferCache,
        slot: usize,
        block_id: BlockId,
        lock: RwLockReadGuard<'a, Block>,
    ) -> Self {
        Self {
            cache,
            slot,
            block_id,
            lock,
        }
    }

    /// Get the block id.
    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

impl Deref for BlockReadGuard<'_> {
    type Target = Block;

    #[inline]
    fn deref(&self) -> &Block {
        &self.lock
    }
}

impl Drop for BlockReadGuard<'_> {
    fn drop(&mut self) {
        self.cache.unpin(self.slot, false);
    }
}

/// Guard for exclusive write access to a block.
///
/// The block is marked dirty and unpinned when the guard is dropped.
pub struct BlockWriteGuard<'a> {
    cache: &'a BufferCache,
    slot: usize,
    block_id: BlockId,
    lock: RwLockWriteGuard<'a, Block>,
}

impl<'a> BlockWriteGuard<'a> {
    pub(crate) fn new(
        cache: &'a BufferCache,
        slot: usize,
        block_id: BlockId,
        lock: RwLockWriteGuard<'a, Block>,
    ) -> Self {
        Self {
            cache,
            slot,
            block_id,
            lock,
        }
    }

    /// Get the block id.
    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

impl Deref for BlockWriteGuard<'_> {
    type Target = Block;

    #[inline]
    fn deref(&self) -> &Block {
        &self.lock
    }
}

impl DerefMut for BlockWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.lock
    }
}

impl Drop for BlockWriteGuard<'_> {
    fn drop(&mut self) {
        self.cache.unpin(self.slot, true);
    }
}
