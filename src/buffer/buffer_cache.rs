//! Buffer Cache - the block caching layer between the tree and disk.
//!
//! The [`BufferCache`] keeps a fixed pool of slots, each holding one block
//! read from a [`DiskManager`]. Blocks are evicted in the order they were
//! loaded, skipping pinned ones, and dirty blocks are written back on
//! eviction and on flush. It implements [`BlockStore`] so a tree can be
//! attached to it directly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::buffer::{BlockReadGuard, BlockWriteGuard, CacheStats};
use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::{BlockStore, DiskManager};

/// One entry of the pool.
struct Slot {
    data: RwLock<Block>,
    pins: AtomicU32,
    dirty: AtomicBool,
}

impl Slot {
    fn new(block_size: usize) -> Self {
        Self {
            data: RwLock::new(Block::new(block_size)),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    fn pin(&self) {
        self.pins.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }
}

/// Which block each slot holds.
struct Residency {
    table: HashMap<BlockId, usize>,
    /// Occupied slots and their blocks, oldest load first.
    loaded: VecDeque<(usize, BlockId)>,
    /// Slots holding nothing.
    free: Vec<usize>,
}

/// Caches blocks of a [`DiskManager`] in a fixed pool of slots.
///
/// The cache never grows or shrinks the file: the block count is fixed by
/// the disk manager, and the tree keeps its own free list inside it.
///
/// # Thread Safety
/// Pins only rise while `residency` is held, so a slot seen unpinned
/// under its write lock can be evicted. Misses hold that write lock for
/// the whole load, which also keeps two threads from loading one block
/// twice. Unpinning takes no lock.
pub struct BufferCache {
    slots: Vec<Slot>,
    residency: RwLock<Residency>,
    disk_manager: Mutex<DiskManager>,
    stats: CacheStats,

    /// Copied out of the disk manager so the hot path needs no lock.
    block_size: usize,
    block_count: u64,
}

impl BufferCache {
    /// Create a new buffer cache with `pool_size` slots.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let block_size = disk_manager.block_size();
        let block_count = disk_manager.block_count();

        Self {
            slots: (0..pool_size).map(|_| Slot::new(block_size)).collect(),
            residency: RwLock::new(Residency {
                table: HashMap::with_capacity(pool_size),
                loaded: VecDeque::with_capacity(pool_size),
                free: (0..pool_size).rev().collect(),
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: CacheStats::new(),
            block_size,
            block_count,
        }
    }

    // ========================================================================
    // Public API: Fetch blocks
    // ========================================================================

    /// Fetch a block for reading (shared access).
    ///
    /// # Errors
    /// - `Error::BlockNotFound` if the block doesn't exist on disk
    /// - `Error::NoFreeFrames` if every slot is pinned
    pub fn fetch_block_read(&self, block_id: BlockId) -> Result<BlockReadGuard<'_>> {
        let slot = self.fetch_pinned(block_id)?;
        let lock = self.slots[slot].data.read();

        Ok(BlockReadGuard::new(self, slot, block_id, lock))
    }

    /// Fetch a block for writing (exclusive access).
    ///
    /// The block is marked dirty when the guard drops.
    pub fn fetch_block_write(&self, block_id: BlockId) -> Result<BlockWriteGuard<'_>> {
        let slot = self.fetch_pinned(block_id)?;
        let lock = self.slots[slot].data.write();

        Ok(BlockWriteGuard::new(self, slot, block_id, lock))
    }

    // ========================================================================
    // Public API: Flush blocks
    // ========================================================================

    /// Write `block_id` back to disk if it is cached and dirty.
    pub fn flush_block(&self, block_id: BlockId) -> Result<()> {
        let slot = {
            let residency = self.residency.read();
            match residency.table.get(&block_id) {
                Some(&slot) => {
                    self.slots[slot].pin();
                    slot
                }
                None => return Ok(()),
            }
        };

        let result = self.write_back(slot, block_id);
        self.unpin(slot, false);
        result
    }

    /// Write every dirty cached block back to disk.
    pub fn flush_all(&self) -> Result<()> {
        // Pinned so nothing is evicted while the lock is released.
        let cached: Vec<(usize, BlockId)> = {
            let residency = self.residency.read();
            residency
                .loaded
                .iter()
                .inspect(|&&(slot, _)| self.slots[slot].pin())
                .copied()
                .collect()
        };

        let mut result = Ok(());
        for &(slot, block_id) in &cached {
            if result.is_ok() {
                result = self.write_back(slot, block_id);
            }
            self.unpin(slot, false);
        }

        tracing::debug!(
            cached = cached.len(),
            written = self.stats.blocks_written.load(Ordering::Relaxed),
            "flushed cache"
        );
        result
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of slots in the pool.
    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding no block.
    pub fn free_slot_count(&self) -> usize {
        self.residency.read().free.len()
    }

    /// Number of blocks currently cached.
    pub fn cached_block_count(&self) -> usize {
        self.residency.read().table.len()
    }

    /// Pin count of a cached block, or `None` if it isn't cached.
    pub fn pin_count(&self, block_id: BlockId) -> Option<u32> {
        let residency = self.residency.read();
        residency
            .table
            .get(&block_id)
            .map(|&slot| self.slots[slot].pins.load(Ordering::Acquire))
    }

    /// Release one pin on `slot`. Called by the guards on drop.
    pub(crate) fn unpin(&self, slot: usize, dirty: bool) {
        let slot = &self.slots[slot];
        if dirty {
            slot.dirty.store(true, Ordering::Release);
        }
        let before = slot.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "pin count underflow");
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Return the slot holding `block_id`, pinned, loading it on a miss.
    fn fetch_pinned(&self, block_id: BlockId) -> Result<usize> {
        {
            let residency = self.residency.read();
            if let Some(&slot) = residency.table.get(&block_id) {
                self.slots[slot].pin();
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(slot);
            }
        }

        if block_id.0 >= self.block_count {
            return Err(Error::BlockNotFound(block_id.0));
        }

        let mut residency = self.residency.write();

        // Loaded by another thread between the two locks
        if let Some(&slot) = residency.table.get(&block_id) {
            self.slots[slot].pin();
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(slot);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let slot = self.take_slot(&mut residency)?;

        let data = match self.disk_manager.lock().read_block(block_id) {
            Ok(data) => data,
            Err(e) => {
                residency.free.push(slot);
                return Err(e);
            }
        };
        self.stats.blocks_read.fetch_add(1, Ordering::Relaxed);

        let entry = &self.slots[slot];
        entry
            .data
            .write()
            .as_mut_slice()
            .copy_from_slice(data.as_slice());
        entry.dirty.store(false, Ordering::Release);
        entry.pin();

        residency.table.insert(block_id, slot);
        residency.loaded.push_back((slot, block_id));
        tracing::trace!(block = block_id.0, slot, "loaded block");

        Ok(slot)
    }

    /// Pop a free slot, or evict the oldest unpinned block.
    ///
    /// A victim whose write-back fails stays cached.
    fn take_slot(&self, residency: &mut Residency) -> Result<usize> {
        if let Some(slot) = residency.free.pop() {
            return Ok(slot);
        }

        let pos = residency
            .loaded
            .iter()
            .position(|&(slot, _)| !self.slots[slot].is_pinned())
            .ok_or(Error::NoFreeFrames)?;
        let (slot, victim) = residency.loaded[pos];

        self.write_back(slot, victim)?;
        residency.loaded.remove(pos);
        residency.table.remove(&victim);

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(block = victim.0, slot, "evicted block");
        Ok(slot)
    }

    /// Write `slot` to `block_id` on disk if it is dirty.
    fn write_back(&self, slot: usize, block_id: BlockId) -> Result<()> {
        let entry = &self.slots[slot];
        if !entry.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let data = entry.data.read();
        if let Err(e) = self.disk_manager.lock().write_block(block_id, &data) {
            entry.dirty.store(true, Ordering::Release);
            return Err(e);
        }

        self.stats.blocks_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl BlockStore for BufferCache {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        let guard = self.fetch_block_read(block_id)?;
        Ok(Block::from_slice(guard.as_slice()))
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }
        let mut guard = self.fetch_block_write(block_id)?;
        guard.as_mut_slice().copy_from_slice(block.as_slice());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flush_all()
    }

    fn notify_allocated(&self, block_id: BlockId) {
        self.stats.blocks_allocated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(block = block_id.0, "block allocated");
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        self.stats.blocks_deallocated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(block = block_id.0, "block deallocated");
    }
}
