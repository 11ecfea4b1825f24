//! Buffer cache tests.
//!
//! Exercise the cache through its guard API and through the `BlockStore`
//! interface the tree uses.

use blocktree::buffer::BufferCache;
use blocktree::storage::{BlockStore, DiskManager};
use blocktree::{Block, BlockId, Error};
use tempfile::tempdir;

const BLOCK: usize = 128;
const SLOTS: usize = 10;

fn create_cache(pool_size: usize, blocks: u64) -> (BufferCache, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path, BLOCK, blocks).unwrap();
    (BufferCache::new(pool_size, dm), dir)
}

/// Helper to write a string to block data.
fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0;
}

/// Helper to read a null-terminated string from block data.
fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

// ============================================================================
// Guards
// ============================================================================

#[test]
fn test_very_basic() {
    let (cache, _dir) = create_cache(SLOTS, 8);
    let bid = BlockId::new(3);

    {
        let mut guard = cache.fetch_block_write(bid).unwrap();
        copy_string(guard.as_mut_slice(), "Hello, world!");
        assert_eq!(read_string(guard.as_slice()), "Hello, world!");
    }

    let guard = cache.fetch_block_read(bid).unwrap();
    assert_eq!(read_string(guard.as_slice()), "Hello, world!");
}

#[test]
fn test_pin_counts_follow_guards() {
    let (cache, _dir) = create_cache(SLOTS, 8);
    let bid = BlockId::new(1);

    assert_eq!(cache.pin_count(bid), None);

    {
        let _a = cache.fetch_block_read(bid).unwrap();
        let _b = cache.fetch_block_read(bid).unwrap();
        assert_eq!(cache.pin_count(bid), Some(2));
    }

    assert_eq!(cache.pin_count(bid), Some(0));
}

#[test]
fn test_block_past_end_is_not_found() {
    let (cache, _dir) = create_cache(SLOTS, 4);

    assert!(matches!(
        cache.fetch_block_read(BlockId::new(4)),
        Err(Error::BlockNotFound(4))
    ));
    assert_eq!(cache.free_slot_count(), SLOTS);
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn test_all_slots_pinned() {
    let (cache, _dir) = create_cache(3, 8);

    let _g0 = cache.fetch_block_read(BlockId::new(0)).unwrap();
    let _g1 = cache.fetch_block_read(BlockId::new(1)).unwrap();
    let _g2 = cache.fetch_block_read(BlockId::new(2)).unwrap();

    assert!(matches!(
        cache.fetch_block_read(BlockId::new(3)),
        Err(Error::NoFreeFrames)
    ));
}

#[test]
fn test_eviction_skips_pinned_blocks() {
    let (cache, _dir) = create_cache(2, 8);

    let pinned = cache.fetch_block_read(BlockId::new(0)).unwrap();
    for i in 1..6 {
        let _g = cache.fetch_block_read(BlockId::new(i)).unwrap();
    }

    assert_eq!(pinned.block_id(), BlockId::new(0));
    assert_eq!(cache.pin_count(BlockId::new(0)), Some(1));
    assert_eq!(cache.stats().snapshot().evictions, 4);
}

#[test]
fn test_dirty_block_survives_eviction() {
    let (cache, _dir) = create_cache(2, 8);

    for i in 0u8..6 {
        let mut guard = cache.fetch_block_write(BlockId::new(i as u64)).unwrap();
        guard.as_mut_slice()[0] = i + 1;
        guard.as_mut_slice()[BLOCK - 1] = i.wrapping_mul(7);
    }

    for i in 0u8..6 {
        let guard = cache.fetch_block_read(BlockId::new(i as u64)).unwrap();
        assert_eq!(guard.as_slice()[0], i + 1);
        assert_eq!(guard.as_slice()[BLOCK - 1], i.wrapping_mul(7));
    }

    assert!(cache.stats().snapshot().blocks_written >= 4);
}

// ============================================================================
// BlockStore interface
// ============================================================================

#[test]
fn test_block_store_roundtrip() {
    let (cache, _dir) = create_cache(SLOTS, 8);
    assert_eq!(cache.block_size(), BLOCK);
    assert_eq!(cache.block_count(), 8);

    let mut block = Block::new(BLOCK);
    block.as_mut_slice()[10] = 0xAA;
    cache.write_block(BlockId::new(5), &block).unwrap();

    let read = cache.read_block(BlockId::new(5)).unwrap();
    assert_eq!(read.as_slice(), block.as_slice());
    assert_eq!(cache.pin_count(BlockId::new(5)), Some(0));
}

#[test]
fn test_block_store_rejects_wrong_size() {
    let (cache, _dir) = create_cache(SLOTS, 8);

    let result = cache.write_block(BlockId::new(1), &Block::new(BLOCK / 2));
    assert!(matches!(
        result,
        Err(Error::SizeMismatch {
            what: "block",
            expected: BLOCK,
            actual: 64
        })
    ));
}

#[test]
fn test_flush_persists_to_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let cache = BufferCache::new(SLOTS, DiskManager::create(&path, BLOCK, 4).unwrap());
        let mut guard = cache.fetch_block_write(BlockId::new(2)).unwrap();
        copy_string(guard.as_mut_slice(), "persistent!");
        drop(guard);
        BlockStore::flush(&cache).unwrap();
    }

    let mut dm = DiskManager::open(&path, BLOCK).unwrap();
    let block = dm.read_block(BlockId::new(2)).unwrap();
    assert_eq!(read_string(block.as_slice()), "persistent!");
}

#[test]
fn test_allocation_notifications_counted() {
    let (cache, _dir) = create_cache(SLOTS, 8);

    cache.notify_allocated(BlockId::new(2));
    cache.notify_allocated(BlockId::new(3));
    cache.notify_deallocated(BlockId::new(2));

    let snapshot = cache.stats().snapshot();
    assert_eq!(snapshot.blocks_allocated, 2);
    assert_eq!(snapshot.blocks_deallocated, 1);
    assert_eq!(snapshot.net_allocated(), 1);
}
