//! blocktree - a B+tree of fixed-width keys and values stored in
//! fixed-size blocks.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Index Layer (index/btree/)                      │
//! │      BTreeIndex: descent, insert + split, display, sanity       │
//! │      Node codec + superblock + free-list allocator              │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ↓  BlockStore
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │   Buffer Cache (buffer/)     │  │   MemoryStore (storage/)     │
//! │   slots, load-order eviction │  │   volatile blocks            │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Storage Layer (storage/)                              │
//! │     DiskManager + Block + NodeHeader                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, Error, config)
//! - [`storage`] - Block stores, disk I/O and block formats
//! - [`buffer`] - Buffer cache over a disk file
//! - [`index`] - The B+tree
//!
//! # Quick Start
//! ```no_run
//! use blocktree::{BTreeConfig, BTreeIndex, BufferCache, DiskManager};
//!
//! let dm = DiskManager::create("tree.db", 4096, 1024).unwrap();
//! let cache = BufferCache::new(64, dm);
//! let mut tree = BTreeIndex::create(cache, BTreeConfig::new(8, 8)).unwrap();
//!
//! tree.insert(&1u64.to_be_bytes(), &42u64.to_be_bytes()).unwrap();
//! let cache = tree.detach().unwrap();
//! # drop(cache);
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::DEFAULT_BLOCK_SIZE;
pub use common::{BTreeConfig, BlockId, Error, Result};

pub use buffer::{BufferCache, CacheStats, StatsSnapshot};
pub use index::{AttachMode, BTreeIndex, DisplayFormat, SanityReport};
pub use storage::block::{Block, NodeHeader, NodeType};
pub use storage::{BlockStore, DiskManager, MemoryStore};
