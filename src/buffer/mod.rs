//! Buffer cache management.
//!
//! The buffer cache is the in-memory layer between the tree and disk. It
//! manages a fixed pool of slots, each holding one block.
//!
//! # Components
//! - [`BufferCache`] - The block cache, usable as a [`BlockStore`](crate::storage::BlockStore)
//! - [`BlockReadGuard`] / [`BlockWriteGuard`] - RAII guards for block access
//! - [`CacheStats`] - Performance statistics

mod block_guard;
mod buffer_cache;
mod stats;

pub use block_guard::{BlockReadGuard, BlockWriteGuard};
pub use buffer_cache::BufferCache;
pub use stats::{CacheStats, StatsSnapshot};
