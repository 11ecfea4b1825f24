//! Storage layer - block stores and block formats.
//!
//! This module handles persistent storage:
//! - [`BlockStore`] - The contract the tree needs from its backing store
//! - [`MemoryStore`] - A volatile store backed by a `Vec` of blocks
//! - [`DiskManager`] - Low-level file I/O
//! - [`block`] - Block buffers and the node header layout

pub mod block;
mod block_store;
mod disk_manager;
mod memory_store;

pub use block_store::BlockStore;
pub use disk_manager::DiskManager;
pub use memory_store::MemoryStore;
