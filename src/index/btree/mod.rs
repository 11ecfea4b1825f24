//! Disk-block B+tree.
//!
//! # Structure
//! ```text
//! block 0   superblock: sizes, root address, free-list head, key count
//! block 1   root: a Leaf until the first split, a Root node afterwards
//! ...       Interior and Leaf nodes, and Unallocated blocks on the free list
//! ```
//!
//! Keys and values have fixed widths chosen at creation and compare as
//! unsigned byte strings. Keys are unique; the tree only grows.
//!
//! # Modules
//! - `node` - block codec and slot accessors
//! - `allocator` - superblock and free list
//! - `search` - descent, lookup, update
//! - `insert` - insertion and node splits
//! - `display` - text, DOT and sorted-pair renderings
//! - `sanity` - structural verification

mod allocator;
mod display;
mod insert;
pub mod node;
mod sanity;
mod search;
mod tree;

pub use display::DisplayFormat;
pub use node::{Node, NodeLayout};
pub use sanity::SanityReport;
pub use tree::{AttachMode, BTreeIndex};
