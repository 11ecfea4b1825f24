//! Index structures stored in fixed-size blocks.

pub mod btree;

pub use btree::{AttachMode, BTreeIndex, DisplayFormat, SanityReport};
