//! Block buffers and the node header layout.
//!
//! This module contains:
//! - [`Block`] - The raw fixed-size data container
//! - [`NodeHeader`] - Metadata at the start of every tree block
//! - [`NodeType`] - Discriminator for the different block kinds

#[allow(clippy::module_inception)]
mod block;
pub(crate) mod node_header;

pub use block::Block;
pub use node_header::{NodeHeader, NodeType};
