//! Configuration constants and tree sizing.

use super::error::{Error, Result};

/// Default size of a block in bytes (4KB).
///
/// Matches the OS page size on most systems. Stores may use any block size
/// large enough to hold a node header plus two slots of each node kind.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Width of an on-disk child pointer / free-list link (a `u64` block id).
pub const POINTER_SIZE: usize = 8;

/// Smallest number of slots a node may have.
///
/// A split of a full node must leave at least one entry on each side, and
/// an interior split must leave one key on each side of the promoted one.
pub const MIN_NODE_CAPACITY: usize = 2;

/// Sizing of one tree, fixed when the tree is created.
///
/// # Example
/// ```
/// use blocktree::BTreeConfig;
///
/// let config = BTreeConfig::new(8, 16);
/// assert!(config.validate().is_ok());
/// assert!(BTreeConfig::new(0, 16).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeConfig {
    /// Width of every key in bytes.
    pub key_size: usize,
    /// Width of every value in bytes.
    pub value_size: usize,
}

impl BTreeConfig {
    /// Create a config for the given key and value widths.
    pub fn new(key_size: usize, value_size: usize) -> Self {
        Self {
            key_size,
            value_size,
        }
    }

    /// Reject widths that can't be stored in a node header.
    pub fn validate(&self) -> Result<()> {
        if self.key_size == 0 {
            return Err(Error::InvalidConfig("key_size must be > 0".into()));
        }
        if self.value_size == 0 {
            return Err(Error::InvalidConfig("value_size must be > 0".into()));
        }
        if u32::try_from(self.key_size).is_err() || u32::try_from(self.value_size).is_err() {
            return Err(Error::InvalidConfig(
                "key_size and value_size must fit in 32 bits".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BTreeConfig {
    /// 8-byte keys and values, enough for big-endian `u64` pairs.
    fn default() -> Self {
        Self::new(8, 8)
    }
}
