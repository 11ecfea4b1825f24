//! Block identifier type.

use std::fmt;

/// Identifies a fixed-size block in the backing store.
///
/// Block ids are plain indices into the store's address space; they carry
/// no ownership of their own. Address 0 holds the superblock and address 1
/// holds the root node. Because nothing ever links *to* the superblock,
/// address 0 also terminates the free list.
///
/// # Example
/// ```
/// use blocktree::BlockId;
///
/// let id = BlockId::new(42);
/// assert!(!id.is_null());
/// assert_eq!(id.0, 42);
/// assert!(BlockId::NULL.is_null());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Address of the superblock.
    pub const SUPERBLOCK: BlockId = BlockId(0);

    /// Free-list terminator ("no block"). Shares the superblock's address.
    pub const NULL: BlockId = BlockId(0);

    /// Create a new BlockId.
    #[inline]
    pub fn new(id: u64) -> Self {
        BlockId(id)
    }

    /// Check if this id is the free-list terminator.
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The block immediately after this one.
    #[inline]
    pub fn next(&self) -> BlockId {
        BlockId(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_new() {
        let id = BlockId::new(42);
        assert_eq!(id.0, 42);
        assert!(!id.is_null());
    }

    #[test]
    fn test_block_id_null_is_superblock() {
        assert!(BlockId::NULL.is_null());
        assert_eq!(BlockId::NULL, BlockId::SUPERBLOCK);
    }

    #[test]
    fn test_block_id_ordering() {
        assert!(BlockId::new(1) < BlockId::new(2));
        assert_eq!(BlockId::new(1).next(), BlockId::new(2));
    }

    #[test]
    fn test_block_id_display() {
        assert_eq!(format!("{}", BlockId::new(42)), "42");
    }
}
