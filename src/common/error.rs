//! Error types for the block tree.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in the crate.
///
/// Storage errors (I/O, bad block ids, an exhausted buffer cache) and tree
/// errors share one enum so that `?` works across every layer.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested block does not exist in the backing store.
    #[error("Block {0} not found")]
    BlockNotFound(u64),

    /// The block id can't be used for the requested purpose.
    #[error("Invalid block ID: {0}")]
    InvalidBlockId(u64),

    /// Every buffer cache slot is pinned, so nothing can be evicted.
    #[error("No free frames available in buffer cache")]
    NoFreeFrames,

    /// Key absent on lookup or update.
    #[error("Key not found")]
    KeyNotFound,

    /// Insert of a key that is already present.
    #[error("Duplicate key")]
    DuplicateKey,

    /// The free list is exhausted.
    #[error("Out of space: no free blocks left")]
    OutOfSpace,

    /// A block's contents are impossible for its position, or an allocator
    /// consistency check failed. The whole operation is aborted.
    #[error("Corrupt tree: {0}")]
    Corrupt(String),

    /// A sanity check found a violated tree invariant.
    #[error("Inconsistent tree: {0}")]
    Inconsistent(String),

    /// Slot access outside a node's bounds.
    #[error("Slot index {index} out of range (limit {limit})")]
    IndexInvalid { index: usize, limit: usize },

    /// A key or value of the wrong width was passed in.
    #[error("{what} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Tree sizing can't work with the store it is attached to.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not supported (delete).
    #[error("Operation not implemented")]
    Unimplemented,
}

impl Error {
    /// Shorthand for building a [`Error::Corrupt`].
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Shorthand for building an [`Error::Inconsistent`].
    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        Error::Inconsistent(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BlockNotFound(42);
        assert_eq!(format!("{}", err), "Block 42 not found");

        let err = Error::IndexInvalid { index: 5, limit: 4 };
        assert_eq!(format!("{}", err), "Slot index 5 out of range (limit 4)");

        let err = Error::SizeMismatch {
            what: "key",
            expected: 8,
            actual: 3,
        };
        assert_eq!(format!("{}", err), "key is 3 bytes, expected 8");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::from(io_err);
        assert!(err.source().is_some());
        assert!(Error::KeyNotFound.source().is_none());
    }
}
