//! Disk Manager - low-level file I/O for tree blocks.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing blocks
//! - Sizing the database file to a fixed block count
//! - Managing the database file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with blocks laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │ Block 2 │  ...    │ Block N │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0        B        2B     ...      N×B
/// ```
///
/// Block N is located at file offset `N × block_size`. The file is sized
/// once at creation; the tree manages free space inside it.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The [`BufferCache`] is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// All writes are followed by `fsync()`.
///
/// [`BufferCache`]: crate::buffer::BufferCache
pub struct DiskManager {
    file: File,
    block_size: usize,
    /// Number of blocks in the file.
    block_count: u64,
}

impl DiskManager {
    /// Create a new database file holding `block_count` zeroed blocks.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize, block_count: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        // Zero-filled (sparse where supported)
        file.set_len(block_count * block_size as u64)?;
        file.sync_all()?;

        Ok(Self {
            file,
            block_size,
            block_count,
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// length isn't a whole number of blocks.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % block_size as u64 != 0 {
            return Err(Error::InvalidConfig(format!(
                "file size {} is not a multiple of block size {}",
                file_size, block_size
            )));
        }

        Ok(Self {
            file,
            block_size,
            block_count: file_size / block_size as u64,
        })
    }

    /// Read a block from disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block doesn't exist.
    pub fn read_block(&mut self, block_id: BlockId) -> Result<Block> {
        let offset = self.offset_of(block_id)?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut block = Block::new(self.block_size);
        self.file.read_exact(block.as_mut_slice())?;

        Ok(block)
    }

    /// Write a block to disk.
    ///
    /// # Durability
    /// This method calls `fsync()` after writing to ensure the data is
    /// persisted to disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block is past the end of the file.
    pub fn write_block(&mut self, block_id: BlockId, block: &Block) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }

        let offset = self.offset_of(block_id)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(block.as_slice())?;
        self.file.sync_all()?; // fsync for durability

        Ok(())
    }

    /// Get the number of blocks in the database.
    #[inline]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Get the block size in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.block_count * self.block_size as u64
    }

    fn offset_of(&self, block_id: BlockId) -> Result<u64> {
        if block_id.0 >= self.block_count {
            return Err(Error::BlockNotFound(block_id.0));
        }
        Ok(block_id.0 * self.block_size as u64)
    }
}
