//! The tree handle: attach, detach and the shared plumbing every
//! operation goes through.

use crate::common::{BTreeConfig, BlockId, Error, Result};
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

use super::allocator::Superblock;
use super::node::{check_width, Node, NodeLayout};

/// How [`BTreeIndex::attach`] treats the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// Format the whole store as an empty tree with the given sizing.
    Create(BTreeConfig),
    /// Load an existing tree from its superblock.
    Open,
}

/// A B+tree of fixed-width keys and values living in a [`BlockStore`].
///
/// Block 0 holds the superblock, the root never moves from its first
/// address, and every other block is either a tree node or on the free
/// list. The in-memory superblock is written back after every mutation.
///
/// # Example
/// ```
/// use blocktree::{BTreeConfig, BTreeIndex, MemoryStore};
///
/// let store = MemoryStore::new(4096, 64);
/// let mut tree = BTreeIndex::create(store, BTreeConfig::new(8, 8)).unwrap();
///
/// tree.insert(&7u64.to_be_bytes(), &700u64.to_be_bytes()).unwrap();
/// assert_eq!(tree.lookup(&7u64.to_be_bytes()).unwrap(), 700u64.to_be_bytes());
/// ```
pub struct BTreeIndex<S: BlockStore> {
    pub(super) store: S,
    pub(super) superblock_id: BlockId,
    pub(super) superblock: Superblock,
    pub(super) layout: NodeLayout,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Attach to `store` with the superblock at `superblock_id`.
    ///
    /// Only address 0 is supported; anything else is `InvalidBlockId`.
    pub fn attach(store: S, superblock_id: BlockId, mode: AttachMode) -> Result<Self> {
        if superblock_id != BlockId::SUPERBLOCK {
            return Err(Error::InvalidBlockId(superblock_id.0));
        }

        let tree = match mode {
            AttachMode::Create(config) => Self::format(store, superblock_id, config)?,
            AttachMode::Open => Self::load(store, superblock_id)?,
        };

        tracing::info!(
            mode = ?mode,
            root = %tree.superblock.root,
            keys = tree.superblock.key_count,
            blocks = tree.store.block_count(),
            "attached tree"
        );

        Ok(tree)
    }

    /// Format `store` as an empty tree.
    pub fn create(store: S, config: BTreeConfig) -> Result<Self> {
        Self::attach(store, BlockId::SUPERBLOCK, AttachMode::Create(config))
    }

    /// Open the tree already stored in `store`.
    pub fn open(store: S) -> Result<Self> {
        Self::attach(store, BlockId::SUPERBLOCK, AttachMode::Open)
    }

    /// Persist the superblock, flush the store and hand it back.
    pub fn detach(self) -> Result<S> {
        self.sync()?;
        tracing::info!(keys = self.superblock.key_count, "detached tree");
        Ok(self.store)
    }

    /// Persist the superblock and flush the store without detaching.
    pub fn sync(&self) -> Result<()> {
        self.write_superblock()?;
        self.store.flush()
    }

    /// Remove `key`. Not supported: the tree only grows, and every call
    /// returns `Unimplemented` whatever the key.
    pub fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Error::Unimplemented)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of keys in the tree.
    #[inline]
    pub fn len(&self) -> u64 {
        self.superblock.key_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The key and value widths the tree was created with.
    #[inline]
    pub fn config(&self) -> BTreeConfig {
        self.layout.config()
    }

    /// Node sizing derived from the config and the store's block size.
    #[inline]
    pub fn layout(&self) -> NodeLayout {
        self.layout
    }

    /// Address of the root node.
    #[inline]
    pub fn root(&self) -> BlockId {
        self.superblock.root
    }

    /// The backing store.
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(super) fn read_node(&self, block_id: BlockId) -> Result<Node> {
        tracing::trace!(block = %block_id, "read node");
        Node::read(&self.store, block_id, self.layout)
    }

    /// Read a block reached through a pointer stored on disk. A pointer
    /// past the end of the store is corruption, not a missing block.
    pub(super) fn read_linked(&self, block_id: BlockId) -> Result<Node> {
        self.read_node(block_id).map_err(|e| match e {
            Error::BlockNotFound(n) => Error::corrupt(format!(
                "pointer to block {} past the end of the store ({} blocks)",
                n,
                self.store.block_count()
            )),
            other => other,
        })
    }

    pub(super) fn write_node(&self, block_id: BlockId, node: &mut Node) -> Result<()> {
        tracing::trace!(block = %block_id, node_type = ?node.node_type(), "write node");
        node.write(&self.store, block_id)
    }

    pub(super) fn check_key(&self, key: &[u8]) -> Result<()> {
        check_width("key", key, self.layout.key_size)
    }

    pub(super) fn check_value(&self, value: &[u8]) -> Result<()> {
        check_width("value", value, self.layout.value_size)
    }

    /// Write a fresh superblock, an empty leaf root at block 1, and chain
    /// every remaining block onto the free list in ascending order.
    fn format(store: S, superblock_id: BlockId, config: BTreeConfig) -> Result<Self> {
        let layout = NodeLayout::new(&config, store.block_size())?;
        let block_count = store.block_count();
        if block_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "store has {} blocks, a tree needs at least 2",
                block_count
            )));
        }

        let root = superblock_id.next();
        let first_free = if block_count > 2 {
            root.next()
        } else {
            BlockId::NULL
        };

        let tree = Self {
            store,
            superblock_id,
            superblock: Superblock::new(layout, root, first_free),
            layout,
        };

        tree.write_superblock()?;
        tree.write_node(root, &mut Node::new(NodeType::Leaf, layout))?;
        tree.store.notify_allocated(superblock_id);
        tree.store.notify_allocated(root);

        for i in root.next().0..block_count {
            let mut free = Node::new(NodeType::Unallocated, layout);
            let next = if i + 1 < block_count {
                BlockId(i + 1)
            } else {
                BlockId::NULL
            };
            free.set_next_free(next);
            tree.write_node(BlockId(i), &mut free)?;
        }

        tracing::debug!(
            key_size = config.key_size,
            value_size = config.value_size,
            leaf_capacity = layout.leaf_capacity(),
            interior_capacity = layout.interior_capacity(),
            "formatted store"
        );

        Ok(tree)
    }

    fn load(store: S, superblock_id: BlockId) -> Result<Self> {
        let block = store.read_block(superblock_id)?;
        let superblock = Superblock::decode(&block)?;

        if superblock.block_size != store.block_size() {
            return Err(Error::corrupt(format!(
                "superblock records block size {}, store uses {}",
                superblock.block_size,
                store.block_size()
            )));
        }

        let config = BTreeConfig::new(superblock.key_size, superblock.value_size);
        let layout = NodeLayout::new(&config, superblock.block_size)
            .map_err(|e| Error::corrupt(format!("superblock sizing: {}", e)))?;

        if superblock.root.is_null() || superblock.root.0 >= store.block_count() {
            return Err(Error::corrupt(format!(
                "superblock root {} outside store",
                superblock.root
            )));
        }

        Ok(Self {
            store,
            superblock_id,
            superblock,
            layout,
        })
    }
}
