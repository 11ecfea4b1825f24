//! Insertion with leaf and interior splits.
//!
//! A full node is split into two freshly allocated blocks and the old
//! block is freed, except at the root address: the root never moves, so a
//! root split writes both halves elsewhere and rewrites the root in place
//! as a `Root` node with one key and two children.

use crate::common::{BlockId, Error, Result};
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

use super::node::Node;
use super::search::Descent;
use super::tree::BTreeIndex;

/// A node that was split in two, waiting to be linked into its parent.
struct Split {
    /// Block the parent currently points at.
    original: BlockId,
    /// First key of the right half.
    separator: Vec<u8>,
    left: BlockId,
    right: BlockId,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Insert a new `key`/`value` pair.
    ///
    /// Free blocks for every split the insert will cause are checked up
    /// front, so `OutOfSpace` leaves the tree untouched.
    ///
    /// # Errors
    /// `DuplicateKey` if `key` is already present, `OutOfSpace` if the
    /// splits can't be satisfied, `SizeMismatch` for wrong widths.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let Descent {
            leaf_id,
            mut leaf,
            path,
        } = self.descend(key)?;

        let pos = match leaf.find_slot(key)? {
            Ok(_) => return Err(Error::DuplicateKey),
            Err(pos) => pos,
        };

        if leaf.is_full() {
            let needed = self.blocks_needed(&path)?;
            self.ensure_free(needed)?;

            let split = self.split_leaf(leaf_id, &leaf, pos, key, value)?;
            self.propagate(path, split)?;
        } else {
            leaf.insert_entry(pos, key, value)?;
            self.write_node(leaf_id, &mut leaf)?;
        }

        self.superblock.key_count += 1;
        self.write_superblock()
    }

    /// Peak number of free blocks a split of a full leaf under `path` will
    /// draw on.
    ///
    /// Each split allocates two blocks and then frees the node it split, so
    /// every level above the leaf costs one block net. The root is never
    /// freed, but its split is always the last one.
    fn blocks_needed(&self, path: &[BlockId]) -> Result<usize> {
        let mut needed = 2;
        for &id in path.iter().rev() {
            if !self.read_node(id)?.is_full() {
                break;
            }
            needed += 1;
        }
        Ok(needed)
    }

    fn split_leaf(
        &mut self,
        leaf_id: BlockId,
        leaf: &Node,
        pos: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<Split> {
        let mut entries = leaf.entries()?;
        entries.insert(pos, (key.to_vec(), value.to_vec()));

        let right_entries = entries.split_off(self.layout.leaf_capacity() / 2);
        let separator = right_entries
            .first()
            .map(|(k, _)| k.clone())
            .ok_or_else(|| Error::corrupt("leaf split produced an empty right half"))?;

        let left = self.allocate()?;
        let right = self.allocate()?;
        self.write_node(left, &mut Node::leaf_from_entries(self.layout, &entries)?)?;
        self.write_node(
            right,
            &mut Node::leaf_from_entries(self.layout, &right_entries)?,
        )?;
        self.release_split_source(leaf_id)?;

        tracing::debug!(
            leaf = %leaf_id,
            left = %left,
            right = %right,
            left_keys = entries.len(),
            right_keys = right_entries.len(),
            "split leaf"
        );

        Ok(Split {
            original: leaf_id,
            separator,
            left,
            right,
        })
    }

    /// Split an overflowing internal node. `keys` holds one more key than
    /// fits; the middle one moves up as the separator.
    fn split_internal(
        &mut self,
        node_id: BlockId,
        mut keys: Vec<Vec<u8>>,
        mut children: Vec<BlockId>,
    ) -> Result<Split> {
        let mid = self.layout.interior_capacity() / 2;
        let right_keys = keys.split_off(mid + 1);
        let right_children = children.split_off(mid + 1);
        let separator = keys
            .pop()
            .ok_or_else(|| Error::corrupt("interior split with no keys"))?;

        let left = self.allocate()?;
        let right = self.allocate()?;
        self.write_node(
            left,
            &mut Node::internal_from_parts(NodeType::Interior, self.layout, &keys, &children)?,
        )?;
        self.write_node(
            right,
            &mut Node::internal_from_parts(
                NodeType::Interior,
                self.layout,
                &right_keys,
                &right_children,
            )?,
        )?;
        self.release_split_source(node_id)?;

        tracing::debug!(
            node = %node_id,
            left = %left,
            right = %right,
            "split interior node"
        );

        Ok(Split {
            original: node_id,
            separator,
            left,
            right,
        })
    }

    /// Link `split` into its ancestors, splitting them as needed and
    /// growing the root if the cascade reaches it.
    fn propagate(&mut self, mut path: Vec<BlockId>, mut split: Split) -> Result<()> {
        let root = self.superblock.root;
        if split.original == root {
            return self.grow_root(split);
        }

        while let Some(parent_id) = path.pop() {
            let parent = self.read_node(parent_id)?;
            let mut keys = parent.keys()?;
            let mut children = parent.children()?;

            let idx = children
                .iter()
                .position(|&c| c == split.original)
                .ok_or_else(|| {
                    Error::corrupt(format!(
                        "block {} is not a child of its parent {}",
                        split.original, parent_id
                    ))
                })?;

            children[idx] = split.left;
            children.insert(idx + 1, split.right);
            keys.insert(idx, split.separator);

            if keys.len() <= self.layout.interior_capacity() {
                let mut node = Node::internal_from_parts(
                    parent.node_type(),
                    self.layout,
                    &keys,
                    &children,
                )?;
                return self.write_node(parent_id, &mut node);
            }

            split = self.split_internal(parent_id, keys, children)?;
            if parent_id == root {
                return self.grow_root(split);
            }
        }

        Err(Error::corrupt(format!(
            "split of block {} ran past the root",
            split.original
        )))
    }

    /// Rewrite the root in place over the two halves of its old contents.
    fn grow_root(&mut self, split: Split) -> Result<()> {
        let mut root = Node::internal_from_parts(
            NodeType::Root,
            self.layout,
            &[split.separator],
            &[split.left, split.right],
        )?;
        self.write_node(self.superblock.root, &mut root)?;

        tracing::debug!(
            root = %self.superblock.root,
            left = %split.left,
            right = %split.right,
            "grew root"
        );
        Ok(())
    }

    fn release_split_source(&mut self, block_id: BlockId) -> Result<()> {
        if block_id == self.superblock.root {
            return Ok(());
        }
        self.deallocate(block_id)
    }
}
