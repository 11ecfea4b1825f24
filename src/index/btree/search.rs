//! Root-to-leaf descent, point lookup and in-place update.

use crate::common::{BlockId, Error, Result};
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

use super::node::Node;
use super::tree::BTreeIndex;

/// Result of walking from the root to the leaf responsible for a key.
pub(super) struct Descent {
    pub leaf_id: BlockId,
    pub leaf: Node,
    /// Internal nodes visited, root first; the leaf's parent is last.
    pub path: Vec<BlockId>,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Walk from the root to the leaf whose range covers `key`.
    ///
    /// # Errors
    /// `Corrupt` on a metadata block inside the tree, an internal node
    /// with no keys, or a path longer than the store could hold.
    pub(super) fn descend(&self, key: &[u8]) -> Result<Descent> {
        let max_depth = self.store.block_count() as usize;
        let mut path = Vec::new();
        let mut current = self.superblock.root;

        loop {
            if path.len() > max_depth {
                return Err(Error::corrupt(format!(
                    "descent deeper than {} blocks, tree has a cycle",
                    max_depth
                )));
            }

            let node = self.read_linked(current)?;
            match node.node_type() {
                NodeType::Leaf => {
                    tracing::trace!(leaf = %current, depth = path.len(), "descent reached leaf");
                    return Ok(Descent {
                        leaf_id: current,
                        leaf: node,
                        path,
                    });
                }
                NodeType::Root | NodeType::Interior => {
                    if node.num_keys() == 0 {
                        return Err(Error::corrupt(format!(
                            "internal node {} has no keys",
                            current
                        )));
                    }
                    let idx = node.child_index(key)?;
                    path.push(current);
                    current = node.child(idx)?;
                }
                other => {
                    return Err(Error::corrupt(format!(
                        "reached {:?} block {} during descent",
                        other, current
                    )));
                }
            }
        }
    }

    /// Return the value stored under `key`.
    ///
    /// # Errors
    /// `KeyNotFound` if the key is absent, `SizeMismatch` for a key of the
    /// wrong width.
    pub fn lookup(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        let Descent { leaf, .. } = self.descend(key)?;
        match leaf.find_slot(key)? {
            Ok(i) => Ok(leaf.value(i)?.to_vec()),
            Err(_) => Err(Error::KeyNotFound),
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        match self.lookup(key) {
            Ok(_) => Ok(true),
            Err(Error::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the value stored under an existing `key`.
    ///
    /// # Errors
    /// `KeyNotFound` if the key is absent; the tree is left untouched.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let Descent {
            leaf_id, mut leaf, ..
        } = self.descend(key)?;
        let slot = leaf.find_slot(key)?.map_err(|_| Error::KeyNotFound)?;

        leaf.set_value(slot, value)?;
        self.write_node(leaf_id, &mut leaf)
    }
}
