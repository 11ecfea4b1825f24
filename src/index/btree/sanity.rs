//! Full structural verification of a tree and its free list.

use std::collections::HashSet;

use crate::common::{BlockId, Error, Result};
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

use super::tree::BTreeIndex;

/// Shape of a tree that passed [`BTreeIndex::sanity_check`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanityReport {
    /// Levels from the root to the leaves; 1 for a lone root leaf.
    pub height: usize,
    pub interior_nodes: u64,
    pub leaf_nodes: u64,
    /// Key/value pairs found in leaves.
    pub entries: u64,
    pub free_blocks: u64,
}

/// Traversal state shared by the recursive walk.
#[derive(Default)]
struct Walk {
    report: SanityReport,
    visited: HashSet<BlockId>,
    leaf_depth: Option<usize>,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Walk every node and the free list, checking:
    ///
    /// - keys ascend strictly within each node and respect the separator
    ///   bounds inherited from ancestors
    /// - internal nodes have at least one key, and only the root address
    ///   carries the `Root` tag
    /// - every leaf sits at the same depth
    /// - no block is reachable twice
    /// - the leaves hold exactly the superblock's key count
    /// - every free block is `Unallocated`, and tree blocks plus free
    ///   blocks plus the superblock account for the whole store
    ///
    /// # Errors
    /// `Inconsistent` describing the first violation found.
    pub fn sanity_check(&self) -> Result<SanityReport> {
        let result = self.run_sanity_check().map_err(|e| match e {
            Error::Corrupt(msg) => Error::Inconsistent(msg),
            other => other,
        });

        match &result {
            Ok(report) => tracing::debug!(?report, "sanity check passed"),
            Err(e) => tracing::warn!(error = %e, "sanity check failed"),
        }
        result
    }

    /// Number of levels from the root to the leftmost leaf.
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut node = self.read_node(self.superblock.root)?;
        while node.node_type().is_internal() {
            if height > self.store.block_count() as usize {
                return Err(Error::corrupt("leftmost path has a cycle"));
            }
            node = self.read_linked(node.child(0)?)?;
            height += 1;
        }
        Ok(height)
    }

    fn run_sanity_check(&self) -> Result<SanityReport> {
        let mut walk = Walk::default();
        self.check_subtree(self.superblock.root, None, None, 1, &mut walk)?;

        if walk.report.entries != self.superblock.key_count {
            return Err(Error::inconsistent(format!(
                "leaves hold {} keys, superblock records {}",
                walk.report.entries, self.superblock.key_count
            )));
        }

        walk.report.free_blocks = self.check_free_list(&walk.visited)?;

        let live = walk.visited.len() as u64;
        let accounted = live + walk.report.free_blocks + 1;
        let total = self.store.block_count();
        if accounted != total {
            return Err(Error::inconsistent(format!(
                "{} tree blocks + {} free + superblock = {}, store has {} (leaked {})",
                live,
                walk.report.free_blocks,
                accounted,
                total,
                total.saturating_sub(accounted)
            )));
        }

        walk.report.height = walk.leaf_depth.unwrap_or(0);
        Ok(walk.report)
    }

    /// Check the subtree at `block_id`, whose keys must lie in
    /// `[lower, upper)`.
    fn check_subtree(
        &self,
        block_id: BlockId,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<()> {
        if block_id == self.superblock_id || !walk.visited.insert(block_id) {
            return Err(Error::inconsistent(format!(
                "block {} reachable more than once",
                block_id
            )));
        }

        let node = self.read_linked(block_id)?;
        let is_root = block_id == self.superblock.root;

        match node.node_type() {
            NodeType::Root if !is_root => {
                return Err(Error::inconsistent(format!(
                    "block {} tagged Root away from the root address",
                    block_id
                )));
            }
            NodeType::Interior if is_root => {
                return Err(Error::inconsistent(format!(
                    "root block {} tagged Interior",
                    block_id
                )));
            }
            NodeType::Unallocated | NodeType::Superblock => {
                return Err(Error::inconsistent(format!(
                    "{:?} block {} linked into the tree",
                    node.node_type(),
                    block_id
                )));
            }
            _ => {}
        }

        let keys = node.keys()?;
        for (i, key) in keys.iter().enumerate() {
            if i > 0 && keys[i - 1] >= *key {
                return Err(Error::inconsistent(format!(
                    "keys out of order in block {} at slot {}",
                    block_id, i
                )));
            }
            if lower.is_some_and(|lo| key.as_slice() < lo)
                || upper.is_some_and(|hi| key.as_slice() >= hi)
            {
                return Err(Error::inconsistent(format!(
                    "key at slot {} of block {} outside its parent's range",
                    i, block_id
                )));
            }
        }

        if node.node_type() == NodeType::Leaf {
            match walk.leaf_depth {
                None => walk.leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(Error::inconsistent(format!(
                        "leaf {} at depth {}, other leaves at depth {}",
                        block_id, depth, d
                    )));
                }
                Some(_) => {}
            }
            walk.report.leaf_nodes += 1;
            walk.report.entries += keys.len() as u64;
            return Ok(());
        }

        if keys.is_empty() {
            return Err(Error::inconsistent(format!(
                "internal node {} has no keys",
                block_id
            )));
        }
        walk.report.interior_nodes += 1;

        let children = node.children()?;
        for (i, &child) in children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(keys[i - 1].as_slice()) };
            let hi = if i == keys.len() { upper } else { Some(keys[i].as_slice()) };
            self.check_subtree(child, lo, hi, depth + 1, walk)?;
        }
        Ok(())
    }

    /// Walk the free list and return its length.
    fn check_free_list(&self, live: &HashSet<BlockId>) -> Result<u64> {
        let mut seen = HashSet::new();
        let mut current = self.superblock.free_list;

        while !current.is_null() {
            if current.0 >= self.store.block_count() {
                return Err(Error::inconsistent(format!(
                    "free list points outside the store at {}",
                    current
                )));
            }
            if live.contains(&current) {
                return Err(Error::inconsistent(format!(
                    "block {} is both in the tree and on the free list",
                    current
                )));
            }
            if !seen.insert(current) {
                return Err(Error::inconsistent(format!(
                    "free list cycles back to block {}",
                    current
                )));
            }

            let node = self.read_linked(current)?;
            if node.node_type() != NodeType::Unallocated {
                return Err(Error::inconsistent(format!(
                    "free block {} is tagged {:?}",
                    current,
                    node.node_type()
                )));
            }
            current = node.next_free();
        }

        Ok(seen.len() as u64)
    }
}
