//! Human-readable renderings of the tree.

use std::fmt::{self, Write as _};
use std::io;

use crate::common::{BlockId, Error, Result};
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

use super::node::Node;
use super::tree::BTreeIndex;

/// Output format for [`BTreeIndex::display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// One line per node in pre-order: address, kind, then contents.
    Depth,
    /// A Graphviz digraph with one vertex per node and one edge per child.
    Dot,
    /// Every `(key,value)` pair in ascending key order, one per line.
    SortedPairs,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Render the whole tree as a string.
    pub fn display(&self, format: DisplayFormat) -> Result<String> {
        let mut out = String::new();
        if format == DisplayFormat::Dot {
            out.push_str("digraph tree {\n");
        }
        self.render_node(&mut out, self.superblock.root, format, 0)?;
        if format == DisplayFormat::Dot {
            out.push_str("}\n");
        }
        Ok(out)
    }

    /// Render the whole tree into `out`.
    pub fn display_to<W: io::Write>(&self, out: &mut W, format: DisplayFormat) -> Result<()> {
        let rendered = self.display(format)?;
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }

    fn render_node(
        &self,
        out: &mut String,
        block_id: BlockId,
        format: DisplayFormat,
        depth: usize,
    ) -> Result<()> {
        if depth > self.store.block_count() as usize {
            return Err(Error::corrupt(format!(
                "display recursed past {} levels, tree has a cycle",
                depth
            )));
        }

        let node = self.read_linked(block_id)?;
        match format {
            DisplayFormat::Depth => {
                let _ = writeln!(
                    out,
                    "{}: {:?}: {}",
                    block_id,
                    node.node_type(),
                    node_contents(&node, false)?
                );
            }
            DisplayFormat::Dot => {
                let _ = writeln!(
                    out,
                    "  {} [ label=\"{}: {}\" ];",
                    block_id,
                    block_id,
                    node_contents(&node, true)?
                );
            }
            DisplayFormat::SortedPairs => {
                if node.node_type() == NodeType::Leaf {
                    for i in 0..node.num_keys() {
                        let _ = writeln!(
                            out,
                            "({},{})",
                            render_bytes(node.key(i)?),
                            render_bytes(node.value(i)?)
                        );
                    }
                }
            }
        }

        match node.node_type() {
            NodeType::Leaf => Ok(()),
            NodeType::Root | NodeType::Interior => {
                for child in node.children()? {
                    if format == DisplayFormat::Dot {
                        let _ = writeln!(out, "  {} -> {};", block_id, child);
                    }
                    self.render_node(out, child, format, depth + 1)?;
                }
                Ok(())
            }
            other => Err(Error::corrupt(format!(
                "{:?} block {} inside the tree",
                other, block_id
            ))),
        }
    }
}

/// DOT rendering; a tree that can't be read renders as an error vertex.
impl<S: BlockStore> fmt::Display for BTreeIndex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display(DisplayFormat::Dot) {
            Ok(dot) => f.write_str(&dot),
            Err(e) => write!(
                f,
                "digraph tree {{\n  error [ label=\"{}\" ];\n}}\n",
                escape_dot(&e.to_string())
            ),
        }
    }
}

/// `*child key *child ...` for internal nodes, `key value ...` for leaves.
fn node_contents(node: &Node, dot: bool) -> Result<String> {
    let mut parts = Vec::new();
    match node.node_type() {
        NodeType::Leaf => {
            for i in 0..node.num_keys() {
                parts.push(render_bytes(node.key(i)?));
                parts.push(render_bytes(node.value(i)?));
            }
        }
        NodeType::Root | NodeType::Interior => {
            for i in 0..=node.num_keys() {
                parts.push(format!("*{}", node.child(i)?));
                if i < node.num_keys() {
                    parts.push(render_bytes(node.key(i)?));
                }
            }
        }
        NodeType::Unallocated | NodeType::Superblock => {}
    }

    let joined = parts.join(" ");
    Ok(if dot { escape_dot(&joined) } else { joined })
}

/// Printable ASCII (ignoring trailing NUL padding) renders as text,
/// anything else as `0x`-prefixed hex.
pub(crate) fn render_bytes(bytes: &[u8]) -> String {
    let trimmed_len = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let trimmed = &bytes[..trimmed_len];

    if !trimmed.is_empty() && trimmed.iter().all(|&b| b == b' ' || b.is_ascii_graphic()) {
        return trimmed.iter().map(|&b| b as char).collect();
    }

    let mut hex = String::with_capacity(2 + bytes.len() * 2);
    hex.push_str("0x");
    for b in bytes {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BTreeConfig;
    use crate::storage::MemoryStore;

    fn k(n: u64) -> [u8; 8] {
        n.to_be_bytes()
    }

    fn split_tree(store: &MemoryStore) -> BTreeIndex<&MemoryStore> {
        let mut tree = BTreeIndex::create(store, BTreeConfig::new(8, 8)).unwrap();
        for i in 1..=5 {
            tree.insert(&k(i), &k(i * 10)).unwrap();
        }
        tree
    }

    #[test]
    fn test_render_bytes() {
        assert_eq!(render_bytes(b"abc"), "abc");
        assert_eq!(render_bytes(b"abc\0\0"), "abc");
        assert_eq!(render_bytes(&[0, 1]), "0x0001");
        assert_eq!(render_bytes(&[0, 0]), "0x0000");
        assert_eq!(render_bytes(&[0xff, b'a']), "0xff61");
    }

    #[test]
    fn test_depth_format() {
        let store = MemoryStore::new(113, 16);
        let tree = split_tree(&store);
        let out = tree.display(DisplayFormat::Depth).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "1: Root: *2 0x0000000000000003 *3");
        assert!(lines[1].starts_with("2: Leaf: 0x0000000000000001 0x000000000000000a"));
        assert!(lines[2].starts_with("3: Leaf: 0x0000000000000003"));
    }

    #[test]
    fn test_dot_format() {
        let store = MemoryStore::new(113, 16);
        let tree = split_tree(&store);
        let dot = tree.display(DisplayFormat::Dot).unwrap();

        assert!(dot.starts_with("digraph tree {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("  1 -> 2;"));
        assert!(dot.contains("  1 -> 3;"));
        assert!(dot.contains("  2 [ label=\"2: "));
        assert_eq!(format!("{}", tree), dot);
    }

    #[test]
    fn test_sorted_pairs_format() {
        let store = MemoryStore::new(256, 32);
        let mut tree = BTreeIndex::create(&store, BTreeConfig::new(2, 2)).unwrap();
        for key in ["dd", "bb", "ee", "aa", "cc"] {
            tree.insert(key.as_bytes(), b"v!").unwrap();
        }

        let out = tree.display(DisplayFormat::SortedPairs).unwrap();
        assert_eq!(out, "(aa,v!)\n(bb,v!)\n(cc,v!)\n(dd,v!)\n(ee,v!)\n");
    }

    #[test]
    fn test_dot_escapes_quotes() {
        let store = MemoryStore::new(256, 8);
        let mut tree = BTreeIndex::create(&store, BTreeConfig::new(2, 2)).unwrap();
        tree.insert(b"a\"", b"\\b").unwrap();

        let dot = tree.display(DisplayFormat::Dot).unwrap();
        assert!(dot.contains(r#"label="1: a\" \\b""#));
    }

    #[test]
    fn test_display_to_writer() {
        let store = MemoryStore::new(113, 16);
        let tree = split_tree(&store);

        let mut buf = Vec::new();
        tree.display_to(&mut buf, DisplayFormat::SortedPairs).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 5);
    }

    #[test]
    fn test_empty_tree() {
        let store = MemoryStore::new(113, 16);
        let tree = BTreeIndex::create(&store, BTreeConfig::new(8, 8)).unwrap();

        assert_eq!(tree.display(DisplayFormat::Depth).unwrap(), "1: Leaf: \n");
        assert_eq!(tree.display(DisplayFormat::SortedPairs).unwrap(), "");
    }
}
