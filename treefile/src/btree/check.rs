//! Structural verification of a tree.
//!
//! Walks every node below a root and checks:
//! - keys within a node are strictly ascending
//! - every key lies within the bounds set by its ancestors' separators
//! - all nodes belong to the root's tree family
//! - all leaves sit at the same depth

use crate::btree::cell::Key;
use crate::btree::node::NodeKind;
use crate::btree::tree::{BTree, BTreeError};
use crate::storage::{PageNumber, PageStore};

/// Depth past which a tree is assumed to contain a cycle.
const MAX_DEPTH: usize = 64;

/// Shape of a verified tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels, counting the root.
    pub depth: usize,
    pub internal_nodes: usize,
    pub leaf_nodes: usize,
    /// Number of leaf entries.
    pub entries: usize,
}

struct Walk {
    family: NodeKind,
    leaf_depth: Option<usize>,
    stats: TreeStats,
}

impl<S: PageStore> BTree<S> {
    /// Verify the structure of the tree rooted at `root`.
    pub fn verify(&mut self, root: PageNumber) -> Result<TreeStats, BTreeError> {
        let family = self.load_node(root)?.kind();
        let mut walk = Walk {
            family,
            leaf_depth: None,
            stats: TreeStats::default(),
        };

        self.verify_node(root, None, None, 1, &mut walk)?;
        walk.stats.depth = walk.leaf_depth.unwrap_or(1);
        Ok(walk.stats)
    }

    /// Check the subtree at `page`, whose keys must lie in `(lower, upper]`.
    fn verify_node(
        &mut self,
        page: PageNumber,
        lower: Option<Key>,
        upper: Option<Key>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<(), BTreeError> {
        let violation = |message: String| BTreeError::InvariantViolation { page, message };

        if depth > MAX_DEPTH {
            return Err(violation(format!("tree deeper than {MAX_DEPTH} levels")));
        }

        let node = self.load_node(page)?;
        let kind = node.kind();
        if !kind.same_family(walk.family) {
            return Err(violation(format!(
                "{kind} node in a tree rooted at a {} node",
                walk.family
            )));
        }

        let cells = node.cells()?;
        let right_child = node.right_child();
        drop(node);

        for pair in cells.windows(2) {
            if pair[0].key() >= pair[1].key() {
                return Err(violation(format!(
                    "keys out of order: {} before {}",
                    pair[0].key(),
                    pair[1].key()
                )));
            }
        }
        for cell in &cells {
            let key = cell.key();
            if lower.is_some_and(|lo| key <= lo) || upper.is_some_and(|hi| key > hi) {
                return Err(violation(format!(
                    "key {key} outside separator bounds ({lower:?}, {upper:?}]"
                )));
            }
        }

        if kind.is_leaf() {
            match walk.leaf_depth {
                Some(expected) if expected != depth => {
                    return Err(violation(format!(
                        "leaf at depth {depth}, expected {expected}"
                    )));
                }
                _ => walk.leaf_depth = Some(depth),
            }
            walk.stats.leaf_nodes += 1;
            walk.stats.entries += cells.len();
            return Ok(());
        }

        walk.stats.internal_nodes += 1;
        if cells.is_empty() {
            return Err(violation("internal node without separators".to_string()));
        }

        let mut child_lower = lower;
        for cell in &cells {
            let child = cell
                .child()
                .ok_or_else(|| violation("separator without a child".to_string()))?;
            self.verify_node(child, child_lower, Some(cell.key()), depth + 1, walk)?;
            child_lower = Some(cell.key());
        }
        let right = right_child.ok_or_else(|| violation("missing right child".to_string()))?;
        self.verify_node(right, child_lower, upper, depth + 1, walk)
    }
}
