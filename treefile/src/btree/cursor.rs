//! Cursors over a single tree.
//!
//! A cursor keeps a trail of loaded nodes from the root down to the current
//! leaf. Each frame records the cell index selected in its node; in an
//! internal frame an index equal to the cell count selects the right child.
//!
//! Cursors do not borrow the tree: every operation takes the tree as an
//! argument, so several cursors can be open at once. A write through one
//! handle leaves other cursors' trails stale until they rewind or seek.

use crate::btree::cell::{Cell, Key};
use crate::btree::node::Node;
use crate::btree::tree::{BTree, BTreeError};
use crate::storage::{PageNumber, PageStore};

/// Whether a cursor may insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Read,
    Write,
}

/// How [`Cursor::seek`] matches the target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// The entry with exactly the key.
    Eq,
    /// The first entry with key `>=` the target.
    Ge,
    /// The first entry with key `>` the target.
    Gt,
    /// The last entry with key `<=` the target.
    Le,
    /// The last entry with key `<` the target.
    Lt,
}

#[derive(Debug)]
struct Frame {
    node: Node,
    index: usize,
}

/// A positioned, stateful traversal handle over one tree.
#[derive(Debug)]
pub struct Cursor {
    root: PageNumber,
    mode: CursorMode,
    trail: Vec<Frame>,
}

impl Cursor {
    /// Open a cursor on the tree rooted at `root`, holding only the root.
    pub fn new<S: PageStore>(
        tree: &mut BTree<S>,
        root: PageNumber,
        mode: CursorMode,
    ) -> Result<Self, BTreeError> {
        let node = tree.load_node(root)?;
        Ok(Self {
            root,
            mode,
            trail: vec![Frame { node, index: 0 }],
        })
    }

    /// Close the cursor, handing every node on the trail back to the store.
    pub fn destroy<S: PageStore>(self, tree: &mut BTree<S>) {
        for frame in self.trail {
            tree.release_node(frame.node);
        }
    }

    #[must_use]
    pub const fn root(&self) -> PageNumber {
        self.root
    }

    #[must_use]
    pub const fn mode(&self) -> CursorMode {
        self.mode
    }

    /// Number of frames on the trail.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.trail.len()
    }

    fn leaf(&self) -> Result<&Frame, BTreeError> {
        match self.trail.last() {
            Some(frame) if frame.node.kind().is_leaf() && frame.index < frame.node.cell_count() => {
                Ok(frame)
            }
            _ => Err(BTreeError::NotFound),
        }
    }

    /// The cell the cursor is positioned on.
    pub fn current(&self) -> Result<Cell, BTreeError> {
        let frame = self.leaf()?;
        Ok(frame.node.get_cell(frame.index)?)
    }

    /// The key of the current cell.
    pub fn key(&self) -> Result<Key, BTreeError> {
        let frame = self.leaf()?;
        Ok(frame.node.key_at(frame.index)?)
    }

    /// Position on the first entry of the tree.
    pub fn rewind<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<(), BTreeError> {
        self.trail.clear();
        self.descend(tree, self.root, Edge::Leftmost)?;

        if self.leaf().is_err() {
            return match self.next(tree) {
                Err(BTreeError::EndOfTraversal) => Err(BTreeError::NotFound),
                other => other,
            };
        }
        Ok(())
    }

    /// Push frames from `page` down to a leaf along one edge.
    fn descend<S: PageStore>(
        &mut self,
        tree: &mut BTree<S>,
        mut page: PageNumber,
        edge: Edge,
    ) -> Result<(), BTreeError> {
        loop {
            let node = tree.load_node(page)?;
            let count = node.cell_count();
            let index = match edge {
                Edge::Leftmost => 0,
                Edge::Rightmost if node.kind().is_leaf() => count.saturating_sub(1),
                Edge::Rightmost => count,
            };

            if node.kind().is_leaf() {
                self.trail.push(Frame { node, index });
                return Ok(());
            }
            page = node.child_at(index)?;
            self.trail.push(Frame { node, index });
        }
    }

    /// Advance to the next entry.
    ///
    /// Returns `EndOfTraversal` and leaves the cursor in place at the last
    /// entry. A cursor that was never positioned returns `NotFound`.
    pub fn next<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<(), BTreeError> {
        loop {
            let Some(leaf) = self.trail.last_mut() else {
                return Err(BTreeError::EndOfTraversal);
            };
            if !leaf.node.kind().is_leaf() {
                return Err(BTreeError::NotFound);
            }
            if leaf.index + 1 < leaf.node.cell_count() {
                leaf.index += 1;
                return Ok(());
            }

            self.layer_next(tree)?;
            // Leaves are never empty below an internal node, but skip one if
            // it is.
            if self.leaf().is_ok() {
                return Ok(());
            }
        }
    }

    /// Step the deepest ancestor that has an unvisited child to its next
    /// child and descend leftmost from there.
    fn layer_next<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<(), BTreeError> {
        let level = self
            .trail
            .iter()
            .rposition(|frame| {
                !frame.node.kind().is_leaf() && frame.index < frame.node.cell_count()
            })
            .ok_or(BTreeError::EndOfTraversal)?;

        let frame = &mut self.trail[level];
        frame.index += 1;
        let child = frame.node.child_at(frame.index)?;
        self.trail.truncate(level + 1);
        self.descend(tree, child, Edge::Leftmost)
    }

    /// Step back to the previous entry.
    ///
    /// Returns `EndOfTraversal` and leaves the cursor in place at the first
    /// entry. A cursor that was never positioned returns `NotFound`.
    pub fn prev<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<(), BTreeError> {
        loop {
            let Some(leaf) = self.trail.last_mut() else {
                return Err(BTreeError::EndOfTraversal);
            };
            if !leaf.node.kind().is_leaf() {
                return Err(BTreeError::NotFound);
            }
            if leaf.index > 0 && leaf.node.cell_count() > 0 {
                leaf.index -= 1;
                return Ok(());
            }

            self.layer_prev(tree)?;
            if self.leaf().is_ok() {
                return Ok(());
            }
        }
    }

    /// Step the deepest ancestor that has an unvisited child to its previous
    /// child and descend rightmost from there.
    fn layer_prev<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<(), BTreeError> {
        let level = self
            .trail
            .iter()
            .rposition(|frame| !frame.node.kind().is_leaf() && frame.index > 0)
            .ok_or(BTreeError::EndOfTraversal)?;

        let frame = &mut self.trail[level];
        frame.index -= 1;
        let child = frame.node.child_at(frame.index)?;
        self.trail.truncate(level + 1);
        self.descend(tree, child, Edge::Rightmost)
    }

    /// Position the cursor relative to `key` according to `mode`.
    ///
    /// Returns `NotFound` when no entry qualifies; the cursor position is
    /// then unspecified until the next rewind or successful seek.
    pub fn seek<S: PageStore>(
        &mut self,
        tree: &mut BTree<S>,
        key: Key,
        mode: SeekMode,
    ) -> Result<(), BTreeError> {
        self.trail.clear();
        let mut page = self.root;
        loop {
            let node = tree.load_node(page)?;
            let (index, _) = node.search(key)?;
            if node.kind().is_leaf() {
                self.trail.push(Frame { node, index });
                break;
            }
            page = node.child_at(index)?;
            self.trail.push(Frame { node, index });
        }

        match self.land(tree)? {
            Landing::Empty => Err(BTreeError::NotFound),
            Landing::PastEnd => match mode {
                SeekMode::Le | SeekMode::Lt => Ok(()),
                SeekMode::Eq | SeekMode::Ge | SeekMode::Gt => Err(BTreeError::NotFound),
            },
            Landing::AtOrAfter(found) => {
                let exact = found == key;
                match mode {
                    SeekMode::Eq if !exact => Err(BTreeError::NotFound),
                    SeekMode::Gt if exact => end_is_not_found(self.next(tree)),
                    SeekMode::Le | SeekMode::Lt if mode == SeekMode::Lt || !exact => {
                        end_is_not_found(self.prev(tree))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Settle a freshly built seek trail on an entry.
    ///
    /// The leaf frame points at the first cell with key `>=` the target, or
    /// one past the end when every key in the leaf is smaller.
    fn land<S: PageStore>(&mut self, tree: &mut BTree<S>) -> Result<Landing, BTreeError> {
        let Some(leaf) = self.trail.last_mut() else {
            return Ok(Landing::Empty);
        };
        let count = leaf.node.cell_count();
        if count == 0 {
            return Ok(Landing::Empty);
        }
        if leaf.index < count {
            return Ok(Landing::AtOrAfter(leaf.node.key_at(leaf.index)?));
        }

        leaf.index = count - 1;
        match self.next(tree) {
            Ok(()) => Ok(Landing::AtOrAfter(self.key()?)),
            Err(BTreeError::EndOfTraversal) => Ok(Landing::PastEnd),
            Err(e) => Err(e),
        }
    }

    /// Insert `cell` into the cursor's tree and position on it.
    pub fn insert<S: PageStore>(
        &mut self,
        tree: &mut BTree<S>,
        cell: &Cell,
    ) -> Result<(), BTreeError> {
        if self.mode == CursorMode::Read {
            return Err(BTreeError::ReadOnlyCursor);
        }
        tree.insert(self.root, cell)?;
        self.seek(tree, cell.key(), SeekMode::Eq)
    }
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Leftmost,
    Rightmost,
}

/// Where a seek trail settled.
enum Landing {
    /// The tree has no entries.
    Empty,
    /// On the first entry with key `>=` the target; carries that key.
    AtOrAfter(Key),
    /// Every key is smaller than the target; on the last entry.
    PastEnd,
}

fn end_is_not_found(result: Result<(), BTreeError>) -> Result<(), BTreeError> {
    match result {
        Err(BTreeError::EndOfTraversal) => Err(BTreeError::NotFound),
        other => other,
    }
}
