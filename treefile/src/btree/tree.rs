//! B-tree engine over a page store.
//!
//! A file holds any number of trees sharing one page space; each tree is
//! named by its root page, which never changes. Table trees map row ids to
//! payloads, index trees map index keys to primary keys.
//!
//! Inserts split full nodes on the way down. A full root is split in place:
//! its cells move to two new pages and the root page becomes an internal node
//! over them, so the root page number stays stable.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::btree::cell::{Cell, Key};
use crate::btree::node::{Node, NodeError, NodeKind};
use crate::config::EngineConfig;
use crate::storage::{
    BufferPool, FILE_HEADER_SIZE, FileHeader, FilePager, PageNumber, PageStore, PagerError,
};

/// A B-tree file backed by a page store.
pub struct BTree<S: PageStore> {
    store: S,
}

/// What happened below a node during an insert.
enum Descent {
    Inserted,
    /// The node needs a split by its parent before it can take a separator.
    NodeFull,
}

impl BTree<FilePager> {
    /// Open the database file at `path`, creating it if it is empty.
    pub fn open(path: &Path, config: &EngineConfig) -> Result<Self, BTreeError> {
        let pool = BufferPool::new(config.buffer_pool_capacity);
        let store = FilePager::open(path, pool)?;
        let tree = Self::from_store(store, config.page_size)?;

        info!(
            path = %path.display(),
            page_size = tree.page_size(),
            page_count = tree.store.page_count(),
            "opened database"
        );
        Ok(tree)
    }
}

impl<S: PageStore> BTree<S> {
    /// Open a B-tree file over `store`.
    ///
    /// An empty store becomes a new file with `page_size` pages whose page 1
    /// is an empty table leaf. Otherwise the file header is validated and its
    /// page size installed.
    pub fn from_store(mut store: S, page_size: usize) -> Result<Self, BTreeError> {
        if store.is_empty() {
            store.set_page_size(page_size)?;
            let mut tree = Self { store };
            let root = tree.store.allocate_page()?;
            tree.init_empty_node(root, NodeKind::TableLeaf)?;

            info!(page_size, "created database");
            return Ok(tree);
        }

        let header = store
            .read_header()
            .and_then(|raw| FileHeader::from_bytes(&raw).map_err(PagerError::from));
        let header = match header {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "rejected file header");
                return Err(e.into());
            }
        };
        store.set_page_size(header.page_size)?;

        Ok(Self { store })
    }

    /// Sync and close the file.
    pub fn close(mut self) -> Result<(), BTreeError> {
        self.store.sync()?;
        Ok(())
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Largest payload a table leaf cell may carry.
    ///
    /// Sized so a full leaf always holds at least three cells, which lets
    /// every split make progress.
    #[must_use]
    pub fn max_payload_size(&self) -> usize {
        (self.page_size() - FILE_HEADER_SIZE - 8) / 4 - 2 - 8
    }

    // ========== Node I/O ==========

    /// Load and parse the node on `page`.
    pub fn load_node(&mut self, page: PageNumber) -> Result<Node, BTreeError> {
        let page = self.store.read_page(page)?;
        Ok(Node::from_page(page)?)
    }

    /// Write a node's header and page back to the store.
    pub fn write_node(&mut self, node: &mut Node) -> Result<(), BTreeError> {
        node.write_header();
        self.store.write_page(node.page())?;
        Ok(())
    }

    /// Release a node without writing it.
    pub fn release_node(&mut self, node: Node) {
        self.store.release(node.into_page());
    }

    /// Overwrite `page` with an empty node of `kind`.
    pub fn init_empty_node(&mut self, page: PageNumber, kind: NodeKind) -> Result<(), BTreeError> {
        let buffer = self
            .store
            .buffer_pool()
            .lease_page(page)
            .ok_or(PagerError::BufferPoolExhausted)?;
        let mut node = Node::init(buffer, kind);
        self.write_node(&mut node)
    }

    /// Allocate a page and initialize it as an empty node of `kind`.
    pub fn new_node(&mut self, kind: NodeKind) -> Result<Node, BTreeError> {
        let page = self.store.allocate_page()?;
        let buffer = self
            .store
            .buffer_pool()
            .lease_page(page)
            .ok_or(PagerError::BufferPoolExhausted)?;
        let mut node = Node::init(buffer, kind);
        self.write_node(&mut node)?;
        Ok(node)
    }

    /// Create a new empty tree and return its root page.
    pub fn create_tree(&mut self, kind: NodeKind) -> Result<PageNumber, BTreeError> {
        if !kind.is_leaf() {
            return Err(BTreeError::InvalidArgument(format!(
                "a new tree root must be a leaf, not {kind}"
            )));
        }
        let root = self.new_node(kind)?.page_number();
        debug!(root, %kind, "created tree");
        Ok(root)
    }

    // ========== Lookup ==========

    /// Find the leaf cell holding `key` in the tree rooted at `root`.
    pub fn find_cell(&mut self, root: PageNumber, key: Key) -> Result<Cell, BTreeError> {
        let mut page = root;
        loop {
            let node = self.load_node(page)?;
            let (pos, exact) = node.search(key)?;
            if node.kind().is_leaf() {
                if !exact {
                    return Err(BTreeError::NotFound);
                }
                return Ok(node.get_cell(pos)?);
            }
            page = node.child_at(pos)?;
        }
    }

    /// Find the payload stored under `key`.
    ///
    /// In an index tree the payload is the primary key as four big-endian
    /// bytes.
    pub fn find(&mut self, root: PageNumber, key: Key) -> Result<Vec<u8>, BTreeError> {
        match self.find_cell(root, key)? {
            Cell::TableLeaf { payload, .. } => Ok(payload),
            Cell::IndexLeaf { primary_key, .. } => Ok(primary_key.to_be_bytes().to_vec()),
            Cell::TableInternal { .. } | Cell::IndexInternal { .. } => Err(BTreeError::NotFound),
        }
    }

    /// Find the primary key an index tree maps `index_key` to.
    pub fn find_in_index(&mut self, root: PageNumber, index_key: Key) -> Result<Key, BTreeError> {
        match self.find_cell(root, index_key)? {
            Cell::IndexLeaf { primary_key, .. } => Ok(primary_key),
            cell => Err(NodeError::WrongCellKind {
                node: NodeKind::IndexLeaf,
                cell: cell.kind(),
            }
            .into()),
        }
    }

    // ========== Insert ==========

    /// Insert a row into a table tree.
    pub fn insert_in_table(
        &mut self,
        root: PageNumber,
        key: Key,
        payload: &[u8],
    ) -> Result<(), BTreeError> {
        self.insert(
            root,
            &Cell::TableLeaf {
                key,
                payload: payload.to_vec(),
            },
        )
    }

    /// Insert an entry into an index tree.
    pub fn insert_in_index(
        &mut self,
        root: PageNumber,
        index_key: Key,
        primary_key: Key,
    ) -> Result<(), BTreeError> {
        self.insert(
            root,
            &Cell::IndexLeaf {
                key: index_key,
                primary_key,
            },
        )
    }

    /// Insert a leaf cell into the tree rooted at `root`.
    pub fn insert(&mut self, root: PageNumber, cell: &Cell) -> Result<(), BTreeError> {
        if !cell.kind().is_leaf() {
            return Err(BTreeError::InvalidArgument(format!(
                "only leaf cells can be inserted, got a {} cell",
                cell.kind()
            )));
        }
        if let Cell::TableLeaf { payload, .. } = cell {
            let max = self.max_payload_size();
            if payload.len() > max {
                return Err(BTreeError::PayloadTooLarge {
                    size: payload.len(),
                    max,
                });
            }
        }
        cell.validate()?;

        loop {
            let node = self.load_node(root)?;
            if !node.kind().same_family(cell.kind()) {
                return Err(NodeError::WrongCellKind {
                    node: node.kind(),
                    cell: cell.kind(),
                }
                .into());
            }
            let full = node.is_full(cell);
            drop(node);

            if full {
                self.split_root(root)?;
            }
            match self.insert_non_full(root, cell)? {
                Descent::Inserted => return Ok(()),
                // The root ran out of room for separators; split it again.
                Descent::NodeFull => {}
            }
        }
    }

    /// Insert `cell` below `page`, which has room for at least one separator.
    fn insert_non_full(&mut self, page: PageNumber, cell: &Cell) -> Result<Descent, BTreeError> {
        loop {
            let mut node = self.load_node(page)?;
            let (pos, exact) = node.search(cell.key())?;

            if node.kind() == cell.kind() {
                if exact {
                    return Err(BTreeError::Duplicate(cell.key()));
                }
                node.insert_cell(pos, cell)?;
                self.write_node(&mut node)?;
                return Ok(Descent::Inserted);
            }

            let child_page = node.child_at(pos)?;
            drop(node);

            let child = self.load_node(child_page)?;
            let child_full = child.is_full(cell);
            drop(child);

            if !child_full {
                match self.insert_non_full(child_page, cell)? {
                    Descent::Inserted => return Ok(Descent::Inserted),
                    Descent::NodeFull => {}
                }
            }

            // The child must split, which adds a separator here.
            if self.load_node(page)?.is_full(cell) {
                return Ok(Descent::NodeFull);
            }
            self.split(page, child_page, pos)?;
        }
    }

    /// Split a full root in place.
    ///
    /// The root's cells move to two new pages and the root becomes an
    /// internal node with a single separator.
    fn split_root(&mut self, root: PageNumber) -> Result<(), BTreeError> {
        let mut root_node = self.load_node(root)?;
        let kind = root_node.kind();
        let cells = root_node.cells()?;
        let mid = cells.len() / 2;

        let mut right = self.new_node(kind)?;
        let mut left = self.new_node(kind)?;
        let separator = fill_left(&mut left, &cells, mid)?;

        for (i, cell) in cells[mid + 1..].iter().enumerate() {
            right.insert_cell(i, cell)?;
        }
        if let Some(child) = root_node.right_child() {
            right.set_right_child(child);
        }

        root_node.reset(kind.internal());
        root_node.insert_cell(0, &separator)?;
        root_node.set_right_child(right.page_number());

        self.write_node(&mut left)?;
        self.write_node(&mut right)?;
        self.write_node(&mut root_node)?;

        debug!(
            root,
            left = left.page_number(),
            right = right.page_number(),
            median = separator.key(),
            "split root"
        );
        Ok(())
    }

    /// Split `child`, the child of `parent` selected by `position`.
    ///
    /// Cells before the median move to a new left page and the separator is
    /// inserted into the parent at `position`. The child keeps its page
    /// number and the cells after the median. Returns the new left page.
    pub fn split(
        &mut self,
        parent: PageNumber,
        child: PageNumber,
        position: usize,
    ) -> Result<PageNumber, BTreeError> {
        let mut child_node = self.load_node(child)?;
        let kind = child_node.kind();
        let right_child = child_node.right_child();
        let cells = child_node.cells()?;
        let mid = cells.len() / 2;

        let mut left = self.new_node(kind)?;
        let separator = fill_left(&mut left, &cells, mid)?;

        child_node.reset(kind);
        for (i, cell) in cells[mid + 1..].iter().enumerate() {
            child_node.insert_cell(i, cell)?;
        }
        if let Some(page) = right_child {
            child_node.set_right_child(page);
        }

        let mut parent_node = self.load_node(parent)?;
        parent_node.insert_cell(position, &separator)?;

        self.write_node(&mut parent_node)?;
        self.write_node(&mut child_node)?;
        self.write_node(&mut left)?;

        let left_page = left.page_number();
        debug!(
            parent,
            child,
            left = left_page,
            median = separator.key(),
            "split node"
        );
        Ok(left_page)
    }
}

/// Move `cells[..mid]` into `left` and build the separator for the median.
///
/// A leaf median is copied up: it stays in `left` and the separator carries
/// its key. An internal median moves up: its child becomes `left`'s right
/// child.
fn fill_left(left: &mut Node, cells: &[Cell], mid: usize) -> Result<Cell, NodeError> {
    for (i, cell) in cells[..mid].iter().enumerate() {
        left.insert_cell(i, cell)?;
    }

    let median = cells[mid].clone();
    if left.kind().is_leaf() {
        left.insert_cell(mid, &median)?;
    } else if let Some(child) = median.child() {
        left.set_right_child(child);
    }
    Ok(median.into_separator(left.page_number()))
}

/// Broad category of a [`BTreeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMemory,
    IoError,
    CorruptHeader,
    InvalidPageNumber,
    InvalidCellIndex,
    Duplicate,
    NotFound,
    EndOfTraversal,
    InvalidArgument,
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// Page store error.
    Pager(PagerError),
    /// Node error.
    Node(NodeError),
    /// The key is already present.
    Duplicate(Key),
    /// No entry matches.
    NotFound,
    /// The cursor has no further entry in that direction.
    EndOfTraversal,
    /// A table payload exceeds the per-cell limit.
    PayloadTooLarge { size: usize, max: usize },
    /// Insert through a read-only cursor.
    ReadOnlyCursor,
    /// Invalid request from the caller.
    InvalidArgument(String),
    /// A structural check failed.
    InvariantViolation { page: PageNumber, message: String },
}

impl BTreeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Pager(e) => match e {
                PagerError::Io(_) | PagerError::InjectedFault(_) => ErrorKind::IoError,
                PagerError::PageOutOfBounds { .. } => ErrorKind::InvalidPageNumber,
                PagerError::BufferPoolExhausted => ErrorKind::OutOfMemory,
                PagerError::CorruptHeader(_) => ErrorKind::CorruptHeader,
                PagerError::InvalidPageSize(_) => ErrorKind::InvalidArgument,
            },
            Self::Node(e) => match e {
                NodeError::InvalidKind(_)
                | NodeError::CorruptHeader { .. }
                | NodeError::CorruptCell { .. }
                | NodeError::Overflow { .. } => ErrorKind::CorruptHeader,
                NodeError::InvalidCellIndex { .. } => ErrorKind::InvalidCellIndex,
                NodeError::WrongCellKind { .. } | NodeError::ValueOutOfRange(_) => {
                    ErrorKind::InvalidArgument
                }
            },
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::NotFound => ErrorKind::NotFound,
            Self::EndOfTraversal => ErrorKind::EndOfTraversal,
            Self::PayloadTooLarge { .. } | Self::ReadOnlyCursor | Self::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            Self::InvariantViolation { .. } => ErrorKind::CorruptHeader,
        }
    }

    /// Whether this is an ordinary outcome rather than a fault.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound | Self::EndOfTraversal)
    }
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pager(e) => write!(f, "pager error: {e}"),
            Self::Node(e) => write!(f, "node error: {e}"),
            Self::Duplicate(key) => write!(f, "duplicate key: {key}"),
            Self::NotFound => write!(f, "key not found"),
            Self::EndOfTraversal => write!(f, "end of traversal"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload of {size} bytes exceeds the {max} byte limit")
            }
            Self::ReadOnlyCursor => write!(f, "cursor is read-only"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::InvariantViolation { page, message } => {
                write!(f, "invariant violated on page {page}: {message}")
            }
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pager(e) => Some(e),
            Self::Node(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PagerError> for BTreeError {
    fn from(e: PagerError) -> Self {
        Self::Pager(e)
    }
}

impl From<NodeError> for BTreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}
