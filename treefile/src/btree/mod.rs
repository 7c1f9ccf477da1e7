//! B-tree layer.
//!
//! Trees come in two families that share one node layout:
//!
//! - Table trees: row id keys with a byte payload stored in the leaves
//! - Index trees: index keys paired with the primary key they point at
//!
//! Internal nodes hold separator cells whose key is the largest key of the
//! child they point at; keys greater than every separator live below the
//! right child.
//!
//! # Usage
//!
//! ```
//! use treefile::btree::{BTree, Cursor, CursorMode, SeekMode};
//! use treefile::storage::{BufferPool, DEFAULT_PAGE_SIZE, MemoryPager};
//!
//! let store = MemoryPager::new(BufferPool::new(16), 0);
//! let mut tree = BTree::from_store(store, DEFAULT_PAGE_SIZE).unwrap();
//! tree.insert_in_table(1, 42, b"answer").unwrap();
//!
//! let mut cursor = Cursor::new(&mut tree, 1, CursorMode::Read).unwrap();
//! cursor.seek(&mut tree, 40, SeekMode::Ge).unwrap();
//! assert_eq!(cursor.key().unwrap(), 42);
//! cursor.destroy(&mut tree);
//! ```

mod cell;
mod check;
mod cursor;
mod node;
mod tree;

pub use cell::{
    Cell, INDEX_CELL_MARKER, INDEX_INTERNAL_CELL_SIZE, INDEX_LEAF_CELL_SIZE, Key,
    TABLE_INTERNAL_CELL_SIZE, TABLE_LEAF_CELL_HEADER_SIZE,
};
pub use check::TreeStats;
pub use cursor::{Cursor, CursorMode, SeekMode};
pub use node::{Node, NodeError, NodeKind, header_offset};
pub use tree::{BTree, BTreeError, ErrorKind};
