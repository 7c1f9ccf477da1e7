#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
// A database file is a set of B-trees sharing one page space:
//  - Storage: fixed-size pages read and written through a `PageStore`, with
//    page buffers leased from a bounded pool
//  - B-tree: node and cell codec, find, insert with splitting, verification
//  - Cursors: trail-based traversal and seeking within a single tree
//
// Page 1 carries the file header and the root of the first table tree.

pub mod btree;
pub mod config;
pub mod storage;

#[cfg(test)]
mod e2e_tests;

pub use btree::{BTree, BTreeError, Cell, Cursor, CursorMode, ErrorKind, Key, NodeKind, SeekMode};
pub use config::{ConfigError, EngineConfig};
