//! Common helpers for end-to-end tests.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;

use crate::btree::{BTree, BTreeError, Cursor, CursorMode, Key, SeekMode};
use crate::config::EngineConfig;
use crate::storage::{FilePager, PageNumber};

/// Counter for generating unique test database names.
static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An open database file that is removed with its directory on drop.
pub struct TestDb {
    pub tree: BTree<FilePager>,
    config: EngineConfig,
    _dir: TempDir,
}

impl TestDb {
    /// Create a fresh database with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a fresh database with `page_size` pages.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_config(EngineConfig {
            page_size,
            ..EngineConfig::default()
        })
    }

    /// Create a fresh database whose pool leases at most `capacity` pages.
    #[must_use]
    pub fn with_pool_capacity(capacity: usize) -> Self {
        Self::with_config(EngineConfig {
            buffer_pool_capacity: capacity,
            ..EngineConfig::default()
        })
    }

    fn with_config(mut config: EngineConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let instance_id = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        config.database_path = dir.path().join(format!("e2e_test_{instance_id}.db"));

        let tree =
            BTree::open(&config.database_path, &config).expect("Failed to create test database");
        Self {
            tree,
            config,
            _dir: dir,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.database_path
    }

    /// Close the file and open it again.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self { tree, config, _dir } = self;
        tree.close().expect("Failed to close test database");
        let tree =
            BTree::open(&config.database_path, &config).expect("Failed to reopen test database");
        Self { tree, config, _dir }
    }

    /// Close the file, leaving it on disk until the helper is dropped.
    pub fn close(self) -> ClosedDb {
        let Self { tree, config, _dir } = self;
        tree.close().expect("Failed to close test database");
        ClosedDb { config, _dir }
    }

    /// Every key of a tree in ascending order.
    pub fn keys(&mut self, root: PageNumber) -> Vec<Key> {
        collect_keys(&mut self.tree, root, false)
    }

    /// Every key of a tree in descending order.
    pub fn keys_reversed(&mut self, root: PageNumber) -> Vec<Key> {
        collect_keys(&mut self.tree, root, true)
    }

    /// Key the cursor lands on after a seek, or the error kind.
    pub fn seek(
        &mut self,
        root: PageNumber,
        key: Key,
        mode: SeekMode,
    ) -> Result<Key, crate::btree::ErrorKind> {
        let mut cursor =
            Cursor::new(&mut self.tree, root, CursorMode::Read).expect("Failed to open cursor");
        let landed = cursor
            .seek(&mut self.tree, key, mode)
            .and_then(|()| cursor.key())
            .map_err(|e| e.kind());
        cursor.destroy(&mut self.tree);
        landed
    }
}

/// A database file that has been closed.
pub struct ClosedDb {
    config: EngineConfig,
    _dir: TempDir,
}

impl ClosedDb {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.database_path
    }

    /// Try to open the file again.
    pub fn open(&self) -> Result<BTree<FilePager>, BTreeError> {
        BTree::open(&self.config.database_path, &self.config)
    }

    /// Rewrite bytes of the file in place.
    pub fn patch(&self, offset: usize, bytes: &[u8]) {
        let mut image = std::fs::read(self.path()).expect("Failed to read test database");
        image[offset..offset + bytes.len()].copy_from_slice(bytes);
        std::fs::write(self.path(), image).expect("Failed to write test database");
    }
}

/// Walk a tree with a fresh cursor, collecting its keys.
pub fn collect_keys<S: crate::storage::PageStore>(
    tree: &mut BTree<S>,
    root: PageNumber,
    reverse: bool,
) -> Vec<Key> {
    let mut cursor = Cursor::new(tree, root, CursorMode::Read).expect("Failed to open cursor");
    let start = if reverse {
        cursor.seek(tree, Key::MAX, SeekMode::Le)
    } else {
        cursor.rewind(tree)
    };

    let mut keys = Vec::new();
    match start {
        Ok(()) => loop {
            keys.push(cursor.key().expect("cursor should be on an entry"));
            let step = if reverse {
                cursor.prev(tree)
            } else {
                cursor.next(tree)
            };
            match step {
                Ok(()) => {}
                Err(BTreeError::EndOfTraversal) => break,
                Err(e) => panic!("traversal failed: {e}"),
            }
        },
        Err(BTreeError::NotFound) => {}
        Err(e) => panic!("positioning failed: {e}"),
    }
    cursor.destroy(tree);
    keys
}

/// Deterministic payload for a row key.
#[must_use]
pub fn payload_for(key: Key) -> Vec<u8> {
    format!("row-{key}-{}", "x".repeat((key % 40) as usize)).into_bytes()
}
