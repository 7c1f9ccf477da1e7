//! Test buffer-pool exhaustion, leak-freedom and injected I/O faults.

use crate::btree::{BTree, BTreeError, Cursor, CursorMode, ErrorKind, Key, SeekMode};
use crate::e2e_tests::helpers::*;
use crate::storage::{BufferPool, FaultConfig, MemoryPager, PageStore};

fn memory_tree(capacity: usize, seed: u64) -> BTree<MemoryPager> {
    let store = MemoryPager::new(BufferPool::new(capacity), seed);
    BTree::from_store(store, 1024).unwrap()
}

fn assert_no_leaks<S: PageStore>(tree: &BTree<S>) {
    let pool = tree.store().buffer_pool();
    assert_eq!(pool.available(), pool.capacity());
}

#[test]
fn test_exhausted_pool_fails_the_split() {
    let mut db = TestDb::with_pool_capacity(2);

    let mut inserted = 0;
    let err = loop {
        match db.tree.insert_in_table(1, inserted, &payload_for(inserted)) {
            Ok(()) => inserted += 1,
            Err(e) => break e,
        }
    };
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    assert_no_leaks(&db.tree);

    // Rows that made it in are still readable with two buffers.
    for key in 0..inserted {
        assert_eq!(db.tree.find(1, key).unwrap(), payload_for(key));
    }
}

#[test]
fn test_cursor_frames_count_against_the_pool() {
    let mut tree = memory_tree(8, 1);
    for key in 0..1000 {
        tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }
    let depth = tree.verify(1).unwrap().depth;

    let mut cursor = Cursor::new(&mut tree, 1, CursorMode::Read).unwrap();
    cursor.rewind(&mut tree).unwrap();
    assert_eq!(tree.store().buffer_pool().available(), 8 - depth);

    // A second cursor is refused once the pool runs dry.
    let mut cursors = Vec::new();
    let err = loop {
        let mut extra = match Cursor::new(&mut tree, 1, CursorMode::Read) {
            Ok(extra) => extra,
            Err(e) => break e,
        };
        if let Err(e) = extra.rewind(&mut tree) {
            cursors.push(extra);
            break e;
        }
        cursors.push(extra);
    };
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);

    cursor.destroy(&mut tree);
    for extra in cursors {
        extra.destroy(&mut tree);
    }
    assert_no_leaks(&tree);
}

#[test]
fn test_no_leaks_after_mixed_workload() {
    let mut tree = memory_tree(16, 2);
    for key in (0..800).rev() {
        tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }

    assert!(matches!(
        tree.insert_in_table(1, 5, b"dup"),
        Err(BTreeError::Duplicate(5))
    ));
    assert!(matches!(tree.find(1, 5000), Err(BTreeError::NotFound)));
    assert_eq!(
        tree.find(100_000, 1).unwrap_err().kind(),
        ErrorKind::InvalidPageNumber
    );

    let mut cursor = Cursor::new(&mut tree, 1, CursorMode::Read).unwrap();
    assert!(cursor.seek(&mut tree, 9000, SeekMode::Ge).is_err());
    cursor.seek(&mut tree, 400, SeekMode::Lt).unwrap();
    while cursor.next(&mut tree).is_ok() {}
    cursor.destroy(&mut tree);

    tree.verify(1).unwrap();
    assert_no_leaks(&tree);
}

#[test]
fn test_injected_write_faults_surface_as_io_errors() {
    let mut tree = memory_tree(32, 3);
    tree.store_mut().set_fault_config(FaultConfig {
        write_error_rate: 0.05,
        ..FaultConfig::default()
    });

    let mut failures = 0;
    for key in 0..400 {
        if let Err(e) = tree.insert_in_table(1, key, &payload_for(key)) {
            assert_eq!(e.kind(), ErrorKind::IoError, "insert {key}: {e}");
            failures += 1;
        }
    }

    assert!(failures > 0);
    assert_eq!(tree.store().stats().injected_write_errors, failures);
    assert_no_leaks(&tree);
}

#[test]
fn test_injected_read_faults_do_not_change_data() {
    let mut tree = memory_tree(32, 4);
    for key in 0..500 {
        tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }

    tree.store_mut().set_fault_config(FaultConfig {
        read_error_rate: 0.2,
        ..FaultConfig::default()
    });
    let mut failures = 0;
    for key in 0..500 {
        match tree.find(1, key) {
            Ok(payload) => assert_eq!(payload, payload_for(key)),
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::IoError);
                failures += 1;
            }
        }
    }
    assert!(failures > 0);

    tree.store_mut().set_fault_config(FaultConfig::no_faults());
    assert_eq!(collect_keys(&mut tree, 1, false), (0..500).collect::<Vec<Key>>());
    assert_no_leaks(&tree);
}

#[test]
fn test_failing_sync_fails_close() {
    let mut tree = memory_tree(8, 5);
    tree.insert_in_table(1, 1, b"x").unwrap();
    tree.store_mut().set_fault_config(FaultConfig {
        sync_error_rate: 1.0,
        ..FaultConfig::default()
    });

    let err = tree.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoError);
}
