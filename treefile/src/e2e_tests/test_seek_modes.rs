//! Test every seek mode against a tree with gaps between its keys.

use crate::btree::{Cursor, CursorMode, ErrorKind, Key, NodeKind, SeekMode};
use crate::e2e_tests::helpers::*;
use crate::storage::PageNumber;

const KEYS: [Key; 12] = [1, 2, 3, 7, 10, 15, 20, 35, 37, 42, 127, 1000];

/// Expected landing key for `(target, mode)`, `None` meaning `NotFound`.
const CASES: &[(Key, SeekMode, Option<Key>)] = &[
    (10, SeekMode::Eq, Some(10)),
    (7, SeekMode::Eq, Some(7)),
    (8, SeekMode::Eq, None),
    (1000, SeekMode::Eq, Some(1000)),
    (0, SeekMode::Eq, None),
    (5, SeekMode::Ge, Some(7)),
    (0, SeekMode::Ge, Some(1)),
    (8, SeekMode::Ge, Some(10)),
    (43, SeekMode::Ge, Some(127)),
    (1000, SeekMode::Ge, Some(1000)),
    (1001, SeekMode::Ge, None),
    (10, SeekMode::Gt, Some(15)),
    (0, SeekMode::Gt, Some(1)),
    (7, SeekMode::Gt, Some(10)),
    (42, SeekMode::Gt, Some(127)),
    (999, SeekMode::Gt, Some(1000)),
    (1000, SeekMode::Gt, None),
    (5, SeekMode::Le, Some(3)),
    (0, SeekMode::Le, None),
    (1, SeekMode::Le, Some(1)),
    (8, SeekMode::Le, Some(7)),
    (126, SeekMode::Le, Some(42)),
    (5000, SeekMode::Le, Some(1000)),
    (1, SeekMode::Lt, None),
    (2, SeekMode::Lt, Some(1)),
    (10, SeekMode::Lt, Some(7)),
    (36, SeekMode::Lt, Some(35)),
    (1001, SeekMode::Lt, Some(1000)),
];

fn check_cases(db: &mut TestDb, root: PageNumber) {
    for &(target, mode, expected) in CASES {
        let landed = db.seek(root, target, mode);
        match expected {
            Some(key) => assert_eq!(landed, Ok(key), "seek {mode:?} {target}"),
            None => assert_eq!(landed, Err(ErrorKind::NotFound), "seek {mode:?} {target}"),
        }
    }
}

#[test]
fn test_seek_modes_table_tree() {
    // Payloads near the 512-byte limit spread the keys over several leaves.
    let mut db = TestDb::with_page_size(512);
    for key in KEYS {
        db.tree.insert_in_table(1, key, &[0xAB; 80]).unwrap();
    }
    assert!(db.tree.verify(1).unwrap().depth >= 2);

    check_cases(&mut db, 1);
}

#[test]
fn test_seek_modes_index_tree() {
    let mut db = TestDb::with_page_size(512);
    let root = db.tree.create_tree(NodeKind::IndexLeaf).unwrap();
    for key in KEYS {
        db.tree.insert_in_index(root, key, key + 5000).unwrap();
    }

    check_cases(&mut db, root);
}

#[test]
fn test_traversal_continues_after_seek() {
    let mut db = TestDb::with_page_size(512);
    for key in KEYS {
        db.tree.insert_in_table(1, key, &[0; 80]).unwrap();
    }

    let mut cursor = Cursor::new(&mut db.tree, 1, CursorMode::Read).unwrap();
    cursor.seek(&mut db.tree, 8, SeekMode::Ge).unwrap();
    let mut after = vec![cursor.key().unwrap()];
    while cursor.next(&mut db.tree).is_ok() {
        after.push(cursor.key().unwrap());
    }
    assert_eq!(after, [10, 15, 20, 35, 37, 42, 127, 1000]);

    cursor.seek(&mut db.tree, 36, SeekMode::Lt).unwrap();
    let mut before = vec![cursor.key().unwrap()];
    while cursor.prev(&mut db.tree).is_ok() {
        before.push(cursor.key().unwrap());
    }
    assert_eq!(before, [35, 20, 15, 10, 7, 3, 2, 1]);
    cursor.destroy(&mut db.tree);
}

#[test]
fn test_seek_on_empty_tree() {
    let mut db = TestDb::new();
    for mode in [
        SeekMode::Eq,
        SeekMode::Ge,
        SeekMode::Gt,
        SeekMode::Le,
        SeekMode::Lt,
    ] {
        assert_eq!(db.seek(1, 10, mode), Err(ErrorKind::NotFound));
    }
}
