//! Test that duplicate keys are refused without changing the tree.

use crate::btree::{BTreeError, ErrorKind, Key, NodeKind};
use crate::e2e_tests::helpers::*;

#[test]
fn test_duplicate_row_keys() {
    let mut db = TestDb::with_page_size(512);
    for key in 0..500 {
        db.tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }

    for key in [0, 1, 250, 499] {
        let err = db.tree.insert_in_table(1, key, b"replacement").unwrap_err();
        assert!(matches!(err, BTreeError::Duplicate(k) if k == key));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(!err.is_expected());
    }

    assert_eq!(db.keys(1), (0..500).collect::<Vec<Key>>());
    assert_eq!(db.tree.find(1, 250).unwrap(), payload_for(250));
    assert_eq!(db.tree.verify(1).unwrap().entries, 500);
}

#[test]
fn test_duplicate_index_keys() {
    let mut db = TestDb::new();
    let index = db.tree.create_tree(NodeKind::IndexLeaf).unwrap();
    for key in 0..300 {
        db.tree.insert_in_index(index, key, key).unwrap();
    }

    let err = db.tree.insert_in_index(index, 120, 9999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert_eq!(db.tree.find_in_index(index, 120).unwrap(), 120);
}

#[test]
fn test_same_key_in_different_trees() {
    let mut db = TestDb::new();
    let other = db.tree.create_tree(NodeKind::TableLeaf).unwrap();

    db.tree.insert_in_table(1, 7, b"first").unwrap();
    db.tree.insert_in_table(other, 7, b"second").unwrap();

    assert_eq!(db.tree.find(1, 7).unwrap(), b"first");
    assert_eq!(db.tree.find(other, 7).unwrap(), b"second");
}
