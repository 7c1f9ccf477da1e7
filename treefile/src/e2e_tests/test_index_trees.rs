//! Test index trees alongside table trees in one file.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::btree::{Cell, Cursor, CursorMode, ErrorKind, Key, NodeKind, SeekMode};
use crate::e2e_tests::helpers::*;

#[test]
fn test_index_maps_keys_to_primary_keys() {
    let mut db = TestDb::new();
    let index = db.tree.create_tree(NodeKind::IndexLeaf).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let mut rows: Vec<Key> = (0..1500).collect();
    rows.shuffle(&mut rng);
    for &row in &rows {
        db.tree.insert_in_table(1, row, &payload_for(row)).unwrap();
        // Index on a derived column, unique per row.
        db.tree.insert_in_index(index, row * 7 + 3, row).unwrap();
    }

    for row in 0..1500 {
        let primary_key = db.tree.find_in_index(index, row * 7 + 3).unwrap();
        assert_eq!(db.tree.find(1, primary_key).unwrap(), payload_for(row));
    }
    assert_eq!(
        db.tree.find_in_index(index, 4).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let stats = db.tree.verify(index).unwrap();
    assert_eq!(stats.entries, 1500);
    assert!(stats.depth >= 2);
}

#[test]
fn test_index_range_scan() {
    let mut db = TestDb::with_page_size(512);
    let index = db.tree.create_tree(NodeKind::IndexLeaf).unwrap();
    for key in (0..600).rev() {
        db.tree.insert_in_index(index, key * 10, key).unwrap();
    }

    // Entries with index key in [1005, 1100].
    let mut cursor = Cursor::new(&mut db.tree, index, CursorMode::Read).unwrap();
    cursor.seek(&mut db.tree, 1005, SeekMode::Ge).unwrap();
    let mut primary_keys = Vec::new();
    loop {
        match cursor.current().unwrap() {
            Cell::IndexLeaf { key, primary_key } if key <= 1100 => primary_keys.push(primary_key),
            _ => break,
        }
        cursor.next(&mut db.tree).unwrap();
    }
    cursor.destroy(&mut db.tree);

    assert_eq!(primary_keys, (101..=110).collect::<Vec<Key>>());
}

#[test]
fn test_index_keys_use_the_full_key_range() {
    let mut db = TestDb::new();
    let index = db.tree.create_tree(NodeKind::IndexLeaf).unwrap();

    for key in [0, 1, u32::MAX - 1, u32::MAX, 0x8000_0000] {
        db.tree.insert_in_index(index, key, 9).unwrap();
    }
    assert_eq!(db.keys(index), [0, 1, 0x8000_0000, u32::MAX - 1, u32::MAX]);
    assert_eq!(db.tree.find_in_index(index, u32::MAX).unwrap(), 9);
}

#[test]
fn test_table_lookup_in_index_is_rejected() {
    let mut db = TestDb::new();
    db.tree.insert_in_table(1, 5, b"five").unwrap();

    let err = db.tree.find_in_index(1, 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
