//! Test forward and reverse traversal across leaf boundaries.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::btree::{BTreeError, Cursor, CursorMode, Key, NodeKind, SeekMode};
use crate::e2e_tests::helpers::*;
use crate::storage::PageStore;

fn shuffled_db(count: Key, seed: u64) -> TestDb {
    let mut db = TestDb::with_page_size(512);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys: Vec<Key> = (0..count).map(|i| i * 2).collect();
    keys.shuffle(&mut rng);
    for key in keys {
        db.tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }
    db
}

#[test]
fn test_forward_and_reverse_agree() {
    let mut db = shuffled_db(1000, 3);

    let forward = db.keys(1);
    let mut reverse = db.keys_reversed(1);
    reverse.reverse();

    assert_eq!(forward, (0..1000).map(|i| i * 2).collect::<Vec<Key>>());
    assert_eq!(forward, reverse);
}

#[test]
fn test_ends_keep_the_cursor_in_place() {
    let mut db = shuffled_db(300, 4);
    let mut cursor = Cursor::new(&mut db.tree, 1, CursorMode::Read).unwrap();

    cursor.rewind(&mut db.tree).unwrap();
    assert!(matches!(
        cursor.prev(&mut db.tree),
        Err(BTreeError::EndOfTraversal)
    ));
    assert_eq!(cursor.key().unwrap(), 0);
    cursor.next(&mut db.tree).unwrap();
    assert_eq!(cursor.key().unwrap(), 2);

    cursor.seek(&mut db.tree, 598, SeekMode::Eq).unwrap();
    for _ in 0..3 {
        let err = cursor.next(&mut db.tree).unwrap_err();
        assert!(err.is_expected());
        assert_eq!(cursor.key().unwrap(), 598);
    }
    cursor.prev(&mut db.tree).unwrap();
    assert_eq!(cursor.key().unwrap(), 596);
    cursor.destroy(&mut db.tree);
}

#[test]
fn test_cursor_trail_spans_the_tree_depth() {
    let mut db = shuffled_db(2000, 5);
    let depth = db.tree.verify(1).unwrap().depth;
    assert!(depth >= 3);

    let mut cursor = Cursor::new(&mut db.tree, 1, CursorMode::Read).unwrap();
    assert_eq!(cursor.depth(), 1);
    cursor.rewind(&mut db.tree).unwrap();
    assert_eq!(cursor.depth(), depth);
    cursor.seek(&mut db.tree, 1999, SeekMode::Le).unwrap();
    assert_eq!(cursor.depth(), depth);
    assert_eq!(cursor.key().unwrap(), 1998);
    cursor.destroy(&mut db.tree);

    let pool = db.tree.store().buffer_pool();
    assert_eq!(pool.available(), pool.capacity());
}

#[test]
fn test_interleaved_cursors_on_two_trees() {
    let mut db = TestDb::new();
    let second = db.tree.create_tree(NodeKind::TableLeaf).unwrap();
    for key in 0..400 {
        db.tree.insert_in_table(1, key, b"a").unwrap();
        db.tree.insert_in_table(second, 1000 + key, b"b").unwrap();
    }

    let mut up = Cursor::new(&mut db.tree, 1, CursorMode::Read).unwrap();
    let mut down = Cursor::new(&mut db.tree, second, CursorMode::Read).unwrap();
    up.rewind(&mut db.tree).unwrap();
    down.seek(&mut db.tree, Key::MAX, SeekMode::Le).unwrap();

    for step in 0..399 {
        assert_eq!(up.key().unwrap(), step);
        assert_eq!(down.key().unwrap(), 1399 - step);
        up.next(&mut db.tree).unwrap();
        down.prev(&mut db.tree).unwrap();
    }
    assert_eq!(up.key().unwrap(), 399);
    assert_eq!(down.key().unwrap(), 1000);

    up.destroy(&mut db.tree);
    down.destroy(&mut db.tree);
}
