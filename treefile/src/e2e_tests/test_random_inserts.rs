//! Test many inserts in a random order.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::btree::{ErrorKind, Key};
use crate::e2e_tests::helpers::*;
use crate::storage::PageStore;

const COUNT: Key = 2048;

#[test]
fn test_random_inserts_scan_and_find() {
    let mut db = TestDb::new();
    let mut rng = StdRng::seed_from_u64(2048);

    // Keys are 1 mod 3, leaving multiples of 3 absent.
    let mut keys: Vec<Key> = (0..COUNT).map(|i| i * 3 + 1).collect();
    keys.shuffle(&mut rng);
    for &key in &keys {
        db.tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }

    keys.sort_unstable();
    assert_eq!(db.keys(1), keys);

    for &key in &keys {
        assert_eq!(db.tree.find(1, key).unwrap(), payload_for(key));
    }
    for absent in (0..10).map(|i| i * 300) {
        let err = db.tree.find(1, absent).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let stats = db.tree.verify(1).unwrap();
    assert_eq!(stats.entries, keys.len());
    assert!(stats.depth >= 2);
    let pool = db.tree.store().buffer_pool();
    assert_eq!(pool.available(), pool.capacity());
}

#[test]
fn test_random_inserts_small_pages() {
    let mut db = TestDb::with_page_size(512);
    let mut rng = StdRng::seed_from_u64(512);

    let mut keys: Vec<Key> = (0..COUNT).collect();
    keys.shuffle(&mut rng);
    for &key in &keys {
        db.tree.insert_in_table(1, key, &payload_for(key)).unwrap();
    }

    assert_eq!(db.keys(1), (0..COUNT).collect::<Vec<_>>());
    assert!(db.tree.verify(1).unwrap().depth >= 3);
}
