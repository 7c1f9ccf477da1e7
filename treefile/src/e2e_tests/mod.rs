//! End-to-end tests over real database files.
//!
//! Each test file covers a specific scenario, using seeded inputs so every
//! run sees the same insertion orders and faults.

#![cfg(test)]

mod helpers;

mod test_duplicates;
mod test_faults;
mod test_index_trees;
mod test_random_inserts;
mod test_seek_modes;
mod test_traversal;
