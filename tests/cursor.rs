use std::collections::BTreeMap;

use leafline::{BPlusTree, BidirectionalCursor};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn tree_of(order: usize, keys: impl IntoIterator<Item = i32>) -> BPlusTree<i32, i32> {
    let mut tree = BPlusTree::new(order);
    for key in keys {
        tree.insert(key, key * 10).unwrap();
    }
    tree
}

/// Collects keys by stepping `cursor` forward until it reaches the end position.
fn drain_keys<C: BidirectionalCursor<Key = i32>>(mut cursor: C) -> Vec<i32> {
    let mut keys = Vec::new();
    while let Some(&key) = cursor.key() {
        keys.push(key);
        cursor.move_next();
    }
    keys
}

// ─── Forward and reverse walks ───────────────────────────────────────────────

#[test]
fn forward_walk_visits_every_key() {
    let tree = tree_of(3, 1..=20);
    assert_eq!(drain_keys(tree.cursor_first()), (1..=20).collect::<Vec<_>>());
}

#[test]
fn reverse_walk_visits_every_key() {
    let tree = tree_of(4, 1..=20);
    assert_eq!(drain_keys(tree.rev_cursor()), (1..=20).rev().collect::<Vec<_>>());
}

#[test]
fn backward_walk_from_end() {
    let tree = tree_of(5, 0..50);
    let mut cursor = tree.cursor_end();
    let mut keys = Vec::new();
    loop {
        cursor.move_prev();
        match cursor.key() {
            Some(&key) => keys.push(key),
            None => break,
        }
    }
    assert_eq!(keys, (0..50).rev().collect::<Vec<_>>());
}

// ─── End position ────────────────────────────────────────────────────────────

#[test]
fn end_position_wraps_around() {
    let tree = tree_of(3, [10, 20, 30]);

    let mut cursor = tree.cursor_end();
    cursor.move_prev();
    assert_eq!(cursor.key_value(), Some((&30, &300)));
    cursor.move_next();
    assert!(cursor.is_end());
    cursor.move_next();
    assert_eq!(cursor.key(), Some(&10));
    cursor.move_prev();
    assert_eq!(cursor, tree.cursor_end());
}

#[test]
fn reverse_end_is_before_first() {
    let tree = tree_of(3, [1, 2, 3]);

    let mut cursor = tree.rev_cursor();
    cursor.move_next();
    cursor.move_next();
    assert_eq!(cursor.key(), Some(&1));
    cursor.move_next();
    assert_eq!(cursor, tree.rev_cursor_end());
    cursor.move_prev();
    assert_eq!(cursor.key(), Some(&1));
}

#[test]
fn empty_tree_has_only_the_end_position() {
    let tree: BPlusTree<i32, i32> = BPlusTree::new(3);
    let mut cursor = tree.cursor_first();
    assert!(cursor.is_end());
    assert_eq!(cursor, tree.cursor_last());
    cursor.move_next();
    assert!(cursor.is_end());
    cursor.move_prev();
    assert!(cursor.is_end());
    assert_eq!(tree.lower_bound(&0), tree.cursor_end());
}

// ─── Equality and distance ───────────────────────────────────────────────────

#[test]
fn equal_cursors_name_the_same_entry() {
    let tree = tree_of(3, 0..30);
    let mut walked = tree.cursor_first();
    for _ in 0..17 {
        walked.move_next();
    }
    assert_eq!(walked, tree.lower_bound(&17));
    assert_eq!(walked.position(), tree.lower_bound(&17).position());
    assert_ne!(walked, tree.lower_bound(&18));
}

#[test]
fn distance_counts_steps_forward() {
    let tree = tree_of(4, 0..100);
    let first = tree.cursor_first();
    assert_eq!(first.distance_to(&first), Some(0));
    assert_eq!(first.distance_to(&tree.lower_bound(&42)), Some(42));
    assert_eq!(first.distance_to(&tree.cursor_end()), Some(100));
    assert_eq!(tree.lower_bound(&42).distance_to(&first), None);
}

// ─── Lower bound ─────────────────────────────────────────────────────────────

#[test]
fn lower_bound_lands_on_next_key() {
    let tree = tree_of(3, (0..40).step_by(4));
    assert_eq!(tree.lower_bound(&-5).key(), Some(&0));
    assert_eq!(tree.lower_bound(&8).key(), Some(&8));
    assert_eq!(tree.lower_bound(&9).key(), Some(&12));
    assert_eq!(tree.lower_bound(&36).key(), Some(&36));
    assert!(tree.lower_bound(&37).is_end());
}

// ─── Mutable cursors ─────────────────────────────────────────────────────────

#[test]
fn mutable_cursor_updates_values_in_place() {
    let mut tree = tree_of(3, 0..20);
    let mut cursor = tree.cursor_first_mut();
    while let Some((key, value)) = cursor.key_value_mut() {
        *value = -key;
        cursor.move_next();
    }
    assert!(tree.iter().all(|(k, v)| *v == -k));
    assert!(tree.validate());
}

#[test]
fn reversed_mutable_cursor_walks_backward() {
    let mut tree = tree_of(4, 0..10);
    let mut cursor = tree.rev_cursor_mut();
    let mut rank = 0;
    while let Some(value) = cursor.value_mut() {
        *value = rank;
        rank += 1;
        cursor.move_next();
    }
    let values: Vec<i32> = tree.values().copied().collect();
    assert_eq!(values, (0..10).rev().collect::<Vec<_>>());
}

#[test]
fn end_mutable_cursor_wraps_to_last() {
    let mut tree = tree_of(3, 0..5);
    let mut cursor = tree.cursor_end_mut();
    assert_eq!(cursor.value_mut(), None);
    cursor.move_prev();
    *cursor.value_mut().unwrap() = 7;
    assert_eq!(tree.search(&4), Some(&7));
}

// ─── Against BTreeMap ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Walking from `lower_bound` matches `BTreeMap::range(key..)` in both directions.
    #[test]
    fn lower_bound_walks_match_btreemap(
        order in 3usize..=8,
        keys in proptest::collection::btree_set(-500i32..500, 0..400),
        probes in proptest::collection::vec(-600i32..600, 20),
    ) {
        let tree = tree_of(order, keys.iter().copied());
        let model: BTreeMap<i32, i32> = keys.iter().map(|&k| (k, k * 10)).collect();

        for probe in probes {
            let expected: Vec<i32> = model.range(probe..).map(|(k, _)| *k).collect();
            prop_assert_eq!(drain_keys(tree.lower_bound(&probe)), expected);

            // Stepping back from lower_bound reaches everything below the probe.
            let mut cursor = tree.lower_bound(&probe);
            let mut below = Vec::new();
            loop {
                cursor.move_prev();
                match cursor.key() {
                    Some(&key) => below.push(key),
                    None => break,
                }
            }
            let expected: Vec<i32> = model.range(..probe).rev().map(|(k, _)| *k).collect();
            prop_assert_eq!(below, expected);
        }
    }
}
