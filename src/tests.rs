extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }
    tree
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);
    assert_eq!(tree.len(), keys.len());

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);

    let tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.get(&3).is_none());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.height(), -1);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let (removed, _) = unsafe { tree.delete(node) };
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let (removed, _) = tree.remove(key).expect("item not found");
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn ascending_inserts_stay_balanced() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    let mut acts = Vec::new();

    for key in 1..=7 {
        acts.push(tree.insert(TestNode::new(key)));
        tree.assert_invariants();
    }

    assert_eq!(acts, vec![0, 1, 2, 2, 2, 3, 2]);
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.len(), 7);
    assert_eq!(tree.get(&4).map(|node| node.links.height()), Some(2));
    assert_eq!(keys(&tree), (1..=7).collect::<Vec<_>>());
}

#[test]
fn insert_double_rotation() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    assert_eq!(tree.insert(TestNode::new(3)), 0);
    assert_eq!(tree.insert(TestNode::new(1)), 1);
    // 1 is light on the left, so the imbalance at 3 needs a double rotation.
    assert_eq!(tree.insert(TestNode::new(2)), 3);

    tree.assert_invariants();
    assert_eq!(tree.first().map(|node| node.key), Some(1));
    assert_eq!(tree.select(1).map(|node| node.key), Some(2));
    assert_eq!(tree.get(&2).map(|node| node.links.size()), Some(3));
}

#[test]
fn insert_stops_at_stable_height() {
    let mut tree = tree_of(&[4, 2, 6]);

    // Filling a gap under a node with one child leaves the root's height unchanged.
    assert_eq!(tree.insert(TestNode::new(1)), 2);
    assert_eq!(tree.insert(TestNode::new(3)), 0);
    tree.assert_invariants();
}

#[test]
fn delete_successor_is_right_child() {
    let mut tree = tree_of(&[3, 2, 4, 1, 5]);

    let (removed, acts) = tree.remove(&3).expect("key is present");
    tree.assert_invariants();

    assert_eq!(removed.key, 3);
    assert_eq!(acts, 1);
    assert_eq!(keys(&tree), vec![1, 2, 4, 5]);
    assert_eq!(tree.root.map(|root| unsafe { root.as_ref().key }), Some(4));
}

#[test]
fn delete_successor_deep_in_right_subtree() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    let (removed, _) = tree.remove(&4).expect("key is present");
    tree.assert_invariants();

    assert_eq!(removed.key, 4);
    assert_eq!(tree.root.map(|root| unsafe { root.as_ref().key }), Some(5));
    assert_eq!(keys(&tree), vec![1, 2, 3, 5, 6, 7]);
}

#[test]
fn delete_rotates_on_balanced_heavy_child() {
    let mut tree = tree_of(&[1, 2, 3, 4, 5]);

    // Removing 1 leaves 2 right-heavy over a perfectly balanced child: a single rotation.
    let (_, acts) = tree.remove(&1).expect("key is present");
    tree.assert_invariants();

    assert_eq!(acts, 1);
    assert_eq!(tree.root.map(|root| unsafe { root.as_ref().key }), Some(4));
    assert_eq!(keys(&tree), vec![2, 3, 4, 5]);
}

#[test]
fn delete_rebalances_up_to_root() {
    // A Fibonacci-shaped tree: deleting its shallowest leaf forces rotations at several levels.
    let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
    let height = tree.height();

    assert_eq!(height, 4);

    let (_, acts) = tree.remove(&12).expect("key is present");
    tree.assert_invariants();

    // One single rotation at 11, then another at the root; no height change is counted above
    // either rotation.
    assert_eq!(acts, 2);
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.root.map(|root| unsafe { root.as_ref().key }), Some(5));
    assert_eq!(keys(&tree), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn key_of_node_outlives_lookup() {
    let tree = tree_of(&[2, 1, 3]);
    let node = tree.get_raw(&3).expect("key is present");

    let found: &u32 = unsafe { key(node) };
    assert_eq!(*found, 3);
    assert_eq!(unsafe { key::<TestNode>(tree.root.expect("tree is not empty")) }, &2);
}

#[test]
fn split_join_inverse() {
    let all: Vec<u32> = (0..64).map(|k| k * 7 % 64).collect();

    for &pivot in &all {
        let mut tree = tree_of(&all);
        let expected = keys(&tree);

        let (mut less, node, greater) = tree.split_at(&pivot).expect("key is present");
        less.assert_invariants();
        greater.assert_invariants();

        assert_eq!(keys(&less), (0..pivot).collect::<Vec<_>>());
        assert_eq!(keys(&greater), (pivot + 1..64).collect::<Vec<_>>());

        let cost = less.join(greater, node);
        less.assert_invariants();

        assert!(cost >= 1);
        assert_eq!(keys(&less), expected);
    }
}

#[test]
fn join_orders_separator_between_trees() {
    let mut a = tree_of(&[1, 3, 5, 7, 9]);
    let b = tree_of(&[11, 13, 15, 17, 19, 21, 23, 25]);
    let expected_cost = usize::from(a.height().abs_diff(b.height())) + 1;

    let cost = a.join(b, TestNode::new(10));
    a.assert_invariants();

    assert_eq!(cost, expected_cost);
    assert_eq!(
        keys(&a),
        vec![1, 3, 5, 7, 9, 10, 11, 13, 15, 17, 19, 21, 23, 25]
    );
    assert_eq!(a.rank(&10), 5);
}

#[test]
fn join_empty_trees() {
    let mut a: AvlTree<TestNode> = AvlTree::new();
    assert_eq!(a.join(AvlTree::new(), TestNode::new(1)), 1);
    a.assert_invariants();
    assert_eq!(keys(&a), vec![1]);

    let mut b = tree_of(&[5, 6, 7]);
    assert_eq!(b.join(AvlTree::new(), TestNode::new(4)), 3);
    b.assert_invariants();
    assert_eq!(keys(&b), vec![4, 5, 6, 7]);

    // The cost uses the heights before the separator grows the tree.
    let mut c = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
    assert_eq!(c.height(), 2);
    assert_eq!(c.join(AvlTree::new(), TestNode::new(0)), 4);
    c.assert_invariants();
    assert_eq!(c.height(), 3);
    assert_eq!(keys(&c), (0..=7).collect::<Vec<_>>());
}

#[test]
fn iter_is_restartable() {
    let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9, 2, 6]);

    let iter = tree.iter();
    assert_eq!(iter.len(), 9);

    let first: Vec<u32> = iter.clone().map(|node| node.key).collect();
    let second: Vec<u32> = iter.map(|node| node.key).collect();
    assert_eq!(first, second);
    assert_eq!(first, (1..=9).collect::<Vec<_>>());

    let mut partial = tree.iter();
    partial.nth(3);
    assert_eq!(partial.len(), 5);
    assert_eq!(partial.next().map(|node| node.key), Some(5));
}

#[test]
fn order_statistics() {
    let tree = tree_of(&[50, 20, 80, 10, 30, 70, 90, 60]);

    assert_eq!(tree.first().map(|node| node.key), Some(10));
    assert_eq!(tree.last().map(|node| node.key), Some(90));
    assert_eq!(tree.select(0).map(|node| node.key), Some(10));
    assert_eq!(tree.select(4).map(|node| node.key), Some(60));
    assert_eq!(tree.select(7).map(|node| node.key), Some(90));
    assert!(tree.select(8).is_none());

    assert_eq!(tree.rank(&5), 0);
    assert_eq!(tree.rank(&60), 4);
    assert_eq!(tree.rank(&65), 5);
    assert_eq!(tree.rank(&100), 8);
}

#[test]
fn clear_empties_tree() {
    let mut tree = tree_of(&[4, 1, 9, 3, 7]);
    tree.clear();
    tree.assert_invariants();
    assert!(tree.is_empty());
    assert_eq!(tree.iter().count(), 0);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn insert_round_trip(keys in proptest::collection::btree_set(any::<u32>(), 0..200)) {
        let mut map = AvlMap::new();
        for &key in &keys {
            prop_assert!(map.insert(key, u64::from(key) * 3).is_ok());
        }
        map.assert_invariants();

        let expected: Vec<(u32, u64)> = keys.iter().map(|&k| (k, u64::from(k) * 3)).collect();
        let actual: Vec<(u32, u64)> = map.to_ordered_sequence().map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn split_join_any_pivot(
        keys in proptest::collection::btree_set(0u32..10_000, 1..300),
        pick in any::<prop::sample::Index>(),
    ) {
        let keys: Vec<u32> = keys.into_iter().collect();
        let pivot = keys[pick.index(keys.len())];
        let mut map: AvlMap<u32, u32> = keys.iter().map(|&k| (k, !k)).collect();

        let (mut less, (k, v), greater) = map.split(&pivot).unwrap();
        less.assert_invariants();
        greater.assert_invariants();
        prop_assert_eq!((k, v), (pivot, !pivot));

        less.join(greater, k, v).unwrap();
        less.assert_invariants();
        prop_assert!(less.iter().map(|(&k, _)| k).eq(keys.iter().copied()));
    }
}
