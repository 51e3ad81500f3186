// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use rstest::rstest;

use super::TrieNode;

#[rstest]
fn test_insert_idempotent() {
    let mut root = TrieNode::default();
    assert!(root.insert(&["a", "b", "c"]));
    let once = root.clone();
    assert!(root.insert(&["a", "b", "c"]));
    assert_eq!(root, once, "second insert must not change the shape");
}

#[rstest]
fn test_insert_creates_intermediates() {
    let mut root = TrieNode::default();
    assert!(root.insert(&["a", "b", "c"]));
    assert!(root.contains(&["a"]));
    assert!(root.contains(&["a", "b"]));
    assert!(root.contains(&["a", "b", "c"]));
}

#[rstest]
fn test_contains_missing() {
    let mut root = TrieNode::default();
    root.insert(&["a", "b"]);
    assert!(!root.contains(&["a", "c"]));
    assert!(!root.contains(&["b"]));
    assert!(!root.contains(&["a", "b", "c"]));
}

#[rstest]
fn test_empty_segments_name_the_node_itself() {
    let root = TrieNode::default();
    assert!(root.contains(&[]));
    assert_eq!(root.node_at(&[]), Some(&root));
}

#[rstest]
fn test_node_at_descends() {
    let mut root = TrieNode::default();
    root.insert(&["a", "b"]);
    assert!(root.node_at(&["a", "b"]).is_some());
    assert!(root.node_at(&["a", "x"]).is_none());
}

#[rstest]
fn test_weight_empty_node_is_zero() {
    assert_eq!(TrieNode::default().weight(), 0);
}

#[rstest]
fn test_weight_two_leaf_children() {
    let mut root = TrieNode::default();
    root.insert(&["x.txt"]);
    root.insert(&["y.txt"]);
    // two children of weight 0 each, plus count(children) = 2
    assert_eq!(root.weight(), 2);
}

#[rstest]
fn test_weight_nested_chain() {
    let mut root = TrieNode::default();
    root.insert(&["a", "b", "c"]);
    assert_eq!(root.weight(), 3);
}
