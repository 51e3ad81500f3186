// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::collections::HashMap;

#[cfg(test)]
#[path = "./trie_test.rs"]
mod trie_test;

/// A single node in a branch's path trie.
///
/// Each node exclusively owns its children, keyed by path segment name.
/// The tree is acyclic by construction and carries no back-pointers.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct TrieNode {
    children: HashMap<String, TrieNode>,
}

impl TrieNode {
    /// True if a chain of child nodes matches the given segments.
    ///
    /// An empty segment list means this node itself is the target.
    pub fn contains(&self, segments: &[&str]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        match self.children.get(*first) {
            Some(child) => child.contains(rest),
            None => false,
        }
    }

    /// Register the given segment chain below this node, creating every
    /// missing intermediate node along the way.
    ///
    /// Returns true once the full chain has been consumed, so inserting
    /// the same path twice is a structural no-op that still reports
    /// success.
    pub fn insert(&mut self, segments: &[&str]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        self.children
            .entry((*first).to_string())
            .or_default()
            .insert(rest)
    }

    /// Navigate to the node named by the given segments, if present.
    ///
    /// An empty segment list names this node itself.
    pub fn node_at(&self, segments: &[&str]) -> Option<&TrieNode> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(self);
        };
        self.children.get(*first)?.node_at(rest)
    }

    /// The recursive size metric of this node's subtree: the sum of all
    /// child weights plus the number of direct children.
    ///
    /// A node without children weighs 0. This estimates the cost of the
    /// index structure only and says nothing about bytes on disk.
    pub fn weight(&self) -> u64 {
        self.children.values().map(|c| c.weight() + 1).sum()
    }
}
