// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use crate::branch::BranchIndex;

#[cfg(test)]
#[path = "./resolve_test.rs"]
mod resolve_test;

/// Resolves virtual paths against an ordered stack of branch indexes.
///
/// The order given at construction is the declared configuration order
/// and is immutable afterwards; it is the sole tie-break when more than
/// one branch contains the same path.
#[derive(Debug, Default)]
pub struct UnionResolver {
    branches: Vec<BranchIndex>,
}

impl UnionResolver {
    pub fn new(branches: Vec<BranchIndex>) -> Self {
        Self { branches }
    }

    /// The number of branches in the stack.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Iterate the branches in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &BranchIndex> {
        self.branches.iter()
    }

    /// The branch that owns the given virtual path: the first branch in
    /// priority order whose index contains it.
    ///
    /// This is the single source of truth for which physical location
    /// backs a virtual path.
    pub fn resolve_owner(&self, path: &str) -> Option<&BranchIndex> {
        self.branches.iter().find(|b| b.contains(path))
    }

    /// Every branch that contains the given virtual path, in priority
    /// order. Used for directory listing merges, where all matching
    /// branches contribute entries.
    pub fn resolve_listing(&self, path: &str) -> Vec<&BranchIndex> {
        self.branches.iter().filter(|b| b.contains(path)).collect()
    }
}
