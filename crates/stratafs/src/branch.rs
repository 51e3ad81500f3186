// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::tracking::{split_segments, TrieNode};
use crate::Result;

#[cfg(test)]
#[path = "./branch_test.rs"]
mod branch_test;

/// One backing directory tree merged into the union view.
///
/// Pairs the branch's absolute backing directory with a trie over every
/// path that existed beneath it when the index was built. The index is
/// built once per mount; read-only calls never mutate it and nothing is
/// ever removed from it.
#[derive(Debug, Clone)]
pub struct BranchIndex {
    backing: PathBuf,
    root: TrieNode,
}

impl BranchIndex {
    /// Create an empty index for the given backing directory.
    ///
    /// Relative paths are resolved against the current working
    /// directory, matching how branches are declared in configuration.
    pub fn new<P: AsRef<Path>>(backing: P) -> Result<Self> {
        let backing = backing.as_ref();
        let backing = if backing.is_absolute() {
            backing.to_path_buf()
        } else {
            std::env::current_dir()?.join(backing)
        };
        Ok(Self {
            backing,
            root: TrieNode::default(),
        })
    }

    /// Build the index by walking the backing directory exactly once,
    /// registering every directory and file found beneath it.
    ///
    /// Sibling order during the walk is unspecified; only trie
    /// membership is an invariant. Entries that cannot be read are
    /// skipped rather than failing the build.
    pub fn index<P: AsRef<Path>>(backing: P) -> Result<Self> {
        let mut branch = Self::new(backing)?;
        let root = branch.backing.clone();
        for entry in WalkDir::new(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(?err, "skipping unreadable entry");
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                tracing::warn!(path = ?entry.path(), "skipping non-utf8 path");
                continue;
            };
            branch.insert(relative);
        }
        tracing::debug!(
            branch = %branch.backing.display(),
            size = branch.size(),
            "traced branch"
        );
        Ok(branch)
    }

    /// The absolute backing directory behind this branch.
    pub fn backing_path(&self) -> &Path {
        &self.backing
    }

    /// Join a virtual path onto this branch's backing directory.
    pub fn join(&self, path: &str) -> PathBuf {
        let mut full = self.backing.clone();
        for segment in split_segments(path) {
            full.push(segment);
        }
        full
    }

    /// True if this branch contained the given virtual path at index
    /// time. The root path is always present.
    pub fn contains(&self, path: &str) -> bool {
        self.root.contains(&split_segments(path))
    }

    /// Register a virtual path in this index.
    ///
    /// This is the only way nodes enter the trie after the initial
    /// walk. Returns true once the path is present, whether or not it
    /// was already there.
    pub fn insert(&mut self, path: &str) -> bool {
        self.root.insert(&split_segments(path))
    }

    /// The weight of the underlying trie, a rough cost estimate of the
    /// index structure. Not a byte size.
    pub fn size(&self) -> u64 {
        self.root.weight()
    }
}
