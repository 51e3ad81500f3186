// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

//! Path segment handling and the per-branch existence trie.

mod path;
mod trie;

pub use path::split_segments;
pub use trie::TrieNode;
