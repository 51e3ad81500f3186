// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

/// Split a virtual path into its segments, discarding empty tokens.
///
/// Every entry point that interprets a path goes through this routine,
/// so `"/a//b/"` and `"/a/b"` always name the same entry. The root path
/// `"/"` (and the empty string) split into no segments at all.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
