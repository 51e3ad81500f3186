// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::path::Path;

use rstest::rstest;

use super::BranchIndex;

fn ensure(path: &Path, data: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

#[rstest]
fn test_index_registers_dirs_and_files() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dir = tmpdir.path();
    ensure(&dir.join("etc/conf.d/app.conf"), "data");
    ensure(&dir.join("bin/tool"), "bin");

    let branch = BranchIndex::index(dir).unwrap();
    assert!(branch.contains("/etc"));
    assert!(branch.contains("/etc/conf.d"));
    assert!(branch.contains("/etc/conf.d/app.conf"));
    assert!(branch.contains("/bin/tool"));
    assert!(!branch.contains("/etc/missing"));
}

#[rstest]
fn test_root_path_always_present() {
    let tmpdir = tempfile::tempdir().unwrap();
    let branch = BranchIndex::index(tmpdir.path()).unwrap();
    assert!(branch.contains("/"));
    assert!(branch.contains(""));
}

#[rstest]
fn test_path_normalization() {
    let tmpdir = tempfile::tempdir().unwrap();
    ensure(&tmpdir.path().join("a/b"), "data");

    let branch = BranchIndex::index(tmpdir.path()).unwrap();
    assert!(branch.contains("/a/b"));
    assert!(branch.contains("/a//b/"));
    assert!(branch.contains("a/b"));
}

#[rstest]
fn test_insert_is_idempotent() {
    let tmpdir = tempfile::tempdir().unwrap();
    let mut branch = BranchIndex::new(tmpdir.path()).unwrap();
    assert!(branch.insert("/x/y"));
    let size = branch.size();
    assert!(branch.insert("/x/y"));
    assert_eq!(branch.size(), size);
}

#[rstest]
fn test_size_counts_structure_not_bytes() {
    let tmpdir = tempfile::tempdir().unwrap();
    ensure(&tmpdir.path().join("x.txt"), "0123456789");
    ensure(&tmpdir.path().join("y.txt"), "");

    let branch = BranchIndex::index(tmpdir.path()).unwrap();
    // two leaf children of the root, regardless of file contents
    assert_eq!(branch.size(), 2);
}

#[rstest]
fn test_join_builds_physical_path() {
    let tmpdir = tempfile::tempdir().unwrap();
    let branch = BranchIndex::new(tmpdir.path()).unwrap();
    assert_eq!(branch.join("/a//b/"), tmpdir.path().join("a").join("b"));
    assert_eq!(branch.join("/"), tmpdir.path());
}
