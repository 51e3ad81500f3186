// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::sys::time::TimeVal;
use rstest::rstest;
use tempfile::TempDir;

use super::Router;
use crate::branch::BranchIndex;
use crate::resolve::UnionResolver;

fn ensure(path: &Path, data: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

/// Branches [A, B]: A has /x.txt, B has /x.txt and /y.txt.
fn two_branch_router() -> (TempDir, TempDir, Router) {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    ensure(&a.path().join("x.txt"), "from A");
    ensure(&b.path().join("x.txt"), "from B, longer");
    ensure(&b.path().join("y.txt"), "only in B");

    let branches = vec![
        BranchIndex::index(a.path()).unwrap(),
        BranchIndex::index(b.path()).unwrap(),
    ];
    let router = Router::new(UnionResolver::new(branches), None);
    (a, b, router)
}

#[rstest]
fn test_first_branch_is_authoritative() {
    let (_a, _b, router) = two_branch_router();
    let attr = router.getattr("/x.txt").unwrap();
    assert_eq!(attr.size, "from A".len() as u64);
}

#[rstest]
fn test_open_falls_through_to_owning_branch() {
    let (_a, _b, router) = two_branch_router();
    let fh = router.open("/y.txt", libc::O_RDONLY).unwrap();
    let data = router.read(fh, 1024, 0).unwrap();
    assert_eq!(data, b"only in B");
    router.release(fh).unwrap();
}

#[rstest]
fn test_readdir_unions_branches() {
    let (_a, _b, router) = two_branch_router();
    let mut entries = router.readdir("/").unwrap();
    entries.sort();
    assert_eq!(entries, vec![".", "..", "x.txt", "y.txt"]);
}

#[rstest]
fn test_readdir_missing_dir() {
    let (_a, _b, router) = two_branch_router();
    let err = router.readdir("/no/such/dir").unwrap_err();
    assert_eq!(err.os_error(), libc::ENOENT);
}

#[rstest]
fn test_access_denies_unresolved_paths() {
    let (_a, _b, router) = two_branch_router();
    router.access("/x.txt", libc::R_OK).unwrap();
    let err = router.access("/does/not/exist", libc::R_OK).unwrap_err();
    assert_eq!(err.os_error(), libc::EACCES);
}

#[rstest]
fn test_not_found_coverage() {
    let (_a, _b, router) = two_branch_router();
    for err in [
        router.getattr("/does/not/exist").unwrap_err(),
        router.readlink("/does/not/exist").unwrap_err(),
        router.open("/does/not/exist", libc::O_RDONLY).unwrap_err(),
    ] {
        assert_eq!(err.os_error(), libc::ENOENT);
    }
}

#[rstest]
fn test_fail_closed_operations() {
    let (a, _b, router) = two_branch_router();
    let results = [
        router.chmod("/x.txt", 0o644),
        router.chown("/x.txt", 0, 0),
        router.mknod("/new", 0o644, 0),
        router.rmdir("/x.txt"),
        router.mkdir("/newdir", 0o755),
        router.unlink("/x.txt"),
        router.symlink("/x.txt", "/lnk"),
        router.rename("/x.txt", "/z.txt"),
        router.link("/x.txt", "/hard"),
    ];
    for result in results {
        assert_eq!(result.unwrap_err().os_error(), libc::EACCES);
    }
    assert_eq!(
        router.write(1, b"data", 0).unwrap_err().os_error(),
        libc::EACCES
    );
    // nothing in the backing store moved
    assert_eq!(std::fs::read(a.path().join("x.txt")).unwrap(), b"from A");
    assert!(!a.path().join("newdir").exists());
}

#[rstest]
fn test_open_refuses_write_access() {
    let (_a, _b, router) = two_branch_router();
    let err = router.open("/x.txt", libc::O_WRONLY).unwrap_err();
    assert_eq!(err.os_error(), libc::EACCES);
    let err = router.open("/x.txt", libc::O_RDWR).unwrap_err();
    assert_eq!(err.os_error(), libc::EACCES);
}

#[rstest]
fn test_release_invalidates_handle() {
    let (_a, _b, router) = two_branch_router();
    let fh = router.open("/x.txt", libc::O_RDONLY).unwrap();
    router.release(fh).unwrap();
    assert_eq!(router.read(fh, 16, 0).unwrap_err().os_error(), libc::EBADF);
    assert_eq!(router.release(fh).unwrap_err().os_error(), libc::EBADF);
}

#[rstest]
fn test_read_at_offset() {
    let (_a, _b, router) = two_branch_router();
    let fh = router.open("/y.txt", libc::O_RDONLY).unwrap();
    let data = router.read(fh, 4, 5).unwrap();
    assert_eq!(data, b"in B");
    router.release(fh).unwrap();
}

#[rstest]
fn test_create_without_write_root() {
    let (_a, _b, router) = two_branch_router();
    let err = router.create("/fresh.txt", 0o644).unwrap_err();
    assert_eq!(err.os_error(), libc::EACCES);
}

#[rstest]
fn test_create_targets_write_root_only() {
    let a = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    ensure(&a.path().join("x.txt"), "from A");

    let branches = vec![BranchIndex::index(a.path()).unwrap()];
    let router = Router::new(
        UnionResolver::new(branches),
        Some(scratch.path().to_path_buf()),
    );

    let (fh, attr) = router.create("/fresh.txt", 0o644).unwrap();
    assert_eq!(attr.size, 0);
    router.flush(fh).unwrap();
    router.release(fh).unwrap();

    assert!(scratch.path().join("fresh.txt").exists());
    assert!(!a.path().join("fresh.txt").exists());
    // the new file is not registered in any branch index
    assert!(router.resolver().resolve_owner("/fresh.txt").is_none());
}

#[rstest]
fn test_direct_path_truncate() {
    let (_a, b, router) = two_branch_router();
    // direct-path ops take the path as given, no branch resolution
    let physical = b.path().join("y.txt");
    router
        .truncate(physical.to_str().unwrap(), 4)
        .unwrap();
    assert_eq!(std::fs::read(&physical).unwrap(), b"only");
}

#[rstest]
fn test_direct_path_utimens() {
    let (_a, b, router) = two_branch_router();
    let physical = b.path().join("y.txt");
    router
        .utimens(
            physical.to_str().unwrap(),
            TimeVal::new(1_000_000, 0),
            TimeVal::new(2_000_000, 0),
        )
        .unwrap();
    let meta = std::fs::metadata(&physical).unwrap();
    assert_eq!(meta.atime(), 1_000_000);
    assert_eq!(meta.mtime(), 2_000_000);
}

#[rstest]
fn test_fsync_on_bad_handle() {
    let (_a, _b, router) = two_branch_router();
    assert_eq!(router.flush(99).unwrap_err().os_error(), libc::EBADF);
    assert_eq!(
        router.fsync(99, true).unwrap_err().os_error(),
        libc::EBADF
    );
}

#[rstest]
fn test_statfs_direct_path() {
    let (a, _b, router) = two_branch_router();
    let stv = router.statfs(a.path().to_str().unwrap()).unwrap();
    assert!(stv.bsize > 0);
    assert!(stv.blocks > 0);
}

#[rstest]
fn test_getattr_root() {
    let (a, _b, router) = two_branch_router();
    let attr = router.getattr("/").unwrap();
    assert!(attr.is_dir());
    let direct = std::fs::metadata(a.path()).unwrap();
    assert_eq!(attr.size, direct.len());
}
