// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use nix::sys::statvfs::statvfs;
use nix::sys::time::TimeVal;

use crate::resolve::UnionResolver;
use crate::tracking::split_segments;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./router_test.rs"]
mod router_test;

/// File attributes as reported by [`Router::getattr`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Attr {
    pub atime: i64,
    pub ctime: i64,
    pub gid: u32,
    pub mode: u32,
    pub mtime: i64,
    pub nlink: u64,
    pub size: u64,
    pub uid: u32,
}

impl Attr {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            atime: meta.atime(),
            ctime: meta.ctime(),
            gid: meta.gid(),
            mode: meta.mode(),
            mtime: meta.mtime(),
            nlink: meta.nlink(),
            size: meta.size(),
            uid: meta.uid(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFLNK
    }
}

/// Filesystem statistics as reported by [`Router::statfs`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StatFs {
    pub bavail: u64,
    pub bfree: u64,
    pub blocks: u64,
    pub bsize: u64,
    pub favail: u64,
    pub ffree: u64,
    pub files: u64,
    pub flag: u64,
    pub frsize: u64,
    pub namemax: u64,
}

/// An open file carried from `open`/`create` to the matching `release`.
struct Handle {
    file: std::fs::File,
}

/// Dispatches filesystem operations against the union of branches.
///
/// Every call is stateless with respect to prior calls, except for the
/// handle table populated by `open`/`create` and drained by `release`.
/// The branch indexes are never mutated here.
pub struct Router {
    resolver: UnionResolver,
    write_root: Option<PathBuf>,
    next_handle: AtomicU64,
    handles: DashMap<u64, Handle>,
}

impl Router {
    /// Construct a router over the given resolver.
    ///
    /// The write root, when given, is the one directory that receives
    /// files made through `create`; it is not part of the branch stack
    /// and is never consulted during resolution.
    pub fn new(resolver: UnionResolver, write_root: Option<PathBuf>) -> Self {
        Self {
            resolver,
            write_root,
            // handle 0 is never allocated
            next_handle: AtomicU64::new(1),
            handles: DashMap::new(),
        }
    }

    /// The resolver backing this router.
    pub fn resolver(&self) -> &UnionResolver {
        &self.resolver
    }

    fn allocate_handle(&self, file: std::fs::File) -> u64 {
        let fh = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(fh, Handle { file });
        fh
    }

    /// The physical path of the branch that owns this virtual path.
    fn resolve_physical(&self, path: &str) -> Result<PathBuf> {
        match self.resolver.resolve_owner(path) {
            Some(branch) => Ok(branch.join(path)),
            None => Err(Error::NoEntry(path.to_owned())),
        }
    }

    fn deny(&self, op: &str, path: &str) -> Error {
        tracing::trace!("{op} {path} = EACCES");
        Error::Denied(format!("{op} {path}"))
    }

    // Resolve-then-read operations
    // ============================

    /// Check that a path is reachable through some branch.
    ///
    /// A path that resolves to no branch is denied rather than
    /// not-found; there is no finer-grained access policy.
    pub fn access(&self, path: &str, _mode: i32) -> Result<()> {
        if self.resolver.resolve_owner(path).is_some() {
            Ok(())
        } else {
            Err(self.deny("access", path))
        }
    }

    pub fn getattr(&self, path: &str) -> Result<Attr> {
        let physical = self.resolve_physical(path)?;
        let meta = std::fs::symlink_metadata(physical)?;
        Ok(Attr::from_metadata(&meta))
    }

    pub fn readlink(&self, path: &str) -> Result<PathBuf> {
        let physical = self.resolve_physical(path)?;
        Ok(std::fs::read_link(physical)?)
    }

    /// Open the owning branch's file read-only and issue a handle.
    ///
    /// Write-access flags are refused: the union offers no mutation
    /// path through resolved branches.
    pub fn open(&self, path: &str, flags: i32) -> Result<u64> {
        let physical = self.resolve_physical(path)?;
        if flags & (libc::O_WRONLY | libc::O_RDWR) != 0 {
            return Err(self.deny("open[w]", path));
        }
        let extra = flags & !(libc::O_ACCMODE | libc::O_CREAT | libc::O_TRUNC | libc::O_APPEND);
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(extra)
            .open(physical)?;
        let fh = self.allocate_handle(file);
        tracing::trace!("open {path} = {fh}");
        Ok(fh)
    }

    pub fn read(&self, fh: u64, size: u32, offset: i64) -> Result<Vec<u8>> {
        let Some(handle) = self.handles.get(&fh) else {
            return Err(Error::InvalidHandle(fh));
        };
        let mut buf = vec![0; size as usize];
        let mut consumed = 0;
        while consumed < size as usize {
            let count = handle
                .file
                .read_at(&mut buf[consumed..], consumed as u64 + offset as u64)?;
            consumed += count;
            if count == 0 {
                // the end of the file has been reached
                break;
            }
        }
        buf.truncate(consumed);
        tracing::trace!("read {fh} = {consumed}/{size}");
        Ok(buf)
    }

    // Resolve-then-list
    // =================

    /// The merged listing of a virtual directory.
    ///
    /// Every branch containing the path contributes the entries of its
    /// physical directory (branches where the path is not physically a
    /// directory are skipped); names are deduplicated and joined by the
    /// two synthetic entries. Ordering is unspecified.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let matches = self.resolver.resolve_listing(path);
        if matches.is_empty() {
            return Err(Error::NoEntry(path.to_owned()));
        }
        let mut names: HashSet<String> = [".".to_string(), "..".to_string()].into();
        for branch in matches {
            let physical = branch.join(path);
            if !physical.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&physical)? {
                let entry = entry?;
                if let Ok(name) = entry.file_name().into_string() {
                    names.insert(name);
                }
            }
        }
        tracing::trace!("readdir {path} = {} entries", names.len());
        Ok(names.into_iter().collect())
    }

    // Always-denied operations (fail-closed)
    // ======================================

    pub fn chmod(&self, path: &str, _mode: u32) -> Result<()> {
        Err(self.deny("chmod", path))
    }

    pub fn chown(&self, path: &str, _uid: u32, _gid: u32) -> Result<()> {
        Err(self.deny("chown", path))
    }

    pub fn mknod(&self, path: &str, _mode: u32, _dev: u64) -> Result<()> {
        Err(self.deny("mknod", path))
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        Err(self.deny("rmdir", path))
    }

    pub fn mkdir(&self, path: &str, _mode: u32) -> Result<()> {
        Err(self.deny("mkdir", path))
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        Err(self.deny("unlink", path))
    }

    pub fn symlink(&self, _target: &str, name: &str) -> Result<()> {
        Err(self.deny("symlink", name))
    }

    pub fn rename(&self, old: &str, _new: &str) -> Result<()> {
        Err(self.deny("rename", old))
    }

    pub fn link(&self, _target: &str, name: &str) -> Result<()> {
        Err(self.deny("link", name))
    }

    pub fn write(&self, fh: u64, _data: &[u8], _offset: i64) -> Result<usize> {
        tracing::trace!("write {fh} = EACCES");
        Err(Error::Denied(format!("write handle {fh}")))
    }

    // Single designated writable target
    // =================================

    /// Create a file under the configured write root.
    ///
    /// The branch stack is never consulted; without a configured write
    /// root the operation is unusable and fails outright. The new file
    /// is not registered in any branch index.
    pub fn create(&self, path: &str, mode: u32) -> Result<(u64, Attr)> {
        let Some(write_root) = &self.write_root else {
            tracing::trace!("create {path} = EACCES (no write root)");
            return Err(Error::NoWriteRoot);
        };
        let mut physical = write_root.clone();
        for segment in split_segments(path) {
            physical.push(segment);
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(physical)?;
        let attr = Attr::from_metadata(&file.metadata()?);
        let fh = self.allocate_handle(file);
        tracing::trace!("create {path} = {fh}");
        Ok((fh, attr))
    }

    // Direct-path operations (bypass resolution)
    // ==========================================

    pub fn truncate(&self, path: &str, length: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(Path::new(path))?;
        file.set_len(length)?;
        Ok(())
    }

    pub fn utimens(&self, path: &str, atime: TimeVal, mtime: TimeVal) -> Result<()> {
        nix::sys::stat::utimes(Path::new(path), &atime, &mtime)?;
        Ok(())
    }

    pub fn flush(&self, fh: u64) -> Result<()> {
        let Some(handle) = self.handles.get(&fh) else {
            return Err(Error::InvalidHandle(fh));
        };
        handle.file.sync_all()?;
        Ok(())
    }

    pub fn fsync(&self, fh: u64, datasync: bool) -> Result<()> {
        let Some(handle) = self.handles.get(&fh) else {
            return Err(Error::InvalidHandle(fh));
        };
        if datasync {
            handle.file.sync_data()?;
        } else {
            handle.file.sync_all()?;
        }
        Ok(())
    }

    /// Close a handle issued by a prior `open`/`create`.
    pub fn release(&self, fh: u64) -> Result<()> {
        let Some((_, _handle)) = self.handles.remove(&fh) else {
            return Err(Error::InvalidHandle(fh));
        };
        tracing::trace!("release {fh}");
        Ok(())
    }

    pub fn statfs(&self, path: &str) -> Result<StatFs> {
        let stv = statvfs(Path::new(path))?;
        Ok(StatFs {
            bavail: stv.blocks_available() as u64,
            bfree: stv.blocks_free() as u64,
            blocks: stv.blocks() as u64,
            bsize: stv.block_size() as u64,
            favail: stv.files_available() as u64,
            ffree: stv.files_free() as u64,
            files: stv.files() as u64,
            flag: stv.flags().bits() as u64,
            frsize: stv.fragment_size() as u64,
            namemax: stv.name_max() as u64,
        })
    }
}
