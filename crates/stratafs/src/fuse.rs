// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

//! Bridges the inode-addressed FUSE protocol to the path-addressed
//! [`Router`].
//!
//! The kernel speaks in inodes while the union core speaks in virtual
//! paths, so the session keeps a bidirectional inode table. Entries are
//! allocated on first lookup and never reclaimed; the table is bounded
//! by the merged tree, which is fixed for the lifetime of the mount.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use fuser::{
    FileAttr,
    FileType,
    ReplyAttr,
    ReplyCreate,
    ReplyData,
    ReplyDirectory,
    ReplyEmpty,
    ReplyEntry,
    ReplyOpen,
    ReplyStatfs,
    ReplyWrite,
    Request,
    TimeOrNow,
    FUSE_ROOT_ID,
};
use nix::sys::time::TimeVal;

use crate::router::{Attr, Router};

/// Bidirectional mapping between kernel inodes and virtual paths.
struct InodeTable {
    next: AtomicU64,
    paths: DashMap<u64, String>,
    inos: DashMap<String, u64>,
}

impl InodeTable {
    fn new() -> Self {
        let table = Self {
            next: AtomicU64::new(FUSE_ROOT_ID + 1),
            paths: DashMap::new(),
            inos: DashMap::new(),
        };
        table.paths.insert(FUSE_ROOT_ID, "/".to_string());
        table.inos.insert("/".to_string(), FUSE_ROOT_ID);
        table
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).map(|p| p.clone())
    }

    fn allocate(&self, path: &str) -> u64 {
        *self.inos.entry(path.to_string()).or_insert_with(|| {
            let ino = self.next.fetch_add(1, Ordering::Relaxed);
            self.paths.insert(ino, path.to_string());
            ino
        })
    }
}

fn child_path(parent: &str, name: &OsStr) -> Option<String> {
    let name = name.to_str()?;
    if parent == "/" {
        Some(format!("/{name}"))
    } else {
        Some(format!("{parent}/{name}"))
    }
}

fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn kind_of(attr: &Attr) -> FileType {
    match attr.mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

fn epoch_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn timeval(time: SystemTime) -> TimeVal {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => TimeVal::new(
            d.as_secs() as libc::time_t,
            d.subsec_micros() as libc::suseconds_t,
        ),
        Err(_) => TimeVal::new(0, 0),
    }
}

/// A mounted filesystem session.
///
/// Implements [`fuser::Filesystem`], translating each request into the
/// corresponding [`Router`] operation and its errno on failure.
pub struct Session {
    router: Router,
    inodes: InodeTable,
    ttl: Duration,
}

impl Session {
    // reported for block accounting only; the union spans any number
    // of real disks so a fixed realistic value is used (eg for du)
    const BLOCK_SIZE: u32 = 512;

    pub fn new(router: Router) -> Self {
        Self {
            router,
            inodes: InodeTable::new(),
            // the index never changes after build, so attrs never expire
            ttl: Duration::from_secs(u64::MAX),
        }
    }

    fn file_attr(&self, ino: u64, attr: &Attr) -> FileAttr {
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(Self::BLOCK_SIZE as u64),
            atime: epoch_time(attr.atime),
            mtime: epoch_time(attr.mtime),
            ctime: epoch_time(attr.ctime),
            crtime: SystemTime::UNIX_EPOCH,
            kind: kind_of(attr),
            perm: (attr.mode & 0o7777) as u16,
            nlink: attr.nlink as u32,
            uid: attr.uid,
            gid: attr.gid,
            rdev: 0,
            blksize: Self::BLOCK_SIZE,
            flags: 0,
        }
    }
}

impl fuser::Filesystem for Session {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(path) = child_path(&parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.getattr(&path) {
            Ok(attr) => {
                let ino = self.inodes.allocate(&path);
                reply.entry(&self.ttl, &self.file_attr(ino, &attr), 0);
            }
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.getattr(&path) {
            Ok(attr) => reply.attr(&self.ttl, &self.file_attr(ino, &attr)),
            Err(err) => reply.error(err.os_error()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if mode.is_some() {
            if let Err(err) = self.router.chmod(&path, mode.unwrap_or_default()) {
                reply.error(err.os_error());
                return;
            }
        }
        if uid.is_some() || gid.is_some() {
            if let Err(err) = self
                .router
                .chown(&path, uid.unwrap_or_default(), gid.unwrap_or_default())
            {
                reply.error(err.os_error());
                return;
            }
        }
        if let Some(length) = size {
            if let Err(err) = self.router.truncate(&path, length) {
                reply.error(err.os_error());
                return;
            }
        }
        if atime.is_some() || mtime.is_some() {
            let now = SystemTime::now();
            let resolve = |t: Option<TimeOrNow>| match t {
                Some(TimeOrNow::SpecificTime(time)) => time,
                Some(TimeOrNow::Now) | None => now,
            };
            if let Err(err) =
                self.router
                    .utimens(&path, timeval(resolve(atime)), timeval(resolve(mtime)))
            {
                reply.error(err.os_error());
                return;
            }
        }
        match self.router.getattr(&path) {
            Ok(attr) => reply.attr(&self.ttl, &self.file_attr(ino, &attr)),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.readlink(&path) {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let path = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let errno = self.router.mknod(&path, mode, 0)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let errno = self.router.mkdir(&path, mode)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let errno = self.router.unlink(&path)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let errno = self.router.rmdir(&path)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        link: &std::path::Path,
        reply: ReplyEntry,
    ) {
        let path = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let errno = self
            .router
            .symlink(&link.to_string_lossy(), &path)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let old = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
            .unwrap_or_default();
        let new = self
            .inodes
            .path_of(newparent)
            .and_then(|p| child_path(&p, newname))
            .unwrap_or_default();
        let errno = self.router.rename(&old, &new)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let target = self.inodes.path_of(ino).unwrap_or_default();
        let name = self
            .inodes
            .path_of(newparent)
            .and_then(|p| child_path(&p, newname))
            .unwrap_or_default();
        let errno = self.router.link(&target, &name)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.open(&path, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self
            .inodes
            .path_of(parent)
            .and_then(|p| child_path(&p, name))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.create(&path, mode) {
            Ok((fh, attr)) => {
                let ino = self.inodes.allocate(&path);
                reply.created(&self.ttl, &self.file_attr(ino, &attr), 0, fh, 0);
            }
            Err(err) => reply.error(err.os_error()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.router.read(fh, size, offset) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.os_error()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let errno = self.router.write(fh, data, offset)
            .err()
            .map(|err| err.os_error())
            .unwrap_or(libc::EACCES);
        reply.error(errno);
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.router.flush(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.router.release(fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        match self.router.fsync(fh, datasync) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut entries = match self.router.readdir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(err.os_error());
                return;
            }
        };
        // a stable order is needed so that continued listings can
        // resume from the kernel-provided offset
        entries.sort();
        for (i, name) in entries.iter().enumerate().skip(offset as usize) {
            let (entry_ino, kind) = match name.as_str() {
                "." => (ino, FileType::Directory),
                ".." => (self.inodes.allocate(parent_path(&path)), FileType::Directory),
                name => {
                    let child = child_path(&path, OsStr::new(name)).unwrap_or_default();
                    let kind = self
                        .router
                        .getattr(&child)
                        .map(|attr| kind_of(&attr))
                        .unwrap_or(FileType::RegularFile);
                    (self.inodes.allocate(&child), kind)
                }
            };
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.router.statfs(&path) {
            Ok(stv) => reply.statfs(
                stv.blocks,
                stv.bfree,
                stv.bavail,
                stv.files,
                stv.ffree,
                stv.bsize as u32,
                stv.namemax as u32,
                stv.frsize as u32,
            ),
            Err(err) => reply.error(err.os_error()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::EACCES);
            return;
        };
        match self.router.access(&path, mask) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.os_error()),
        }
    }
}
