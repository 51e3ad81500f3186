// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::io;

use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

/// Errors produced by stratafs operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The path resolves to no branch.
    #[error("no such entry: {0}")]
    NoEntry(String),

    /// The operation offers no mutation path, or access was refused.
    #[error("access denied: {0}")]
    Denied(String),

    /// The handle was never issued or has already been released.
    #[error("invalid file handle: {0}")]
    InvalidHandle(u64),

    /// `create` was called on a mount with no configured write root.
    #[error("create is unusable without a configured write root")]
    NoWriteRoot,

    #[error(transparent)]
    Nix(#[from] nix::errno::Errno),

    #[error(transparent)]
    IO(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// The errno equivalent of this error, if it has one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::NoEntry(_) => Some(libc::ENOENT),
            Error::Denied(_) | Error::NoWriteRoot => Some(libc::EACCES),
            Error::InvalidHandle(_) => Some(libc::EBADF),
            Error::Nix(errno) => Some(*errno as i32),
            Error::IO(err) => err.raw_os_error(),
            Error::Config(_) => None,
        }
    }

    /// The errno to report for this error over a filesystem transport.
    pub fn os_error(&self) -> i32 {
        self.raw_os_error().unwrap_or(libc::EIO)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
