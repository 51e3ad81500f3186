// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

//! Union mounting of layered directory trees.
//!
//! An ordered list of backing directories ("branches") is presented as
//! one merged view: a virtual path belongs to the first branch that
//! contains it, and a directory listing is the union of entries across
//! every branch that contains the directory. Each branch is indexed
//! into an in-memory path trie exactly once, at mount time; no
//! filesystem call ever rescans a backing store.

#![deny(unsafe_op_in_unsafe_fn)]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod branch;
pub mod config;
mod error;
mod resolve;
mod router;
pub mod tracking;

#[cfg(all(unix, feature = "fuse-backend"))]
mod fuse;

pub use branch::BranchIndex;
pub use config::Config;
pub use error::{Error, Result};
#[cfg(all(unix, feature = "fuse-backend"))]
pub use fuse::Session;
pub use resolve::UnionResolver;
pub use router::{Attr, Router, StatFs};
