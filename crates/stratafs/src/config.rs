// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// The fixed name of the configuration file read from the process
/// working directory at startup.
pub const CONFIG_FILE: &str = "stratafs.toml";

/// The set of branches to merge, in priority order, and the optional
/// writable root.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Branches {
    /// Backing directory paths; declaration order is resolution
    /// priority. Relative paths resolve against the working directory.
    pub paths: Vec<PathBuf>,

    /// Directory that receives newly created files.
    ///
    /// When unset the mount is a read-only deployment and `create` is
    /// rejected outright.
    pub write_root: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub branches: Branches,
}

impl Config {
    /// Load the configuration from [`CONFIG_FILE`] in the current
    /// working directory.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(CONFIG_FILE, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load a configuration from the given TOML source.
    pub fn load_string<S: AsRef<str>>(conf: S) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                conf.as_ref(),
                config::FileFormat::Toml,
            ))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
