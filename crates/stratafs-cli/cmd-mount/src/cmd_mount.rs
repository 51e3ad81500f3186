// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use clap::Parser;
use fuser::MountOption;
use miette::{IntoDiagnostic, Result, WrapErr};
use stratafs::{BranchIndex, Config, Router, Session, UnionResolver};
use tracing_subscriber::prelude::*;

#[cfg(test)]
#[path = "./cmd_mount_test.rs"]
mod cmd_mount_test;

fn main() {
    // because this function exits right away it does not
    // properly handle destruction of data, so we put the actual
    // logic into a separate function/scope
    std::process::exit(main2())
}

fn main2() -> i32 {
    let opt = CmdMount::parse();
    configure_logging(opt.verbose);

    match opt.run() {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:?}");
            1
        }
    }
}

/// Mount the merged view of the configured branches
///
/// Branches are read from stratafs.toml in the working directory and
/// indexed once, in declaration order, before the mount is attached.
#[derive(Debug, Parser)]
#[clap(name = "stratafs-mount", version = stratafs::VERSION)]
pub struct CmdMount {
    /// Make output more verbose, can be given more than once
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not daemonize the filesystem, run it in the foreground instead
    #[clap(long, short)]
    pub foreground: bool,

    /// The location where to mount the merged view
    mountpoint: std::path::PathBuf,
}

impl CmdMount {
    fn run(&self) -> Result<i32> {
        let config = Config::load()
            .into_diagnostic()
            .wrap_err("failed to load stratafs.toml")?;
        if config.branches.paths.is_empty() {
            miette::bail!("no branches configured in stratafs.toml");
        }

        let mut branches = Vec::with_capacity(config.branches.paths.len());
        for path in &config.branches.paths {
            let branch = BranchIndex::index(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to index branch {}", path.display()))?;
            tracing::info!(
                branch = %branch.backing_path().display(),
                size = branch.size(),
                "indexed branch"
            );
            branches.push(branch);
        }

        let router = Router::new(UnionResolver::new(branches), config.branches.write_root);

        let opts = vec![
            MountOption::RO,
            MountOption::NoDev,
            MountOption::NoSuid,
            MountOption::FSName("stratafs".into()),
        ];
        tracing::info!(mountpoint = %self.mountpoint.display(), "mounting");
        let mut session = fuser::Session::new(Session::new(router), &self.mountpoint, &opts)
            .into_diagnostic()
            .wrap_err("failed to establish the mount")?;

        if !self.foreground {
            tracing::debug!("moving into background...");
            // the session must be established before daemonizing,
            // otherwise initial use of the filesystem may not show
            // any mount at all
            nix::unistd::daemon(false, false).into_diagnostic()?;
        }

        session.run().into_diagnostic()?;
        Ok(0)
    }
}

fn configure_logging(verbosity: u8) {
    let config = match verbosity {
        0 => std::env::var("STRATAFS_LOG").unwrap_or_else(|_| "stratafs=info,warn".to_string()),
        1 => "stratafs=debug,info".to_string(),
        2 => "stratafs=trace,info".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = tracing_subscriber::filter::EnvFilter::new(config);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(verbosity > 2);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .init();
}
