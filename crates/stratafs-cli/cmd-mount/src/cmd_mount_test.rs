// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use clap::Parser;
use rstest::rstest;

use super::CmdMount;

#[rstest]
fn test_daemonizes_by_default() {
    let opt = CmdMount::try_parse_from(["stratafs-mount", "/mnt/view"]).unwrap();
    assert!(!opt.foreground);
    assert_eq!(opt.verbose, 0);
}

#[rstest]
#[case::short("-f")]
#[case::long("--foreground")]
fn test_foreground_flag(#[case] flag: &str) {
    let opt = CmdMount::try_parse_from(["stratafs-mount", flag, "/mnt/view"]).unwrap();
    assert!(opt.foreground);
}

#[rstest]
fn test_mountpoint_is_required() {
    assert!(CmdMount::try_parse_from(["stratafs-mount"]).is_err());
}
