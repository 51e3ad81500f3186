// Copyright (c) Contributors to the stratafs project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/stratafs/stratafs

use std::path::PathBuf;

use rstest::rstest;

use super::Config;

#[rstest]
fn test_parse_branch_list() {
    let config = Config::load_string(
        r#"
        [branches]
        paths = ["base", "overlay"]
        "#,
    )
    .unwrap();
    assert_eq!(
        config.branches.paths,
        vec![PathBuf::from("base"), PathBuf::from("overlay")]
    );
    assert!(config.branches.write_root.is_none());
}

#[rstest]
fn test_parse_write_root() {
    let config = Config::load_string(
        r#"
        [branches]
        paths = ["base"]
        write_root = "scratch"
        "#,
    )
    .unwrap();
    assert_eq!(config.branches.write_root, Some(PathBuf::from("scratch")));
}

#[rstest]
fn test_empty_config_defaults() {
    let config = Config::load_string("").unwrap();
    assert!(config.branches.paths.is_empty());
    assert!(config.branches.write_root.is_none());
}
