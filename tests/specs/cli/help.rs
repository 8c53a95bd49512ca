// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level help and usage specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    Project::empty()
        .throttle()
        .args(&["--help"])
        .passes()
        .stdout_has("categories")
        .stdout_has("check")
        .stdout_has("gate");
}

#[test]
fn no_command_prints_usage() {
    Project::empty()
        .throttle()
        .args(&[])
        .fails()
        .stderr_has("Usage:");
}

#[test]
fn unknown_command_fails() {
    Project::empty()
        .throttle()
        .args(&["admit"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn version_flag_prints_version() {
    Project::empty()
        .throttle()
        .args(&["--version"])
        .passes()
        .stdout_has("throttle ");
}
