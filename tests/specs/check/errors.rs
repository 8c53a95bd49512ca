// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `throttle check` input error specs

use crate::prelude::*;

fn check(project: &Project, extra: &[&str]) -> RunAssert {
    let mut args = vec!["check", "--config", "throttle.toml", "--fleet", "fleet.json"];
    args.extend_from_slice(extra);
    project.throttle().args(&args).fails()
}

#[test]
fn unknown_node_is_an_error() {
    let project = Project::empty();
    project
        .file("throttle.toml", SETTINGS)
        .file("fleet.json", r#"{ "nodes": [{ "name": "n1", "executors": 1 }] }"#);

    check(&project, &["--task", "build", "--node", "ghost"])
        .stderr_has("node not in fleet snapshot: ghost");
}

#[test]
fn overcommitted_snapshot_is_rejected() {
    let project = Project::empty();
    project.file("throttle.toml", SETTINGS).file(
        "fleet.json",
        r#"{ "nodes": [{ "name": "n1", "executors": 1,
              "running": [{ "task": "build" }, { "task": "build" }] }] }"#,
    );

    check(&project, &["--task", "build"])
        .stderr_has("loading fleet.json")
        .stderr_has("node n1: 2 running but only 1 executors");
}

#[test]
fn malformed_param_is_rejected() {
    let project = Project::empty();
    project
        .file("throttle.toml", SETTINGS)
        .file("fleet.json", "{}");

    check(&project, &["--task", "lint", "--param", "BRANCH"]).stderr_has("no '=' found");
}

#[test]
fn categories_outside_category_mode_are_rejected() {
    let project = Project::empty();
    project
        .file(
            "throttle.toml",
            "[[category]]\nname = \"cat\"\n\n[task.build]\ncategories = [\"cat\"]\n",
        )
        .file("fleet.json", "{}");

    check(&project, &["--task", "build"]).stderr_has("categories require mode");
}

#[test]
fn missing_fleet_snapshot_is_reported() {
    let project = Project::empty();
    project.file("throttle.toml", SETTINGS);

    check(&project, &["--task", "build"])
        .stderr_has("loading fleet.json")
        .stdout_lacks("allow");
}
