// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `throttle check` admission specs

use crate::prelude::*;

fn project(fleet: &str) -> Project {
    let project = Project::empty();
    project
        .file("throttle.toml", SETTINGS)
        .file("fleet.json", fleet);
    project
}

fn check(project: &Project, extra: &[&str]) -> RunAssert {
    let mut args = vec!["check", "--config", "throttle.toml", "--fleet", "fleet.json"];
    args.extend_from_slice(extra);
    project.throttle().args(&args).passes()
}

const IDLE: &str = r#"{
  "nodes": [
    { "name": "n1", "executors": 4 },
    { "name": "n2", "labels": ["small"], "executors": 4 }
  ]
}"#;

#[test]
fn idle_fleet_admits() {
    let project = project(IDLE);
    check(&project, &["--task", "build"]).stdout_eq("allow\n");
    check(&project, &["--task", "build", "--node", "n1"]).stdout_eq("allow\n");
}

#[test]
fn per_node_limit_blocks_full_node_only() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n1", "executors": 4,
      "running": [{ "task": "build" }, { "task": "release" }] },
    { "name": "n2", "executors": 4 }
  ]
}"#,
    );

    check(&project, &["--task", "build", "--node", "n1"])
        .stdout_eq("blocked: max per-node capacity reached for category cat (2/2)\n");
    check(&project, &["--task", "build", "--node", "n2"]).stdout_eq("allow\n");
}

#[test]
fn label_override_lowers_node_limit() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n2", "labels": ["small"], "executors": 4,
      "running": [{ "task": "build" }] }
  ]
}"#,
    );

    check(&project, &["--task", "build", "--node", "n2"])
        .stdout_eq("blocked: max per-node capacity reached for category cat (1/1)\n");
}

#[test]
fn total_limit_counts_every_node() {
    let project = project(
        r#"{
  "builtin": { "name": "built-in", "executors": 2, "running": [{ "task": "build" }] },
  "nodes": [
    { "name": "n1", "executors": 4, "running": [{ "task": "build" }] },
    { "name": "n2", "executors": 4, "running": [{ "task": "build" }] }
  ]
}"#,
    );

    check(&project, &["--task", "build"])
        .stdout_eq("blocked: max total capacity reached for category cat (3/3)\n");
}

#[test]
fn first_denying_category_is_reported() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n1", "executors": 4, "running": [{ "task": "release" }] }
  ]
}"#,
    );

    check(&project, &["--task", "release"])
        .stdout_eq("blocked: max total capacity reached for category deploy (1/1)\n");
    check(&project, &["--task", "build"]).stdout_eq("allow\n");
}

#[test]
fn pending_build_is_blocked_first() {
    let project = project(
        r#"{
  "nodes": [{ "name": "n1", "executors": 4 }],
  "pending": ["build"]
}"#,
    );

    check(&project, &["--task", "build", "--node", "n1"]).stdout_eq("blocked: build pending\n");
}

#[test]
fn matching_params_block_identical_runs() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n1", "executors": 4,
      "running": [{ "task": "lint", "params": { "BRANCH": "main", "SHA": "abc" } }] },
    { "name": "n2", "executors": 4 }
  ]
}"#,
    );

    check(&project, &["--task", "lint", "--param", "BRANCH=main", "--param", "SHA=def"])
        .stdout_eq("blocked: identical run in progress\n");
    check(&project, &["--task", "lint", "--param", "BRANCH=dev"]).stdout_eq("allow\n");
    check(
        &project,
        &["--task", "lint", "--param", "BRANCH=dev", "--node", "n1"],
    )
    .stdout_eq("blocked: max per-node capacity reached (1/1)\n");
}

#[test]
fn unthrottled_task_is_admitted() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n1", "executors": 1, "running": [{ "task": "docs" }] }
  ]
}"#,
    );

    check(&project, &["--task", "docs", "--node", "n1"]).stdout_eq("allow\n");
}

#[test]
fn json_output_names_reason() {
    let project = project(
        r#"{
  "nodes": [
    { "name": "n1", "executors": 4,
      "running": [{ "task": "build" }, { "task": "build" }] }
  ]
}"#,
    );

    let out = check(
        &project,
        &["--task", "build", "--node", "n1", "--format", "json"],
    );
    let json = out.json();
    assert_eq!(json["task"], "build");
    assert_eq!(json["node"], "n1");
    assert_eq!(json["verdict"], "blocked");
    assert_eq!(json["reason"], "category_max_per_node");
    assert_eq!(json["category"], "cat");
    assert_eq!(json["count"], 2);
    assert_eq!(json["limit"], 2);
}

#[test]
fn debug_logging_goes_to_stderr() {
    let project = project(IDLE);
    project
        .throttle()
        .env("RUST_LOG", "debug")
        .args(&[
            "check",
            "--config",
            "throttle.toml",
            "--fleet",
            "fleet.json",
            "--task",
            "build",
        ])
        .passes()
        .stdout_eq("allow\n")
        .stderr_has("fleet snapshot loaded");
}

const SLOW: &str = r#"
[[category]]
name = "slow"
min_interval = "60s"

[task.a]
mode = "category"
categories = ["slow"]

[task.b]
mode = "category"
categories = ["slow"]
"#;

#[test]
fn category_interval_reads_snapshot_starts() {
    let project = Project::empty();
    project.file("throttle.toml", SLOW).file(
        "fleet.json",
        r#"{
  "nodes": [
    { "name": "n1", "executors": 4,
      "running": [{ "task": "a", "started_secs_ago": 1 }] },
    { "name": "n2", "executors": 4 }
  ]
}"#,
    );

    check(&project, &["--task", "b", "--node", "n1"])
        .stdout_eq("blocked: interval not yet elapsed for category slow\n");
    check(&project, &["--task", "b", "--node", "n2"]).stdout_eq("allow\n");
    check(&project, &["--task", "b"]).stdout_eq("allow\n");
}

const HELD: &str = r#"{"seq":1,"op":{"ScopeEntered":{"scope":"s-1","owner":"run-1","categories":["cat"]}}}
{"seq":2,"op":{"NodeBound":{"scope":"s-1","node":"n1"}}}
{"seq":3,"op":{"NodeBound":{"scope":"s-1","node":"n1"}}}
{"seq":4,"op":{"ScopeEntered":{"scope":"s-2","owner":"run-2","categories":["deploy"]}}}
{"seq":5,"op":{"NodeBound":{"scope":"s-2","node":"n2"}}}
"#;

#[test]
fn journaled_scopes_hold_capacity() {
    let project = project(IDLE);
    project.file("gate.wal", HELD);

    check(&project, &["--task", "build", "--node", "n1", "--wal", "gate.wal"])
        .stdout_eq("blocked: max per-node capacity reached for category cat (2/2)\n");
    check(&project, &["--task", "build", "--node", "n2", "--wal", "gate.wal"])
        .stdout_eq("allow\n");
    check(&project, &["--task", "release", "--wal", "gate.wal"])
        .stdout_eq("blocked: max total capacity reached for category deploy (1/1)\n");

    // Without the journal nothing is held
    check(&project, &["--task", "build", "--node", "n1"]).stdout_eq("allow\n");
    assert_eq!(std::fs::read_to_string(project.join("gate.wal")).unwrap(), HELD);
}
