// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `throttle gate` journal specs

use crate::prelude::*;

const JOURNAL: &str = r#"{"seq":1,"op":{"ScopeEntered":{"scope":"s-1","owner":"run-1","categories":["cat"]}}}
{"seq":2,"op":{"NodeBound":{"scope":"s-1","node":"n1"}}}
{"seq":3,"op":{"ScopeEntered":{"scope":"s-2","owner":"run-1","parent":"s-1","categories":["cat","deploy"]}}}
{"seq":4,"op":{"NodeBound":{"scope":"s-2","node":"n2"}}}
{"seq":5,"op":{"ScopeEntered":{"scope":"s-3","owner":"run-2","categories":["deploy"]}}}
{"seq":6,"op":{"ScopeFinished":{"scope":"s-3"}}}
"#;

#[test]
fn status_shows_running_set_per_category() {
    let project = Project::empty();
    project.file("gate.wal", JOURNAL);

    project
        .throttle()
        .args(&["gate", "status", "--wal", "gate.wal"])
        .passes()
        .stdout_has("CATEGORY")
        .stdout_has("n1=1,n2=1")
        .stdout_has("deploy");
}

#[test]
fn status_json_counts_scopes_and_nodes() {
    let project = Project::empty();
    project.file("gate.wal", JOURNAL);

    let out = project
        .throttle()
        .args(&["gate", "status", "--wal", "gate.wal", "--format", "json"])
        .passes();
    let json = out.json();
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0]["category"], "cat");
    assert_eq!(rows[0]["scopes"], 2);
    assert_eq!(rows[0]["owners"], 1);
    assert_eq!(rows[0]["nodes"]["n1"], 1);
    assert_eq!(rows[0]["nodes"]["n2"], 1);

    assert_eq!(rows[1]["category"], "deploy");
    assert_eq!(rows[1]["scopes"], 1);
    assert_eq!(rows[1]["nodes"]["n2"], 1);
}

#[test]
fn status_leaves_journal_untouched() {
    let project = Project::empty();
    project.file("gate.wal", JOURNAL);

    project
        .throttle()
        .args(&["gate", "status", "--wal", "gate.wal"])
        .passes();
    assert_eq!(
        std::fs::read_to_string(project.join("gate.wal")).unwrap(),
        JOURNAL
    );
}

#[test]
fn missing_journal_has_no_running_scopes() {
    Project::empty()
        .throttle()
        .args(&["gate", "status", "--wal", "gate.wal"])
        .passes()
        .stdout_eq("No running scopes\n");
}

#[test]
fn torn_final_entry_is_ignored() {
    let project = Project::empty();
    project.file(
        "gate.wal",
        &format!("{JOURNAL}{{\"seq\":7,\"op\":{{\"ScopeFinished\":{{\"sco"),
    );

    project
        .throttle()
        .args(&["gate", "scopes", "--wal", "gate.wal"])
        .passes()
        .stdout_has("s-1")
        .stdout_has("s-2")
        .stdout_lacks("s-3");
}

#[test]
fn scopes_lists_parents_and_bound_nodes() {
    let project = Project::empty();
    project.file("gate.wal", JOURNAL);

    let out = project
        .throttle()
        .args(&["gate", "scopes", "--wal", "gate.wal", "--format", "json"])
        .passes();
    let json = out.json();
    let scopes = json.as_array().unwrap();
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0]["id"], "s-1");
    assert!(scopes[0].get("parent").is_none());
    assert_eq!(scopes[1]["parent"], "s-1");
    assert_eq!(scopes[1]["categories"], serde_json::json!(["cat", "deploy"]));
    assert_eq!(scopes[1]["nodes"], serde_json::json!(["n2"]));
}

#[test]
fn corrupt_journal_is_an_error() {
    let project = Project::empty();
    project.file("gate.wal", &format!("garbage\n{JOURNAL}"));

    project
        .throttle()
        .args(&["gate", "status", "--wal", "gate.wal"])
        .fails()
        .stderr_has("reading gate.wal");
}
