// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `throttle categories` specs

use crate::prelude::*;

#[test]
fn lists_categories_in_file_order() {
    let project = Project::empty();
    project.file("throttle.toml", SETTINGS);

    let out = project
        .throttle()
        .args(&["categories", "--config", "throttle.toml"])
        .passes()
        .stdout_has("NAME")
        .stdout_has("small=1");
    let stdout = out.stdout();
    let cat = stdout.find("cat ").unwrap();
    let deploy = stdout.find("deploy ").unwrap();
    assert!(cat < deploy, "categories out of order:\n{stdout}");
}

#[test]
fn json_output_carries_limits() {
    let project = Project::empty();
    project.file("throttle.toml", SETTINGS);

    let out = project
        .throttle()
        .args(&["categories", "--config", "throttle.toml", "--format", "json"])
        .passes();
    let json = out.json();
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], "cat");
    assert_eq!(list[0]["max_per_node"], 2);
    assert_eq!(list[0]["max_total"], 3);
    assert_eq!(list[0]["node_labels"][0]["label"], "small");
    assert_eq!(list[1]["name"], "deploy");
    assert_eq!(list[1]["max_per_node"], 0);
}

#[test]
fn negative_limits_list_as_unlimited() {
    let project = Project::empty();
    project.file(
        "throttle.toml",
        "[[category]]\nname = \"loose\"\nmax_per_node = -5\nmin_interval = \"30s\"\n",
    );

    let out = project
        .throttle()
        .args(&["categories", "--config", "throttle.toml", "--format", "json"])
        .passes();
    assert_eq!(out.json()[0]["max_per_node"], 0);
    assert_eq!(out.json()[0]["min_interval"], "30s");
}

#[test]
fn empty_settings_report_no_categories() {
    let project = Project::empty();
    project.file("throttle.toml", "");

    project
        .throttle()
        .args(&["categories", "--config", "throttle.toml"])
        .passes()
        .stdout_eq("No categories\n");
}

#[test]
fn duplicate_category_is_rejected() {
    let project = Project::empty();
    project.file(
        "throttle.toml",
        "[[category]]\nname = \"cat\"\n\n[[category]]\nname = \"cat\"\n",
    );

    project
        .throttle()
        .args(&["categories", "--config", "throttle.toml"])
        .fails()
        .stderr_has("category defined twice: cat");
}

#[test]
fn missing_settings_file_is_reported() {
    Project::empty()
        .throttle()
        .args(&["categories", "--config", "nope.toml"])
        .fails()
        .stderr_has("loading nope.toml");
}
