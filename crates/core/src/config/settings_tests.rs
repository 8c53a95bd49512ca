// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::ThrottleMode;
use std::collections::BTreeSet;

const SAMPLE: &str = r#"
[[category]]
name = "cat"
max_per_node = 3
max_total = -1
min_interval = "10s"

[[category.node_label]]
label = "linux"
max_per_node = 1

[[category.node_label]]
label = "big"
max_per_node = 6

[[category]]
name = "deploy"
max_total = 1

[task.build-a]
mode = "category"
categories = ["cat", "deploy", "cat"]
matching_params = ["BRANCH"]

[task.nightly]
max_per_node = 1
max_total = 2
min_interval = "1m"
kind = "composite"
throttle_children = true
"#;

#[test]
fn parses_categories_in_file_order() {
    let settings = ThrottleSettings::parse(SAMPLE).unwrap();
    let names: Vec<_> = settings.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["cat", "deploy"]);

    let cat = &settings.categories[0];
    assert_eq!(cat.max_per_node, 3);
    assert_eq!(cat.max_total, 0);
    assert_eq!(cat.min_interval, Some(Duration::from_secs(10)));
    assert_eq!(cat.node_labels.len(), 2);
    assert_eq!(cat.node_labels[0].label, "linux");

    let both: BTreeSet<String> = ["big".to_string(), "linux".to_string()].into();
    assert_eq!(cat.per_node_limit(&both), 1);
}

#[test]
fn parses_category_task_and_collapses_duplicates() {
    let settings = ThrottleSettings::parse(SAMPLE).unwrap();
    let task = settings.task("build-a").unwrap();
    assert_eq!(task.kind, TaskKind::Plain);
    assert_eq!(
        task.config.mode,
        ThrottleMode::Category(vec!["cat".to_string(), "deploy".to_string()])
    );
    assert_eq!(task.config.matching_params, Some(vec!["BRANCH".to_string()]));
}

#[test]
fn parses_single_task_defaults() {
    let settings = ThrottleSettings::parse(SAMPLE).unwrap();
    let task = settings.task("nightly").unwrap();
    assert_eq!(task.kind, TaskKind::Composite);
    assert!(task.config.enabled);
    assert!(task.config.matrix.throttle_composite);
    assert!(task.config.matrix.throttle_children);
    match &task.config.mode {
        ThrottleMode::SingleTask(limits) => {
            assert_eq!(limits.max_per_node, 1);
            assert_eq!(limits.max_total, 2);
            assert_eq!(limits.min_interval, Some(Duration::from_secs(60)));
        }
        other => panic!("unexpected mode: {:?}", other),
    }
}

#[test]
fn empty_file_is_empty_settings() {
    let settings = ThrottleSettings::parse("").unwrap();
    assert!(settings.categories.is_empty());
    assert!(settings.tasks.is_empty());
}

#[test]
fn empty_category_name_is_rejected() {
    let err = ThrottleSettings::parse("[[category]]\nname = \" \"\n").unwrap_err();
    assert!(matches!(err, ConfigError::EmptyCategoryName));
}

#[test]
fn duplicate_category_definition_is_rejected() {
    let err = ThrottleSettings::parse(
        "[[category]]\nname = \"a\"\n[[category]]\nname = \"a\"\nmax_total = 2\n",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateCategory(name) if name == "a"));
}

#[test]
fn categories_without_category_mode_are_rejected() {
    let err = ThrottleSettings::parse("[task.x]\ncategories = [\"a\"]\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidFormat(msg) if msg.contains("task.x")));
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ThrottleSettings::parse("[[category]]\nname = \"a\"\nmax = 1\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ThrottleSettings::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn load_reads_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("throttle.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    let settings = ThrottleSettings::load(&path).unwrap();
    assert_eq!(settings.tasks.len(), 2);
}
