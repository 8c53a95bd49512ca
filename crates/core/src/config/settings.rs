// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Throttle settings TOML parsing
//!
//! ```toml
//! [[category]]
//! name = "cat"
//! max_per_node = 3
//! min_interval = "10s"
//!
//! [[category.node_label]]
//! label = "linux"
//! max_per_node = 1
//!
//! [task.build-a]
//! mode = "category"
//! categories = ["cat"]
//! ```

use super::task::{MatrixOptions, TaskLimits, ThrottleConfig};
use crate::category::Category;
use crate::id::TaskId;
use crate::task::TaskKind;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("category name must not be empty")]
    EmptyCategoryName,
    #[error("category defined twice: {0}")]
    DuplicateCategory(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    category: Vec<RawCategory>,
    #[serde(default)]
    task: BTreeMap<String, RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategory {
    name: String,
    #[serde(default)]
    max_per_node: i64,
    #[serde(default)]
    max_total: i64,
    #[serde(default, with = "humantime_serde")]
    min_interval: Option<Duration>,
    #[serde(default)]
    node_label: Vec<RawLabelOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLabelOverride {
    label: String,
    #[serde(default)]
    max_per_node: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawMode {
    #[default]
    SingleTask,
    Category,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    mode: RawMode,
    #[serde(default)]
    kind: TaskKind,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    max_per_node: i64,
    #[serde(default)]
    max_total: i64,
    #[serde(default, with = "humantime_serde")]
    min_interval: Option<Duration>,
    matching_params: Option<Vec<String>>,
    #[serde(default = "default_true")]
    throttle_composite: bool,
    #[serde(default)]
    throttle_children: bool,
}

fn default_true() -> bool {
    true
}

/// A task entry from the settings file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSettings {
    pub id: TaskId,
    pub kind: TaskKind,
    pub config: ThrottleConfig,
}

/// Parsed settings: the category set and per-task configs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub categories: Vec<Category>,
    pub tasks: Vec<TaskSettings>,
}

impl ThrottleSettings {
    /// Parse settings from TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content)?;

        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(raw.category.len());
        for rc in raw.category {
            let name = rc.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateCategory(name));
            }
            categories.push(build_category(name, rc));
        }

        let mut tasks = Vec::with_capacity(raw.task.len());
        for (id, rt) in raw.task {
            tasks.push(build_task(id, rt)?);
        }

        Ok(Self { categories, tasks })
    }

    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn task(&self, id: &str) -> Option<&TaskSettings> {
        self.tasks.iter().find(|t| t.id.as_str() == id)
    }
}

fn build_category(name: String, rc: RawCategory) -> Category {
    let mut category = Category::new(name)
        .with_max_per_node(rc.max_per_node)
        .with_max_total(rc.max_total);
    for o in rc.node_label {
        category = category.with_label_override(o.label, o.max_per_node);
    }
    if let Some(interval) = rc.min_interval {
        category = category.with_min_interval(interval);
    }
    category
}

fn build_task(id: String, rt: RawTask) -> Result<TaskSettings, ConfigError> {
    let mut config = match rt.mode {
        RawMode::SingleTask => {
            if !rt.categories.is_empty() {
                return Err(ConfigError::InvalidFormat(format!(
                    "task.{}: categories require mode = \"category\"",
                    id
                )));
            }
            let mut limits = TaskLimits::new(rt.max_per_node, rt.max_total);
            if let Some(interval) = rt.min_interval {
                limits = limits.with_min_interval(interval);
            }
            ThrottleConfig::single_task(limits)
        }
        RawMode::Category => ThrottleConfig::categories(&rt.categories),
    };
    config.enabled = rt.enabled;
    config.matching_params = rt.matching_params;
    config.matrix = MatrixOptions {
        throttle_composite: rt.throttle_composite,
        throttle_children: rt.throttle_children,
    };

    Ok(TaskSettings {
        id: TaskId::new(id),
        kind: rt.kind,
        config,
    })
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
