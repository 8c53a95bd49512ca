// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task throttle configuration

use crate::category::normalize_limit;
use crate::task::TaskKind;
use std::collections::HashSet;
use std::time::Duration;

/// Limits used when a task is throttled on its own, without categories
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskLimits {
    pub max_per_node: u32,
    pub max_total: u32,
    /// Minimum time since the most recent start on the same node
    pub min_interval: Option<Duration>,
}

impl TaskLimits {
    pub fn new(max_per_node: i64, max_total: i64) -> Self {
        Self {
            max_per_node: normalize_limit(max_per_node),
            max_total: normalize_limit(max_total),
            min_interval: None,
        }
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = (!interval.is_zero()).then_some(interval);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThrottleMode {
    SingleTask(TaskLimits),
    /// Category names in declared order, duplicates already collapsed
    Category(Vec<String>),
}

/// Which parts of a matrix build are throttled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixOptions {
    pub throttle_composite: bool,
    pub throttle_children: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            throttle_composite: true,
            throttle_children: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub mode: ThrottleMode,
    /// When set, two runs with equal values for these parameters may not
    /// run at the same time. An empty list compares every parameter.
    pub matching_params: Option<Vec<String>>,
    pub matrix: MatrixOptions,
}

impl ThrottleConfig {
    pub fn single_task(limits: TaskLimits) -> Self {
        Self {
            enabled: true,
            mode: ThrottleMode::SingleTask(limits),
            matching_params: None,
            matrix: MatrixOptions::default(),
        }
    }

    pub fn categories<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            enabled: true,
            mode: ThrottleMode::Category(dedup_categories(names)),
            matching_params: None,
            matrix: MatrixOptions::default(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_matching_params(mut self, names: Vec<String>) -> Self {
        self.matching_params = Some(names);
        self
    }

    pub fn with_matrix(mut self, matrix: MatrixOptions) -> Self {
        self.matrix = matrix;
        self
    }

    /// Category names this config references, empty in single-task mode
    pub fn category_names(&self) -> &[String] {
        match &self.mode {
            ThrottleMode::Category(names) => names,
            ThrottleMode::SingleTask(_) => &[],
        }
    }

    /// Whether admission checks apply to a task of this kind at all
    pub fn applies_to(&self, kind: TaskKind) -> bool {
        if !self.enabled {
            return false;
        }
        match kind {
            TaskKind::Plain => true,
            TaskKind::Composite => self.matrix.throttle_composite,
            TaskKind::CompositeChild => self.matrix.throttle_children,
        }
    }
}

/// Collapse repeated category names, keeping first-occurrence order.
///
/// Blank names are dropped. Each collapsed duplicate is logged once.
pub fn dedup_categories<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            out.push(name.to_string());
        } else {
            tracing::warn!(category = name, "duplicate category collapsed");
        }
    }
    out
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
