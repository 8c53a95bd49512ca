// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate work as seen by the admission check

use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of a task with respect to matrix fan-out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Plain,
    /// Parent of a matrix; fans out into per-axis children
    Composite,
    /// One generated child of a matrix
    CompositeChild,
}

/// One queued unit of work waiting for admission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueItem {
    pub task: TaskId,
    /// `None` means the kind the task was registered with
    pub kind: Option<TaskKind>,
    /// Build parameters, compared by matching-parameter deduplication
    pub params: BTreeMap<String, String>,
}

impl QueueItem {
    pub fn new(task: impl Into<TaskId>) -> Self {
        Self {
            task: task.into(),
            kind: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Kind to throttle this item as, given the kind it was registered with
    pub fn kind_or(&self, registered: TaskKind) -> TaskKind {
        self.kind.unwrap_or(registered)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for QueueItem {
    fn from(task: &str) -> Self {
        Self::new(task)
    }
}
