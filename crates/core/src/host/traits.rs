// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interfaces the admission engine consumes from the execution host

use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// A worker node and the labels assigned to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

/// Work currently occupying an executor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningWork {
    pub task: TaskId,
    pub started_at: Instant,
    pub params: BTreeMap<String, String>,
}

/// One executor slot on a node; idle when `current` is `None`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Executor {
    pub current: Option<RunningWork>,
}

/// Node inventory of the fleet
pub trait NodeInventory: Send + Sync {
    /// Every agent node, not including the built-in node
    fn all_nodes(&self) -> Vec<Node>;

    /// The controller's own node, when it has executors
    fn builtin_node(&self) -> Option<Node>;

    fn node(&self, name: &str) -> Option<Node> {
        self.builtin_node()
            .filter(|n| n.name == name)
            .or_else(|| self.all_nodes().into_iter().find(|n| n.name == name))
    }
}

/// Live executor occupancy, read on every admission check
pub trait ExecutorSnapshot: Send + Sync {
    fn executors_on(&self, node: &str) -> Vec<Executor>;
}

/// Queue state of the host scheduler
pub trait QueueState: Send + Sync {
    /// Whether another instance of `task` already passed admission and is
    /// about to start
    fn is_pending(&self, task: &TaskId) -> bool;
}

/// Reverse index from category name to the tasks configured with it
pub trait TaskCatalog: Send + Sync {
    /// Live tasks whose current config references `category`; deleted tasks
    /// and tasks since reconfigured away from it are excluded
    fn tasks_tagged_with(&self, category: &str) -> Vec<TaskId>;
}

/// Everything the engine reads from the host fleet
pub trait Fleet: NodeInventory + ExecutorSnapshot + QueueState {}

impl<T: NodeInventory + ExecutorSnapshot + QueueState> Fleet for T {}
