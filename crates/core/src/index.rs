// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task index: which tasks are configured with which category
//!
//! Keeps the current config of every registered task and a reverse index
//! from category name to task. Registering a task again replaces its old
//! config, so a reconfigured task drops out of categories it left.

use crate::config::ThrottleConfig;
use crate::host::TaskCatalog;
use crate::id::TaskId;
use crate::task::TaskKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// A registered task and its current configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedTask {
    pub kind: TaskKind,
    pub config: ThrottleConfig,
}

#[derive(Debug, Default)]
struct IndexState {
    tasks: HashMap<TaskId, IndexedTask>,
    by_category: HashMap<String, BTreeSet<TaskId>>,
}

impl IndexState {
    fn unlink(&mut self, task: &TaskId, config: &ThrottleConfig) {
        for name in config.category_names() {
            if let Some(tagged) = self.by_category.get_mut(name) {
                tagged.remove(task);
                if tagged.is_empty() {
                    self.by_category.remove(name);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskIndex {
    state: RwLock<IndexState>,
}

impl TaskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or reconfigure a task
    pub fn register(&self, task: TaskId, kind: TaskKind, config: ThrottleConfig) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = state.tasks.remove(&task) {
            state.unlink(&task, &previous.config);
        }
        for name in config.category_names() {
            state
                .by_category
                .entry(name.clone())
                .or_default()
                .insert(task.clone());
        }
        state.tasks.insert(task, IndexedTask { kind, config });
    }

    /// Forget a deleted task; true if it was registered
    pub fn remove(&self, task: &TaskId) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match state.tasks.remove(task) {
            Some(previous) => {
                state.unlink(task, &previous.config);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, task: &TaskId) -> Option<IndexedTask> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .tasks
            .get(task)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-key after the category set changed: rebuild the reverse index
    /// from the registered configs, keeping only categories that exist now
    pub fn retain_categories(&self, keep: impl Fn(&str) -> bool) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut by_category: HashMap<String, BTreeSet<TaskId>> = HashMap::new();
        for (task, indexed) in &state.tasks {
            for name in indexed.config.category_names() {
                if keep(name) {
                    by_category
                        .entry(name.clone())
                        .or_default()
                        .insert(task.clone());
                }
            }
        }
        state.by_category = by_category;
    }
}

impl TaskCatalog for TaskIndex {
    fn tasks_tagged_with(&self, category: &str) -> Vec<TaskId> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_category
            .get(category)
            .map(|tagged| tagged.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
