// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live node occupancy
//!
//! Counts are read from the executor snapshot on every call rather than from
//! cached counters, so lost start/finish notifications cannot skew them. All
//! counting is parameterized by a set of tasks: a single task in task mode,
//! every task tagged with a category in category mode.

use crate::host::{ExecutorSnapshot, NodeInventory, RunningWork};
use crate::id::TaskId;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

/// The tasks whose running instances are counted together
#[derive(Clone, Debug, Default)]
pub struct TaskSet(HashSet<TaskId>);

impl TaskSet {
    pub fn single(task: &TaskId) -> Self {
        Self(HashSet::from([task.clone()]))
    }

    pub fn contains(&self, task: &TaskId) -> bool {
        self.0.contains(task)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<TaskId> for TaskSet {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct NodeOccupancy<'a, F: ?Sized> {
    fleet: &'a F,
}

impl<'a, F> NodeOccupancy<'a, F>
where
    F: NodeInventory + ExecutorSnapshot + ?Sized,
{
    pub fn new(fleet: &'a F) -> Self {
        Self { fleet }
    }

    fn running_on(&self, node: &str) -> impl Iterator<Item = RunningWork> {
        self.fleet
            .executors_on(node)
            .into_iter()
            .filter_map(|e| e.current)
    }

    /// Names of every agent node plus the built-in node
    fn fleet_node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fleet.all_nodes().into_iter().map(|n| n.name).collect();
        if let Some(builtin) = self.fleet.builtin_node() {
            if !names.contains(&builtin.name) {
                names.push(builtin.name);
            }
        }
        names
    }

    /// Instances of any task in `tasks` occupying executors on `node`
    pub fn count_running(&self, tasks: &TaskSet, node: &str) -> u32 {
        if tasks.is_empty() {
            return 0;
        }
        let count = self
            .running_on(node)
            .filter(|w| tasks.contains(&w.task))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// `count_running` summed over every node and the built-in node
    pub fn count_running_all_nodes(&self, tasks: &TaskSet) -> u32 {
        if tasks.is_empty() {
            return 0;
        }
        self.fleet_node_names()
            .iter()
            .map(|node| self.count_running(tasks, node))
            .fold(0u32, u32::saturating_add)
    }

    /// Smallest time since start among instances of `tasks` on `node`;
    /// `None` when nothing is running there
    pub fn min_elapsed_since_last_start(
        &self,
        tasks: &TaskSet,
        node: &str,
        now: Instant,
    ) -> Option<Duration> {
        self.running_on(node)
            .filter(|w| tasks.contains(&w.task))
            .map(|w| now.saturating_duration_since(w.started_at))
            .min()
    }

    /// Parameters of every running instance of `task`, across the fleet
    pub fn running_params(&self, task: &TaskId) -> Vec<BTreeMap<String, String>> {
        self.fleet_node_names()
            .iter()
            .flat_map(|node| self.running_on(node).collect::<Vec<_>>())
            .filter(|w| &w.task == task)
            .map(|w| w.params)
            .collect()
    }
}

/// Whether two runs are identical with respect to `names`; an empty list
/// compares every parameter
pub fn params_match(
    names: &[String],
    a: &BTreeMap<String, String>,
    b: &BTreeMap<String, String>,
) -> bool {
    if names.is_empty() {
        return a == b;
    }
    names.iter().all(|name| a.get(name) == b.get(name))
}

#[cfg(test)]
#[path = "occupancy_tests.rs"]
mod tests;
