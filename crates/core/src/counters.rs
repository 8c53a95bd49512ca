// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-category running counters fed by start/finish notifications
//!
//! Each category owns its own lock, so notifications for one category never
//! wait on another. Counts are keyed by run, which makes a duplicate start or
//! finish a no-op and lets a finish that overtakes its own start cancel that
//! start instead of leaving the count inflated. Only the most recent
//! [`EARLY_FINISH_LIMIT`] early finishes are remembered per category.

use crate::clock::Clock;
use crate::id::RunId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Count of running instances plus the most recent start
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunningEntry {
    pub count: u32,
    pub last_started: Option<Instant>,
}

impl RunningEntry {
    fn started(&mut self, at: Instant) {
        self.count = self.count.saturating_add(1);
        self.last_started = Some(self.last_started.map_or(at, |prev| prev.max(at)));
    }

    fn finished(&mut self) {
        self.count = self.count.saturating_sub(1);
    }
}

/// Early finishes remembered per category before the oldest is forgotten
pub const EARLY_FINISH_LIMIT: usize = 1024;

/// Finishes that arrived before their start, oldest first
#[derive(Debug, Default)]
struct EarlyFinishes {
    order: VecDeque<RunId>,
    runs: HashSet<RunId>,
}

impl EarlyFinishes {
    fn remember(&mut self, run: &RunId) {
        if !self.runs.insert(run.clone()) {
            return;
        }
        self.order.push_back(run.clone());
        while self.order.len() > EARLY_FINISH_LIMIT {
            if let Some(oldest) = self.order.pop_front() {
                self.runs.remove(&oldest);
            }
        }
    }

    fn take(&mut self, run: &RunId) -> bool {
        if !self.runs.remove(run) {
            return false;
        }
        self.order.retain(|r| r != run);
        true
    }

    fn len(&self) -> usize {
        self.runs.len()
    }
}

#[derive(Debug, Default)]
struct CategoryCounters {
    total: RunningEntry,
    per_node: HashMap<String, RunningEntry>,
    /// Node each tracked run started on
    runs: HashMap<RunId, String>,
    early_finishes: EarlyFinishes,
}

impl CategoryCounters {
    /// Release `run` if it is counted here
    fn release(&mut self, run: &RunId) -> bool {
        let Some(node) = self.runs.remove(run) else {
            return false;
        };
        self.total.finished();
        if let Some(per_node) = self.per_node.get_mut(&node) {
            per_node.finished();
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct RunningCounters {
    categories: RwLock<HashMap<String, Arc<Mutex<CategoryCounters>>>>,
}

impl RunningCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, category: &str) -> Option<Arc<Mutex<CategoryCounters>>> {
        self.categories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(category)
            .cloned()
    }

    /// Entry for `category`, created on first reference
    fn entry(&self, category: &str) -> Arc<Mutex<CategoryCounters>> {
        if let Some(existing) = self.existing(category) {
            return existing;
        }
        let mut categories = self.categories.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(categories.entry(category.to_string()).or_default())
    }

    pub fn on_started(&self, category: &str, node: &str, run: &RunId, at: Instant) {
        let entry = self.entry(category);
        let mut counters = entry.lock().unwrap_or_else(|e| e.into_inner());

        if counters.early_finishes.take(run) {
            tracing::debug!(category, node, %run, "start arrived after its finish, ignoring");
            return;
        }
        if counters.runs.contains_key(run) {
            tracing::debug!(category, node, %run, "duplicate start ignored");
            return;
        }
        counters.runs.insert(run.clone(), node.to_string());
        counters.total.started(at);
        counters.per_node.entry(node.to_string()).or_default().started(at);
    }

    pub fn on_finished(&self, category: &str, run: &RunId) {
        let entry = self.entry(category);
        let mut counters = entry.lock().unwrap_or_else(|e| e.into_inner());

        if !counters.release(run) {
            tracing::warn!(category, %run, "finish for untracked run");
            counters.early_finishes.remember(run);
        }
    }

    /// A run finished: release it from every category it was counted under,
    /// whatever the task's configuration says now. A run counted nowhere is
    /// remembered as an early finish under `expected`, the categories its
    /// start is expected to arrive for. Returns the number of categories the
    /// run was released from.
    pub fn on_run_finished<S: AsRef<str>>(&self, run: &RunId, expected: &[S]) -> usize {
        let all: Vec<Arc<Mutex<CategoryCounters>>> = self
            .categories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        let released = all
            .iter()
            .filter(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).release(run))
            .count();
        if released == 0 {
            for category in expected {
                self.on_finished(category.as_ref(), run);
            }
        }
        released
    }

    fn read<T>(&self, category: &str, f: impl FnOnce(&CategoryCounters) -> T) -> Option<T> {
        let entry = self.existing(category)?;
        let counters = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(f(&*counters))
    }

    pub fn total(&self, category: &str) -> RunningEntry {
        self.read(category, |c| c.total).unwrap_or_default()
    }

    pub fn on_node(&self, category: &str, node: &str) -> RunningEntry {
        self.read(category, |c| c.per_node.get(node).copied())
            .flatten()
            .unwrap_or_default()
    }

    /// Finishes remembered for `category` whose start has not arrived
    pub fn early_finishes(&self, category: &str) -> usize {
        self.read(category, |c| c.early_finishes.len())
            .unwrap_or_default()
    }

    /// Time since the latest start for `category` on `node`, if any
    pub fn elapsed_since_last_start(
        &self,
        category: &str,
        node: &str,
        clock: &impl Clock,
    ) -> Option<Duration> {
        self.on_node(category, node)
            .last_started
            .map(|at| clock.elapsed_since(at))
    }

    /// Drop counters for categories that are no longer defined
    pub fn retain_categories(&self, keep: impl Fn(&str) -> bool) {
        let mut categories = self.categories.write().unwrap_or_else(|e| e.into_inner());
        categories.retain(|name, _| {
            let kept = keep(name);
            if !kept {
                tracing::debug!(category = %name, "dropping counters for removed category");
            }
            kept
        });
    }

    pub fn tracked_categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "counters_tests.rs"]
mod tests;
