// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission decisions
//!
//! [`ThrottlePolicy::can_run`] decides whether a task may run anywhere;
//! [`ThrottlePolicy::can_take`] whether it may run on one node. Both are
//! read-only: they never charge or release capacity.
//!
//! Unknown category names are skipped here. Scoped work resolves its
//! categories strictly in [`crate::gate::PipelineGate`] instead.

use crate::category::Category;
use crate::clock::Clock;
use crate::config::{TaskLimits, ThrottleConfig, ThrottleMode};
use crate::counters::RunningCounters;
use crate::gate::CategoryUsage;
use crate::host::{Fleet, Node, TaskCatalog};
use crate::occupancy::{params_match, NodeOccupancy, TaskSet};
use crate::registry::CategorySet;
use crate::task::{QueueItem, TaskKind};
use crate::verdict::{BlockReason, Verdict};
use std::time::Duration;

pub struct ThrottlePolicy<'a, F: Fleet + ?Sized, C: Clock> {
    categories: &'a CategorySet,
    catalog: &'a dyn TaskCatalog,
    fleet: &'a F,
    counters: &'a RunningCounters,
    clock: &'a C,
    scopes: Option<&'a dyn CategoryUsage>,
}

impl<'a, F: Fleet + ?Sized, C: Clock> ThrottlePolicy<'a, F, C> {
    pub fn new(
        categories: &'a CategorySet,
        catalog: &'a dyn TaskCatalog,
        fleet: &'a F,
        counters: &'a RunningCounters,
        clock: &'a C,
    ) -> Self {
        Self {
            categories,
            catalog,
            fleet,
            counters,
            clock,
            scopes: None,
        }
    }

    /// Also count capacity held by running pipeline scopes
    pub fn with_scopes(mut self, scopes: &'a dyn CategoryUsage) -> Self {
        self.scopes = Some(scopes);
        self
    }

    fn occupancy(&self) -> NodeOccupancy<'a, F> {
        NodeOccupancy::new(self.fleet)
    }

    fn tagged(&self, category: &str) -> TaskSet {
        self.catalog.tasks_tagged_with(category).into_iter().collect()
    }

    fn scope_node_usage(&self, category: &str, node: &str) -> u32 {
        self.scopes.map_or(0, |s| s.node_usage(category, node))
    }

    fn scope_total_usage(&self, category: &str) -> u32 {
        self.scopes.map_or(0, |s| s.total_usage(category))
    }

    fn resolve(&self, name: &str) -> Option<&'a Category> {
        let found = self.categories.lookup(name);
        if found.is_none() {
            tracing::trace!(category = name, "skipping unknown category");
        }
        found
    }

    /// Whether admission rules apply to `item` under `config` at all
    pub fn should_throttle(&self, item: &QueueItem, config: Option<&ThrottleConfig>) -> bool {
        config.is_some_and(|c| c.applies_to(item.kind_or(TaskKind::Plain)))
    }

    pub fn can_run(&self, item: &QueueItem, config: Option<&ThrottleConfig>) -> Verdict {
        let Some(config) = config.filter(|c| c.applies_to(item.kind_or(TaskKind::Plain))) else {
            return Verdict::Allow;
        };
        let verdict = self.check_run(item, config);
        tracing::debug!(task = %item.task, verdict = %verdict, "can_run");
        verdict
    }

    pub fn can_take(
        &self,
        node: &Node,
        item: &QueueItem,
        config: Option<&ThrottleConfig>,
    ) -> Verdict {
        let Some(config) = config.filter(|c| c.applies_to(item.kind_or(TaskKind::Plain))) else {
            return Verdict::Allow;
        };

        let verdict = match self.check_run(item, config) {
            Verdict::Allow => self.check_take(node, item, config),
            blocked => blocked,
        };
        tracing::debug!(task = %item.task, node = %node.name, verdict = %verdict, "can_take");
        verdict
    }

    fn check_run(&self, item: &QueueItem, config: &ThrottleConfig) -> Verdict {
        if self.fleet.is_pending(&item.task) {
            return BlockReason::BuildPending.into();
        }

        if let Some(names) = &config.matching_params {
            let identical = self
                .occupancy()
                .running_params(&item.task)
                .iter()
                .any(|running| params_match(names, running, &item.params));
            if identical {
                return BlockReason::IdenticalRunInProgress.into();
            }
        }

        match &config.mode {
            ThrottleMode::SingleTask(limits) => self.check_task_total(item, limits),
            ThrottleMode::Category(names) => self.check_category_totals(names),
        }
    }

    fn check_task_total(&self, item: &QueueItem, limits: &TaskLimits) -> Verdict {
        if limits.max_total == 0 {
            return Verdict::Allow;
        }
        let count = self
            .occupancy()
            .count_running_all_nodes(&TaskSet::single(&item.task));
        if count >= limits.max_total {
            return BlockReason::MaxTotal {
                count,
                limit: limits.max_total,
            }
            .into();
        }
        Verdict::Allow
    }

    fn check_category_totals(&self, names: &[String]) -> Verdict {
        for category in names.iter().filter_map(|name| self.resolve(name)) {
            if category.max_total == 0 {
                continue;
            }
            let count = self.category_total(&category.name);
            if count >= category.max_total {
                return BlockReason::CategoryMaxTotal {
                    category: category.name.clone(),
                    count,
                    limit: category.max_total,
                }
                .into();
            }
        }
        Verdict::Allow
    }

    fn check_take(&self, node: &Node, item: &QueueItem, config: &ThrottleConfig) -> Verdict {
        match &config.mode {
            ThrottleMode::SingleTask(limits) => self.check_task_node(node, item, limits),
            ThrottleMode::Category(names) => self.check_category_nodes(node, names),
        }
    }

    fn check_task_node(&self, node: &Node, item: &QueueItem, limits: &TaskLimits) -> Verdict {
        let tasks = TaskSet::single(&item.task);
        let occupancy = self.occupancy();

        if limits.max_per_node > 0 {
            let count = occupancy.count_running(&tasks, &node.name);
            if count >= limits.max_per_node {
                return BlockReason::MaxPerNode {
                    count,
                    limit: limits.max_per_node,
                }
                .into();
            }
        }

        if let Some(interval) = limits.min_interval {
            let elapsed =
                occupancy.min_elapsed_since_last_start(&tasks, &node.name, self.clock.now());
            if let Some(elapsed) = elapsed.filter(|e| *e < interval) {
                return BlockReason::IntervalNotElapsed {
                    remaining: interval - elapsed,
                }
                .into();
            }
        }
        Verdict::Allow
    }

    fn check_category_nodes(&self, node: &Node, names: &[String]) -> Verdict {
        for category in names.iter().filter_map(|name| self.resolve(name)) {
            let limit = category.per_node_limit(&node.labels);
            if limit > 0 {
                let count = self.category_on_node(&category.name, &node.name);
                if count >= limit {
                    return BlockReason::CategoryMaxPerNode {
                        category: category.name.clone(),
                        count,
                        limit,
                    }
                    .into();
                }
            }

            if let Some(interval) = category.min_interval {
                let elapsed = self.category_elapsed(&category.name, &node.name);
                if let Some(elapsed) = elapsed.filter(|e| *e < interval) {
                    return BlockReason::CategoryIntervalNotElapsed {
                        category: category.name.clone(),
                        remaining: interval - elapsed,
                    }
                    .into();
                }
            }
        }
        Verdict::Allow
    }

    /// Time since the latest start of a task tagged `category` on `node`,
    /// from live executors and recorded start notifications
    fn category_elapsed(&self, category: &str, node: &str) -> Option<Duration> {
        let live = self.occupancy().min_elapsed_since_last_start(
            &self.tagged(category),
            node,
            self.clock.now(),
        );
        let recorded = self
            .counters
            .elapsed_since_last_start(category, node, self.clock);
        match (live, recorded) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Running instances of tasks tagged `category` on `node`, plus scopes
    pub fn category_on_node(&self, category: &str, node: &str) -> u32 {
        self.node_usage(category, node)
            .saturating_add(self.scope_node_usage(category, node))
    }

    /// Running instances of tasks tagged `category` fleet-wide, plus scopes
    pub fn category_total(&self, category: &str) -> u32 {
        self.total_usage(category)
            .saturating_add(self.scope_total_usage(category))
    }
}

/// Task-level usage only, for checking scoped work against the same category
impl<F: Fleet + ?Sized, C: Clock> CategoryUsage for ThrottlePolicy<'_, F, C> {
    fn node_usage(&self, category: &str, node: &str) -> u32 {
        self.occupancy().count_running(&self.tagged(category), node)
    }

    fn total_usage(&self, category: &str) -> u32 {
        self.occupancy()
            .count_running_all_nodes(&self.tagged(category))
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
