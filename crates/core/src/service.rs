// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Throttle service
//!
//! Owns the category registry, running counters, task index and pipeline
//! gate for one host. Nothing here is process-global: every test builds its
//! own service.

use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::config::{ThrottleConfig, ThrottleSettings};
use crate::counters::RunningCounters;
use crate::gate::{FinishedScope, GateError, PipelineGate};
use crate::host::{Fleet, Node};
use crate::id::{IdGen, OwnerId, RunId, ScopeId, TaskId, UuidIdGen};
use crate::index::TaskIndex;
use crate::policy::ThrottlePolicy;
use crate::registry::CategoryRegistry;
use crate::task::{QueueItem, TaskKind};
use crate::verdict::Verdict;
use std::borrow::Cow;
use std::sync::Arc;

pub struct ThrottleService<F: Fleet, C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    registry: CategoryRegistry,
    counters: RunningCounters,
    index: TaskIndex,
    gate: Arc<PipelineGate<I>>,
    fleet: F,
    clock: C,
}

impl<F: Fleet> ThrottleService<F> {
    pub fn new(fleet: F) -> Self {
        Self::with_parts(fleet, SystemClock, Arc::new(PipelineGate::new()))
    }
}

impl<F: Fleet, C: Clock, I: IdGen> ThrottleService<F, C, I> {
    /// Build a service around an existing gate, e.g. one restored from disk
    pub fn with_parts(fleet: F, clock: C, gate: Arc<PipelineGate<I>>) -> Self {
        Self {
            registry: CategoryRegistry::new(),
            counters: RunningCounters::new(),
            index: TaskIndex::new(),
            gate,
            fleet,
            clock,
        }
    }

    /// Load categories and task configs from parsed settings
    pub fn apply_settings(&self, settings: &ThrottleSettings) {
        self.upsert_categories(settings.categories.clone());
        for task in &settings.tasks {
            self.register_task(task.id.clone(), task.kind, task.config.clone());
        }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn counters(&self) -> &RunningCounters {
        &self.counters
    }

    pub fn index(&self) -> &TaskIndex {
        &self.index
    }

    pub fn gate(&self) -> &Arc<PipelineGate<I>> {
        &self.gate
    }

    pub fn fleet(&self) -> &F {
        &self.fleet
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Replace the whole category set, then re-key everything indexed by
    /// category name. Returns the names that were removed.
    pub fn upsert_categories(&self, categories: Vec<Category>) -> Vec<String> {
        let removed = self.registry.upsert_categories(categories);
        let current = self.registry.snapshot();
        self.index.retain_categories(|name| current.contains(name));
        self.counters.retain_categories(|name| current.contains(name));
        removed
    }

    pub fn register_task(&self, task: TaskId, kind: TaskKind, config: ThrottleConfig) {
        self.index.register(task, kind, config);
    }

    pub fn remove_task(&self, task: &TaskId) -> bool {
        self.index.remove(task)
    }

    pub fn config_for(&self, task: &TaskId) -> Option<ThrottleConfig> {
        self.index.get(task).map(|t| t.config)
    }

    /// Evaluate with a policy over the current category snapshot, counting
    /// capacity held by running scopes
    pub fn with_policy<T>(&self, f: impl FnOnce(&ThrottlePolicy<'_, F, C>) -> T) -> T {
        let categories = self.registry.snapshot();
        let policy = ThrottlePolicy::new(
            &categories,
            &self.index,
            &self.fleet,
            &self.counters,
            &self.clock,
        )
        .with_scopes(self.gate.as_ref());
        f(&policy)
    }

    /// The item with its registered kind filled in, and its config
    fn resolve<'i>(&self, item: &'i QueueItem) -> (Cow<'i, QueueItem>, Option<ThrottleConfig>) {
        let Some(indexed) = self.index.get(&item.task) else {
            return (Cow::Borrowed(item), None);
        };
        let item = match item.kind {
            Some(_) => Cow::Borrowed(item),
            None => Cow::Owned(item.clone().with_kind(indexed.kind)),
        };
        (item, Some(indexed.config))
    }

    pub fn can_run(&self, item: &QueueItem) -> Verdict {
        let (item, config) = self.resolve(item);
        self.with_policy(|p| p.can_run(&item, config.as_ref()))
    }

    pub fn can_take(&self, node: &Node, item: &QueueItem) -> Verdict {
        let (item, config) = self.resolve(item);
        self.with_policy(|p| p.can_take(node, &item, config.as_ref()))
    }

    /// `can_take` for a node known to the fleet by name; an unknown node is
    /// checked without labels
    pub fn can_take_on(&self, node: &str, item: &QueueItem) -> Verdict {
        let node = self.fleet.node(node).unwrap_or_else(|| {
            tracing::warn!(node, "node not in inventory, checking without labels");
            Node::new(node)
        });
        self.can_take(&node, item)
    }

    /// A run of `task` started on `node`
    pub fn on_task_started(&self, run: &RunId, task: &TaskId, node: &str) {
        let Some(config) = self.config_for(task) else {
            return;
        };
        let now = self.clock.now();
        for category in config.category_names() {
            self.counters.on_started(category, node, run, now);
        }
    }

    /// A run of `task` finished; safe to call for runs never reported
    /// started. The run is released from the categories it started under
    /// even if `task` was reconfigured in between.
    pub fn on_task_finished(&self, run: &RunId, task: &TaskId) {
        let expected = self
            .config_for(task)
            .map(|c| c.category_names().to_vec())
            .unwrap_or_default();
        self.counters.on_run_finished(run, expected.as_slice());
    }

    pub fn enter_scope<S: AsRef<str>>(
        &self,
        owner: &OwnerId,
        parent: Option<&ScopeId>,
        categories: &[S],
    ) -> Result<ScopeId, GateError> {
        let known = self.registry.snapshot();
        self.gate.enter(owner, parent, categories, &known)
    }

    pub fn bind_node(&self, scope: &ScopeId, node: &str) -> Result<(), GateError> {
        self.gate.bind_node(scope, node)
    }

    pub fn release_node(&self, scope: &ScopeId, node: &str) -> bool {
        self.gate.release_node(scope, node)
    }

    pub fn finish_scope(&self, scope: &ScopeId) -> Option<FinishedScope> {
        self.gate.finish(scope)
    }

    pub fn finish_owner(&self, owner: &OwnerId) -> Vec<FinishedScope> {
        self.gate.finish_owner(owner)
    }

    /// Admission of work inside `scope` onto `node`, counting task-level
    /// users of the same categories
    pub fn can_take_scope(&self, scope: &ScopeId, node: &Node) -> Result<Verdict, GateError> {
        let known = self.registry.snapshot();
        let task_level = ThrottlePolicy::new(
            &known,
            &self.index,
            &self.fleet,
            &self.counters,
            &self.clock,
        );
        let verdict = self.gate.can_take(scope, node, &known, &task_level)?;
        tracing::debug!(scope = %scope, node = %node.name, verdict = %verdict, "can_take_scope");
        Ok(verdict)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
