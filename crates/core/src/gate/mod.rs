// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline gate: category throttling for nested scopes of work
//!
//! A scope is RUNNING from a successful [`PipelineGate::enter`] until its
//! [`PipelineGate::finish`]. Entry resolves every category up front and
//! fails on any unknown name; there is no lenient fallback at this level.
//!
//! There is no gate-wide lock. Scopes live in a concurrent arena with
//! immutable categories, and each category's running-set has its own lock,
//! so a check against category X only ever locks X's set. A scope's
//! binding lock is taken before category locks, never after.

mod arena;
mod running_set;
mod storage;

pub use arena::{NodeBinding, ScopeArena, ScopeEntry, ScopeRecord};
pub use running_set::CategoryRunningSet;
pub use storage::{RestoreReport, StorableGateState, StorableScope};

use crate::config::dedup_categories;
use crate::host::Node;
use crate::id::{IdGen, OwnerId, ScopeId, UuidIdGen};
use crate::registry::CategorySet;
use crate::verdict::{BlockReason, Verdict};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("unknown categories: {}", .0.join(", "))]
    UnknownCategories(Vec<String>),
    #[error("scope declares no categories")]
    NoCategories,
    #[error("unknown parent scope: {0}")]
    UnknownScope(ScopeId),
    #[error("scope is not running: {0}")]
    NotRunning(ScopeId),
}

/// Usage of a category by work outside any scope
pub trait CategoryUsage {
    fn node_usage(&self, category: &str, node: &str) -> u32;
    fn total_usage(&self, category: &str) -> u32;
}

/// No task-level usage, for callers that only throttle scopes
pub struct NoTaskUsage;

impl CategoryUsage for NoTaskUsage {
    fn node_usage(&self, _category: &str, _node: &str) -> u32 {
        0
    }

    fn total_usage(&self, _category: &str) -> u32 {
        0
    }
}

/// A scope that left RUNNING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedScope {
    pub id: ScopeId,
    pub owner: OwnerId,
    pub categories: Vec<String>,
    /// Nodes still bound when the scope finished
    pub nodes: Vec<String>,
}

pub struct PipelineGate<I: IdGen = UuidIdGen> {
    ids: I,
    arena: ScopeArena,
    running: DashMap<String, Arc<Mutex<CategoryRunningSet>>>,
}

impl PipelineGate<UuidIdGen> {
    pub fn new() -> Self {
        Self::with_ids(UuidIdGen)
    }
}

impl Default for PipelineGate<UuidIdGen> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IdGen> PipelineGate<I> {
    pub fn with_ids(ids: I) -> Self {
        Self {
            ids,
            arena: ScopeArena::default(),
            running: DashMap::new(),
        }
    }

    fn existing_set(&self, category: &str) -> Option<Arc<Mutex<CategoryRunningSet>>> {
        self.running.get(category).map(|set| Arc::clone(set.value()))
    }

    fn set_for(&self, category: &str) -> Arc<Mutex<CategoryRunningSet>> {
        if let Some(set) = self.existing_set(category) {
            return set;
        }
        let set = self.running.entry(category.to_string()).or_default();
        Arc::clone(set.value())
    }

    /// Enter a scope under `categories`, nested in `parent` if given
    ///
    /// Every name must resolve in `known`; otherwise the scope never runs and
    /// the error lists every missing name in declared order.
    pub fn enter<S: AsRef<str>>(
        &self,
        owner: &OwnerId,
        parent: Option<&ScopeId>,
        categories: &[S],
        known: &CategorySet,
    ) -> Result<ScopeId, GateError> {
        let categories = dedup_categories(categories);
        if categories.is_empty() {
            return Err(GateError::NoCategories);
        }
        let missing = known.missing(categories.as_slice());
        if !missing.is_empty() {
            let missing: Vec<String> = missing.into_iter().map(str::to_string).collect();
            tracing::warn!(owner = %owner, missing = ?missing, "scope references unknown categories");
            return Err(GateError::UnknownCategories(missing));
        }

        if let Some(parent) = parent {
            if !self.arena.contains(parent) {
                return Err(GateError::UnknownScope(parent.clone()));
            }
        }

        let id = ScopeId::new(self.ids.next());
        self.register(owner, &id, &categories);
        self.arena.insert(id.clone(), owner.clone(), parent.cloned(), categories.clone());

        tracing::info!(scope = %id, owner = %owner, categories = ?categories, "scope entered");
        Ok(id)
    }

    /// Record that work inside `scope` took `node`
    ///
    /// The node is charged, per category in effect, to the nearest scope that
    /// declared that category.
    pub fn bind_node(&self, scope: &ScopeId, node: &str) -> Result<(), GateError> {
        let not_running = || GateError::NotRunning(scope.clone());
        let entry = self.arena.get(scope).ok_or_else(not_running)?;
        let holders = self.arena.holders_in_effect(scope);

        entry
            .with_bindings(|bindings| {
                for (category, holder) in &holders {
                    self.set_for(category)
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .bind(holder, node);
                }
                bindings.push(NodeBinding {
                    node: node.to_string(),
                    holders,
                });
            })
            .ok_or_else(not_running)?;
        tracing::debug!(scope = %scope, node, "node bound");
        Ok(())
    }

    /// Give back one binding of `node`; false if there was none
    pub fn release_node(&self, scope: &ScopeId, node: &str) -> bool {
        let Some(entry) = self.arena.get(scope) else {
            tracing::debug!(scope = %scope, node, "release for scope not running");
            return false;
        };
        let binding = entry
            .with_bindings(|bindings| {
                let index = bindings.iter().position(|b| b.node == node)?;
                Some(bindings.remove(index))
            })
            .flatten();
        match binding {
            Some(binding) => {
                self.release_binding(&binding);
                true
            }
            None => false,
        }
    }

    /// Whether `scope` is running and holds at least one binding of `node`
    pub fn is_bound(&self, scope: &ScopeId, node: &str) -> bool {
        self.arena
            .get(scope)
            .and_then(|entry| entry.with_bindings(|b| b.iter().any(|b| b.node == node)))
            .unwrap_or(false)
    }

    fn register(&self, owner: &OwnerId, scope: &ScopeId, categories: &[String]) {
        for category in categories {
            self.set_for(category)
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .register(owner, scope);
        }
    }

    fn release_binding(&self, binding: &NodeBinding) {
        for (category, holder) in &binding.holders {
            if let Some(set) = self.existing_set(category) {
                set.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .release(holder, &binding.node);
            }
        }
    }

    /// Leave RUNNING; `Some` exactly once per scope
    ///
    /// Finishing a scope twice, or one that never entered, is a no-op.
    pub fn finish(&self, scope: &ScopeId) -> Option<FinishedScope> {
        let Some(entry) = self.arena.remove(scope) else {
            tracing::debug!(scope = %scope, "finish for scope not running");
            return None;
        };

        let bindings = entry.close().unwrap_or_default();
        for binding in &bindings {
            self.release_binding(binding);
        }
        for category in &entry.categories {
            if let Some(set) = self.existing_set(category) {
                set.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .deregister(&entry.owner, &entry.id);
            }
        }

        tracing::info!(scope = %entry.id, owner = %entry.owner, "scope finished");
        Some(FinishedScope {
            id: entry.id.clone(),
            owner: entry.owner.clone(),
            categories: entry.categories.clone(),
            nodes: bindings.into_iter().map(|b| b.node).collect(),
        })
    }

    /// Running scopes of `owner`, innermost first
    pub fn scopes_of(&self, owner: &OwnerId) -> Vec<ScopeId> {
        self.arena.owned_by(owner)
    }

    /// Finish every scope of `owner`, innermost first
    pub fn finish_owner(&self, owner: &OwnerId) -> Vec<FinishedScope> {
        self.scopes_of(owner)
            .iter()
            .filter_map(|s| self.finish(s))
            .collect()
    }

    /// Admission of work inside `scope` onto `node`
    ///
    /// Every category in effect (the scope's own, then each ancestor's) is
    /// checked in order; the first denial wins.
    pub fn can_take(
        &self,
        scope: &ScopeId,
        node: &Node,
        known: &CategorySet,
        task_level: &dyn CategoryUsage,
    ) -> Result<Verdict, GateError> {
        if !self.arena.contains(scope) {
            return Err(GateError::NotRunning(scope.clone()));
        }
        let categories = self.arena.categories_in_effect(scope);

        let missing = known.missing(categories.as_slice());
        if !missing.is_empty() {
            return Err(GateError::UnknownCategories(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        for name in &categories {
            let Some(category) = known.lookup(name) else {
                continue;
            };

            if category.max_total > 0 {
                let count = self
                    .total_usage(name)
                    .saturating_add(task_level.total_usage(name));
                if count >= category.max_total {
                    return Ok(Verdict::Blocked(BlockReason::CategoryMaxTotal {
                        category: name.clone(),
                        count,
                        limit: category.max_total,
                    }));
                }
            }

            let limit = category.per_node_limit(&node.labels);
            if limit > 0 {
                let count = self
                    .node_usage(name, &node.name)
                    .saturating_add(task_level.node_usage(name, &node.name));
                if count >= limit {
                    return Ok(Verdict::Blocked(BlockReason::CategoryMaxPerNode {
                        category: name.clone(),
                        count,
                        limit,
                    }));
                }
            }
        }
        Ok(Verdict::Allow)
    }

    /// Scope-bound usage of `category` on `node`
    pub fn node_usage(&self, category: &str, node: &str) -> u32 {
        self.existing_set(category)
            .map(|set| {
                let set = set.lock().unwrap_or_else(|e| e.into_inner());
                set.node_usage(node)
            })
            .unwrap_or(0)
    }

    /// Scope-bound usage of `category` across every node
    pub fn total_usage(&self, category: &str) -> u32 {
        self.existing_set(category)
            .map(|set| {
                let set = set.lock().unwrap_or_else(|e| e.into_inner());
                set.total_usage()
            })
            .unwrap_or(0)
    }

    pub fn categories_in_effect(&self, scope: &ScopeId) -> Vec<String> {
        self.arena.categories_in_effect(scope)
    }

    pub fn ancestor_for_category(&self, scope: &ScopeId, category: &str) -> Option<ScopeId> {
        self.arena
            .ancestor_for_category(scope, category)
            .map(|e| e.id.clone())
    }

    pub fn scope(&self, scope: &ScopeId) -> Option<ScopeRecord> {
        self.arena.get(scope).map(|e| e.record())
    }

    pub fn is_running(&self, scope: &ScopeId) -> bool {
        self.arena.contains(scope)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running_set(&self, category: &str) -> Option<CategoryRunningSet> {
        self.existing_set(category).map(|set| {
            let set = set.lock().unwrap_or_else(|e| e.into_inner());
            set.clone()
        })
    }

    /// Categories with at least one registered scope, sorted
    pub fn running_categories(&self) -> Vec<String> {
        let sets: Vec<(String, Arc<Mutex<CategoryRunningSet>>)> = self
            .running
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        let mut names: Vec<String> = sets
            .into_iter()
            .filter(|(_, set)| !set.lock().unwrap_or_else(|e| e.into_inner()).is_empty())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> StorableGateState {
        StorableGateState {
            scopes: self
                .arena
                .in_entry_order()
                .into_iter()
                .map(|entry| StorableScope {
                    id: entry.id.clone(),
                    owner: entry.owner.clone(),
                    parent: entry.parent.clone(),
                    categories: entry.categories.clone(),
                    nodes: entry.bound_nodes(),
                })
                .collect(),
        }
    }

    /// Reconstruct recorded scopes whose owner is still alive
    ///
    /// Categories are not re-validated: a scope that was admitted keeps its
    /// capacity even if its category has since been removed. Scopes of dead
    /// owners are reported as released and not restored.
    pub fn restore(
        &self,
        state: &StorableGateState,
        is_alive: impl Fn(&OwnerId) -> bool,
    ) -> RestoreReport {
        let mut report = RestoreReport::default();

        for scope in &state.scopes {
            if !is_alive(&scope.owner) {
                if !report.dead_owners.contains(&scope.owner) {
                    report.dead_owners.push(scope.owner.clone());
                }
                report.released.push(scope.id.clone());
                continue;
            }
            if self.arena.contains(&scope.id) {
                tracing::warn!(scope = %scope.id, "scope already running, skipping restore");
                continue;
            }

            self.register(&scope.owner, &scope.id, &scope.categories);
            self.arena.insert(
                scope.id.clone(),
                scope.owner.clone(),
                scope.parent.clone(),
                scope.categories.clone(),
            );
            for node in &scope.nodes {
                if let Err(e) = self.bind_node(&scope.id, node) {
                    tracing::warn!(scope = %scope.id, node = %node, error = %e, "binding not restored");
                }
            }
            report.restored.push(scope.id.clone());
        }

        tracing::info!(
            restored = report.restored.len(),
            released = report.released.len(),
            "gate restored"
        );
        report
    }
}

/// Scope-bound usage, counted by task-level checks against the same category
impl<I: IdGen> CategoryUsage for PipelineGate<I> {
    fn node_usage(&self, category: &str, node: &str) -> u32 {
        PipelineGate::node_usage(self, category, node)
    }

    fn total_usage(&self, category: &str) -> u32 {
        PipelineGate::total_usage(self, category)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
