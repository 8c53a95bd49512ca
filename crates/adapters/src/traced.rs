// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced fleet wrappers for consistent observability

use throttle_core::{
    Executor, ExecutorSnapshot, Node, NodeInventory, QueueState, TaskCatalog, TaskId,
};

/// Wrapper that adds tracing to any fleet
#[derive(Clone)]
pub struct TracedFleet<F> {
    inner: F,
}

impl<F> TracedFleet<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: NodeInventory> NodeInventory for TracedFleet<F> {
    fn all_nodes(&self) -> Vec<Node> {
        let span = tracing::debug_span!("fleet.all_nodes");
        let _guard = span.enter();

        let nodes = self.inner.all_nodes();
        tracing::trace!(count = nodes.len(), "nodes listed");
        nodes
    }

    fn builtin_node(&self) -> Option<Node> {
        let span = tracing::debug_span!("fleet.builtin_node");
        let _guard = span.enter();

        let node = self.inner.builtin_node();
        tracing::trace!(present = node.is_some(), "built-in node");
        node
    }

    fn node(&self, name: &str) -> Option<Node> {
        let span = tracing::debug_span!("fleet.node", name);
        let _guard = span.enter();

        let node = self.inner.node(name);
        if node.is_none() {
            tracing::debug!("node not found");
        }
        node
    }
}

impl<F: ExecutorSnapshot> ExecutorSnapshot for TracedFleet<F> {
    fn executors_on(&self, node: &str) -> Vec<Executor> {
        let span = tracing::debug_span!("fleet.executors_on", node);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let executors = self.inner.executors_on(node);
        let busy = executors.iter().filter(|e| e.current.is_some()).count();
        tracing::trace!(
            executors = executors.len(),
            busy,
            elapsed_us = start.elapsed().as_micros() as u64,
            "executor scan"
        );
        executors
    }
}

impl<F: QueueState> QueueState for TracedFleet<F> {
    fn is_pending(&self, task: &TaskId) -> bool {
        let span = tracing::debug_span!("queue.is_pending", task = %task);
        let _guard = span.enter();

        let pending = self.inner.is_pending(task);
        if pending {
            tracing::debug!("task pending");
        }
        pending
    }
}

/// Wrapper that adds tracing to any task catalog
#[derive(Clone)]
pub struct TracedCatalog<C> {
    inner: C,
}

impl<C> TracedCatalog<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: TaskCatalog> TaskCatalog for TracedCatalog<C> {
    fn tasks_tagged_with(&self, category: &str) -> Vec<TaskId> {
        let span = tracing::debug_span!("catalog.tasks_tagged_with", category);
        let _guard = span.enter();

        let tasks = self.inner.tasks_tagged_with(category);
        tracing::trace!(count = tasks.len(), "tagged tasks");
        tasks
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
