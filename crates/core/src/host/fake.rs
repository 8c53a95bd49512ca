// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fleet for tests
//!
//! Holds nodes with a fixed number of executors, lets tests occupy and free
//! executors, mark tasks pending, and inspect which host calls were made.

use super::traits::{Executor, ExecutorSnapshot, Node, NodeInventory, QueueState, RunningWork};
use crate::id::TaskId;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Recorded call to a fleet method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    AllNodes,
    BuiltinNode,
    ExecutorsOn { node: String },
    IsPending { task: TaskId },
}

struct FakeNode {
    node: Node,
    executors: Vec<Executor>,
}

#[derive(Default)]
struct FakeState {
    nodes: Vec<FakeNode>,
    builtin: Option<FakeNode>,
    pending: HashSet<TaskId>,
    calls: Vec<FleetCall>,
}

impl FakeState {
    fn find_mut(&mut self, name: &str) -> Option<&mut FakeNode> {
        if self.builtin.as_ref().is_some_and(|b| b.node.name == name) {
            return self.builtin.as_mut();
        }
        self.nodes.iter_mut().find(|n| n.node.name == name)
    }

    fn find(&self, name: &str) -> Option<&FakeNode> {
        if let Some(b) = self.builtin.as_ref().filter(|b| b.node.name == name) {
            return Some(b);
        }
        self.nodes.iter().find(|n| n.node.name == name)
    }
}

#[derive(Clone, Default)]
pub struct FakeFleet {
    state: Arc<Mutex<FakeState>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an agent node with `executors` idle executors
    pub fn add_node(&self, node: Node, executors: usize) -> &Self {
        self.lock().nodes.push(FakeNode {
            node,
            executors: vec![Executor::default(); executors],
        });
        self
    }

    pub fn set_builtin(&self, node: Node, executors: usize) -> &Self {
        self.lock().builtin = Some(FakeNode {
            node,
            executors: vec![Executor::default(); executors],
        });
        self
    }

    pub fn set_pending(&self, task: impl Into<TaskId>, pending: bool) {
        let task = task.into();
        let mut state = self.lock();
        if pending {
            state.pending.insert(task);
        } else {
            state.pending.remove(&task);
        }
    }

    /// Occupy an idle executor on `node`; false when none is free
    pub fn start(&self, task: impl Into<TaskId>, node: &str, started_at: Instant) -> bool {
        self.start_with_params(task, node, started_at, BTreeMap::new())
    }

    pub fn start_with_params(
        &self,
        task: impl Into<TaskId>,
        node: &str,
        started_at: Instant,
        params: BTreeMap<String, String>,
    ) -> bool {
        let task = task.into();
        let mut state = self.lock();
        let Some(fake) = state.find_mut(node) else {
            return false;
        };
        match fake.executors.iter_mut().find(|e| e.current.is_none()) {
            Some(slot) => {
                slot.current = Some(RunningWork {
                    task,
                    started_at,
                    params,
                });
                true
            }
            None => false,
        }
    }

    /// Free one executor running `task` on `node`; false when none matches
    pub fn finish(&self, task: &TaskId, node: &str) -> bool {
        let mut state = self.lock();
        let Some(fake) = state.find_mut(node) else {
            return false;
        };
        match fake
            .executors
            .iter_mut()
            .find(|e| e.current.as_ref().is_some_and(|w| &w.task == task))
        {
            Some(slot) => {
                slot.current = None;
                true
            }
            None => false,
        }
    }

    /// Busy executors on `node`
    pub fn busy_on(&self, node: &str) -> usize {
        self.lock()
            .find(node)
            .map_or(0, |n| n.executors.iter().filter(|e| e.current.is_some()).count())
    }

    /// Busy executors across the fleet including the built-in node
    pub fn busy_total(&self) -> usize {
        let state = self.lock();
        state
            .nodes
            .iter()
            .chain(state.builtin.iter())
            .flat_map(|n| n.executors.iter())
            .filter(|e| e.current.is_some())
            .count()
    }

    pub fn calls(&self) -> Vec<FleetCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl NodeInventory for FakeFleet {
    fn all_nodes(&self) -> Vec<Node> {
        let mut state = self.lock();
        state.calls.push(FleetCall::AllNodes);
        state.nodes.iter().map(|n| n.node.clone()).collect()
    }

    fn builtin_node(&self) -> Option<Node> {
        let mut state = self.lock();
        state.calls.push(FleetCall::BuiltinNode);
        state.builtin.as_ref().map(|n| n.node.clone())
    }
}

impl ExecutorSnapshot for FakeFleet {
    fn executors_on(&self, node: &str) -> Vec<Executor> {
        let mut state = self.lock();
        state.calls.push(FleetCall::ExecutorsOn {
            node: node.to_string(),
        });
        state
            .find(node)
            .map(|n| n.executors.clone())
            .unwrap_or_default()
    }
}

impl QueueState for FakeFleet {
    fn is_pending(&self, task: &TaskId) -> bool {
        let mut state = self.lock();
        state.calls.push(FleetCall::IsPending { task: task.clone() });
        state.pending.contains(task)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
