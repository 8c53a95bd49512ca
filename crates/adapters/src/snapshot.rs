// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet snapshot loaded from a JSON file
//!
//! ```json
//! {
//!   "builtin": { "name": "built-in", "executors": 2 },
//!   "nodes": [
//!     { "name": "n1", "labels": ["linux"], "executors": 4,
//!       "running": [{ "task": "build", "started_secs_ago": 30,
//!                     "params": { "BRANCH": "main" } }] }
//!   ],
//!   "pending": ["deploy"]
//! }
//! ```
//!
//! Start times are stored relative to the moment the snapshot was taken and
//! anchored to the clock when loaded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use throttle_core::{
    Clock, Executor, ExecutorSnapshot, Node, NodeInventory, QueueState, RunningWork, TaskId,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node {node}: {running} running but only {executors} executors")]
    Overcommitted {
        node: String,
        running: usize,
        executors: usize,
    },
    #[error("node defined twice: {0}")]
    DuplicateNode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotRun {
    pub task: TaskId,
    #[serde(default)]
    pub started_secs_ago: u64,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotNode {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    pub executors: usize,
    #[serde(default)]
    pub running: Vec<SnapshotRun>,
}

/// On-disk layout of a fleet snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub builtin: Option<SnapshotNode>,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub pending: Vec<TaskId>,
}

struct LoadedNode {
    node: Node,
    executors: Vec<Executor>,
}

impl LoadedNode {
    fn from_snapshot(raw: SnapshotNode, now: Instant) -> Result<Self, SnapshotError> {
        if raw.running.len() > raw.executors {
            return Err(SnapshotError::Overcommitted {
                node: raw.name,
                running: raw.running.len(),
                executors: raw.executors,
            });
        }

        let mut executors: Vec<Executor> = raw
            .running
            .into_iter()
            .map(|run| Executor {
                current: Some(RunningWork {
                    task: run.task,
                    started_at: now
                        .checked_sub(Duration::from_secs(run.started_secs_ago))
                        .unwrap_or(now),
                    params: run.params,
                }),
            })
            .collect();
        executors.resize(raw.executors, Executor::default());

        Ok(Self {
            node: Node {
                name: raw.name,
                labels: raw.labels,
            },
            executors,
        })
    }
}

/// A read-only fleet backed by a snapshot
pub struct SnapshotFleet {
    nodes: Vec<LoadedNode>,
    builtin: Option<LoadedNode>,
    pending: HashSet<TaskId>,
}

impl SnapshotFleet {
    pub fn from_snapshot(
        snapshot: FleetSnapshot,
        clock: &impl Clock,
    ) -> Result<Self, SnapshotError> {
        let now = clock.now();
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for raw in snapshot.nodes {
            if !seen.insert(raw.name.clone()) {
                return Err(SnapshotError::DuplicateNode(raw.name));
            }
            nodes.push(LoadedNode::from_snapshot(raw, now)?);
        }
        let builtin = snapshot
            .builtin
            .map(|raw| LoadedNode::from_snapshot(raw, now))
            .transpose()?;

        tracing::debug!(
            nodes = nodes.len(),
            builtin = builtin.is_some(),
            pending = snapshot.pending.len(),
            "fleet snapshot loaded"
        );
        Ok(Self {
            nodes,
            builtin,
            pending: snapshot.pending.into_iter().collect(),
        })
    }

    pub fn parse(content: &str, clock: &impl Clock) -> Result<Self, SnapshotError> {
        let snapshot: FleetSnapshot = serde_json::from_str(content)?;
        Self::from_snapshot(snapshot, clock)
    }

    pub fn load(path: &Path, clock: &impl Clock) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, clock)
    }

    fn find(&self, name: &str) -> Option<&LoadedNode> {
        self.builtin
            .iter()
            .chain(self.nodes.iter())
            .find(|n| n.node.name == name)
    }
}

impl NodeInventory for SnapshotFleet {
    fn all_nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(|n| n.node.clone()).collect()
    }

    fn builtin_node(&self) -> Option<Node> {
        self.builtin.as_ref().map(|n| n.node.clone())
    }
}

impl ExecutorSnapshot for SnapshotFleet {
    fn executors_on(&self, node: &str) -> Vec<Executor> {
        self.find(node)
            .map(|n| n.executors.clone())
            .unwrap_or_default()
    }
}

impl QueueState for SnapshotFleet {
    fn is_pending(&self, task: &TaskId) -> bool {
        self.pending.contains(task)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
