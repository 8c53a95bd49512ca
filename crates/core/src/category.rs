// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Throttling categories
//!
//! A category is a named bucket with a per-node ceiling, a fleet-wide
//! ceiling, ordered node-label overrides for the per-node ceiling, and an
//! optional minimum interval between starts on one node.
//! A limit of zero means unlimited for that dimension.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Clamp a configured limit to the unsigned domain; negatives mean "unlimited"
pub fn normalize_limit(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Per-node ceiling that applies on nodes carrying `label`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLabelOverride {
    pub label: String,
    pub max_per_node: u32,
}

impl NodeLabelOverride {
    pub fn new(label: impl Into<String>, max_per_node: i64) -> Self {
        Self {
            label: label.into(),
            max_per_node: normalize_limit(max_per_node),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub max_per_node: u32,
    pub max_total: u32,
    /// Evaluated in order; the first override whose label the node carries wins
    #[serde(default)]
    pub node_labels: Vec<NodeLabelOverride>,
    #[serde(default, with = "humantime_serde")]
    pub min_interval: Option<Duration>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_per_node: 0,
            max_total: 0,
            node_labels: Vec::new(),
            min_interval: None,
        }
    }

    pub fn with_max_per_node(mut self, limit: i64) -> Self {
        self.max_per_node = normalize_limit(limit);
        self
    }

    pub fn with_max_total(mut self, limit: i64) -> Self {
        self.max_total = normalize_limit(limit);
        self
    }

    pub fn with_label_override(mut self, label: impl Into<String>, limit: i64) -> Self {
        self.node_labels.push(NodeLabelOverride::new(label, limit));
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Per-node ceiling on a node with the given labels.
    ///
    /// Matching is exact string equality against the node's assigned labels,
    /// not label-expression evaluation. A later override never replaces an
    /// earlier match, whichever is more restrictive.
    pub fn per_node_limit(&self, node_labels: &BTreeSet<String>) -> u32 {
        self.node_labels
            .iter()
            .find(|o| node_labels.contains(&o.label))
            .map_or(self.max_per_node, |o| o.max_per_node)
    }
}

#[cfg(test)]
#[path = "category_tests.rs"]
mod tests;
