// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate operations for the write-ahead log

use crate::id::{OwnerId, ScopeId};
use serde::{Deserialize, Serialize};

/// Mutations of the pipeline gate that must survive a restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOperation {
    /// A scope resolved its categories and joined their running-sets
    ScopeEntered {
        scope: ScopeId,
        owner: OwnerId,
        #[serde(default)]
        parent: Option<ScopeId>,
        categories: Vec<String>,
    },

    /// Work inside a scope took a node
    NodeBound { scope: ScopeId, node: String },

    /// Work inside a scope gave a node back
    NodeReleased { scope: ScopeId, node: String },

    /// A scope completed, successfully or not
    ScopeFinished { scope: ScopeId },

    /// Every scope of an owner completed at once (owner run ended)
    OwnerFinished { owner: OwnerId },
}

impl GateOperation {
    pub fn name(&self) -> &'static str {
        match self {
            GateOperation::ScopeEntered { .. } => "scope:entered",
            GateOperation::NodeBound { .. } => "scope:node_bound",
            GateOperation::NodeReleased { .. } => "scope:node_released",
            GateOperation::ScopeFinished { .. } => "scope:finished",
            GateOperation::OwnerFinished { .. } => "owner:finished",
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
