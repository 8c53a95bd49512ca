// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage serialization for the pipeline gate
//!
//! Scopes are recorded by identifier, not derived from live execution, so a
//! restored gate holds exactly the capacity it held before the restart.

use crate::id::{OwnerId, ScopeId};
use serde::{Deserialize, Serialize};

/// Serializable version of a running scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableScope {
    pub id: ScopeId,
    pub owner: OwnerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ScopeId>,
    pub categories: Vec<String>,
    /// Nodes bound by work directly inside the scope, one entry per binding
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Every running scope, parents before children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableGateState {
    pub scopes: Vec<StorableScope>,
}

impl StorableGateState {
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn scope(&self, id: &ScopeId) -> Option<&StorableScope> {
        self.scopes.iter().find(|s| &s.id == id)
    }

    /// Distinct owners in entry order
    pub fn owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<OwnerId> = Vec::new();
        for scope in &self.scopes {
            if !owners.contains(&scope.owner) {
                owners.push(scope.owner.clone());
            }
        }
        owners
    }
}

/// What a restore did with each recorded scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Scopes whose owner is alive, back in RUNNING
    pub restored: Vec<ScopeId>,
    /// Scopes whose owner ended while the process was down
    pub released: Vec<ScopeId>,
    /// Owners reported dead, in entry order
    pub dead_owners: Vec<OwnerId>,
}
