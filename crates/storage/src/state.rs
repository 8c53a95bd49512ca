// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized gate state from WAL replay

use std::collections::HashMap;
use throttle_core::{GateOperation, OwnerId, ScopeId, StorableGateState, StorableScope};

/// Running scopes built from WAL operations
#[derive(Debug, Default)]
pub struct MaterializedGate {
    scopes: HashMap<ScopeId, StorableScope>,
    /// Entry order of scopes still running
    order: Vec<ScopeId>,
}

impl MaterializedGate {
    pub fn from_ops<'a>(ops: impl IntoIterator<Item = &'a GateOperation>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &GateOperation) {
        match op {
            GateOperation::ScopeEntered {
                scope,
                owner,
                parent,
                categories,
            } => {
                if self.scopes.contains_key(scope) {
                    return;
                }
                self.order.push(scope.clone());
                self.scopes.insert(
                    scope.clone(),
                    StorableScope {
                        id: scope.clone(),
                        owner: owner.clone(),
                        parent: parent.clone(),
                        categories: categories.clone(),
                        nodes: Vec::new(),
                    },
                );
            }
            GateOperation::NodeBound { scope, node } => {
                if let Some(s) = self.scopes.get_mut(scope) {
                    s.nodes.push(node.clone());
                }
            }
            GateOperation::NodeReleased { scope, node } => {
                if let Some(s) = self.scopes.get_mut(scope) {
                    if let Some(i) = s.nodes.iter().position(|n| n == node) {
                        s.nodes.remove(i);
                    }
                }
            }
            GateOperation::ScopeFinished { scope } => {
                self.remove(scope);
            }
            GateOperation::OwnerFinished { owner } => {
                let owned: Vec<ScopeId> = self
                    .scopes
                    .values()
                    .filter(|s| &s.owner == owner)
                    .map(|s| s.id.clone())
                    .collect();
                for scope in &owned {
                    self.remove(scope);
                }
            }
        }
    }

    fn remove(&mut self, scope: &ScopeId) {
        if self.scopes.remove(scope).is_some() {
            self.order.retain(|s| s != scope);
        }
    }

    pub fn scope(&self, scope: &ScopeId) -> Option<&StorableScope> {
        self.scopes.get(scope)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn owned_by(&self, owner: &OwnerId) -> Vec<ScopeId> {
        self.order
            .iter()
            .filter(|s| self.scopes.get(*s).is_some_and(|r| &r.owner == owner))
            .cloned()
            .collect()
    }

    /// Running scopes in entry order
    pub fn to_state(&self) -> StorableGateState {
        StorableGateState {
            scopes: self
                .order
                .iter()
                .filter_map(|s| self.scopes.get(s).cloned())
                .collect(),
        }
    }
}

/// Operations that recreate `state` from an empty log
pub fn operations_for(state: &StorableGateState) -> Vec<GateOperation> {
    let mut ops = Vec::new();
    for scope in &state.scopes {
        ops.push(GateOperation::ScopeEntered {
            scope: scope.id.clone(),
            owner: scope.owner.clone(),
            parent: scope.parent.clone(),
            categories: scope.categories.clone(),
        });
        for node in &scope.nodes {
            ops.push(GateOperation::NodeBound {
                scope: scope.id.clone(),
                node: node.clone(),
            });
        }
    }
    ops
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
