// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-category running-set of scopes

use crate::id::{OwnerId, ScopeId};
use std::collections::BTreeMap;

/// Scopes currently registered under one category
///
/// `holders` maps an owner to every scope it entered under this category, so
/// one owner may hold several nested scopes at once. `nodes` records the
/// nodes charged to each registered scope; a scope with no bound node
/// consumes no capacity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CategoryRunningSet {
    holders: BTreeMap<OwnerId, Vec<ScopeId>>,
    nodes: BTreeMap<ScopeId, Vec<String>>,
}

impl CategoryRunningSet {
    pub fn register(&mut self, owner: &OwnerId, scope: &ScopeId) {
        let scopes = self.holders.entry(owner.clone()).or_default();
        if !scopes.contains(scope) {
            scopes.push(scope.clone());
        }
        self.nodes.entry(scope.clone()).or_default();
    }

    /// Remove the pair; false if it was not registered
    pub fn deregister(&mut self, owner: &OwnerId, scope: &ScopeId) -> bool {
        let mut removed = false;
        if let Some(scopes) = self.holders.get_mut(owner) {
            let before = scopes.len();
            scopes.retain(|s| s != scope);
            removed = scopes.len() != before;
            if scopes.is_empty() {
                self.holders.remove(owner);
            }
        }
        self.nodes.remove(scope);
        removed
    }

    pub fn is_registered(&self, scope: &ScopeId) -> bool {
        self.nodes.contains_key(scope)
    }

    /// Charge `node` to a registered scope; false if the scope is not here
    pub fn bind(&mut self, scope: &ScopeId, node: &str) -> bool {
        match self.nodes.get_mut(scope) {
            Some(nodes) => {
                nodes.push(node.to_string());
                true
            }
            None => false,
        }
    }

    /// Give back one charge of `node`; tolerates a missing scope or node
    pub fn release(&mut self, scope: &ScopeId, node: &str) -> bool {
        let Some(nodes) = self.nodes.get_mut(scope) else {
            return false;
        };
        match nodes.iter().position(|n| n == node) {
            Some(i) => {
                nodes.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn node_usage(&self, node: &str) -> u32 {
        let count = self
            .nodes
            .values()
            .flatten()
            .filter(|n| n.as_str() == node)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn total_usage(&self) -> u32 {
        let count: usize = self.nodes.values().map(Vec::len).sum();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn holders(&self) -> &BTreeMap<OwnerId, Vec<ScopeId>> {
        &self.holders
    }

    pub fn nodes_of(&self, scope: &ScopeId) -> &[String] {
        self.nodes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scope_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[path = "running_set_tests.rs"]
mod tests;
