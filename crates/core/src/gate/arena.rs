// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Arena of running scopes indexed by id
//!
//! A scope's owner, parent and categories are fixed at entry and shared as
//! an [`Arc`]; only its node bindings change afterwards, behind a lock of
//! its own. The index is a sharded concurrent map, so resolving the
//! categories in effect for one scope never waits on another scope's
//! bindings or on a gate-wide lock.
//!
//! Parent links are ids into the arena. Ancestor lookups walk those ids
//! upward and stop at the first missing link.

use crate::id::{OwnerId, ScopeId};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A node taken by work inside a scope, and the scope charged for it under
/// each category in effect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeBinding {
    pub node: String,
    /// (category, scope whose registration holds the node)
    pub holders: Vec<(String, ScopeId)>,
}

#[derive(Debug, Default)]
struct Bindings {
    nodes: Vec<NodeBinding>,
    closed: bool,
}

/// A running scope
#[derive(Debug)]
pub struct ScopeEntry {
    pub id: ScopeId,
    pub owner: OwnerId,
    pub parent: Option<ScopeId>,
    /// The scope's own categories, declared order, duplicates collapsed
    pub categories: Vec<String>,
    /// Entry order, used to snapshot parents before children
    pub seq: u64,
    bindings: Mutex<Bindings>,
}

impl ScopeEntry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` on the bindings unless the scope has been closed
    pub fn with_bindings<T>(&self, f: impl FnOnce(&mut Vec<NodeBinding>) -> T) -> Option<T> {
        let mut bindings = self.lock();
        if bindings.closed {
            return None;
        }
        Some(f(&mut bindings.nodes))
    }

    /// Close the scope to further bindings and take what it holds; `None`
    /// if it was already closed
    pub fn close(&self) -> Option<Vec<NodeBinding>> {
        let mut bindings = self.lock();
        if bindings.closed {
            return None;
        }
        bindings.closed = true;
        Some(std::mem::take(&mut bindings.nodes))
    }

    /// Nodes bound by work directly inside this scope
    pub fn bound_nodes(&self) -> Vec<String> {
        self.lock().nodes.iter().map(|b| b.node.clone()).collect()
    }

    pub fn record(&self) -> ScopeRecord {
        ScopeRecord {
            id: self.id.clone(),
            owner: self.owner.clone(),
            parent: self.parent.clone(),
            categories: self.categories.clone(),
            bindings: self.lock().nodes.clone(),
            seq: self.seq,
        }
    }
}

/// Point-in-time copy of a running scope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeRecord {
    pub id: ScopeId,
    pub owner: OwnerId,
    pub parent: Option<ScopeId>,
    pub categories: Vec<String>,
    pub bindings: Vec<NodeBinding>,
    pub seq: u64,
}

impl ScopeRecord {
    pub fn bound_nodes(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.node.clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: DashMap<ScopeId, Arc<ScopeEntry>>,
    next_seq: AtomicU64,
}

impl ScopeArena {
    /// Add a scope; an id already present keeps its existing entry
    pub fn insert(
        &self,
        id: ScopeId,
        owner: OwnerId,
        parent: Option<ScopeId>,
        categories: Vec<String>,
    ) -> Arc<ScopeEntry> {
        let entry = self.scopes.entry(id.clone()).or_insert_with(|| {
            Arc::new(ScopeEntry {
                id,
                owner,
                parent,
                categories,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                bindings: Mutex::new(Bindings::default()),
            })
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, id: &ScopeId) -> Option<Arc<ScopeEntry>> {
        self.scopes.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn remove(&self, id: &ScopeId) -> Option<Arc<ScopeEntry>> {
        self.scopes.remove(id).map(|(_, entry)| entry)
    }

    pub fn contains(&self, id: &ScopeId) -> bool {
        self.scopes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// `from` followed by its ancestors, nearest first
    fn lineage(&self, from: &ScopeId) -> Vec<Arc<ScopeEntry>> {
        let mut out: Vec<Arc<ScopeEntry>> = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = self.get(from);
        while let Some(entry) = cursor {
            if !visited.insert(entry.id.clone()) {
                break;
            }
            cursor = entry.parent.as_ref().and_then(|p| self.get(p));
            out.push(entry);
        }
        out
    }

    /// Nearest scope, `from` included, that declared `category`
    pub fn ancestor_for_category(&self, from: &ScopeId, category: &str) -> Option<Arc<ScopeEntry>> {
        self.lineage(from)
            .into_iter()
            .find(|e| e.categories.iter().any(|c| c == category))
    }

    /// Every category governing work inside `from`, paired with the nearest
    /// scope that declared it: its own first, then each ancestor's, without
    /// repeats
    pub fn holders_in_effect(&self, from: &ScopeId) -> Vec<(String, ScopeId)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for entry in self.lineage(from) {
            for category in &entry.categories {
                if seen.insert(category.clone()) {
                    out.push((category.clone(), entry.id.clone()));
                }
            }
        }
        out
    }

    pub fn categories_in_effect(&self, from: &ScopeId) -> Vec<String> {
        self.holders_in_effect(from)
            .into_iter()
            .map(|(category, _)| category)
            .collect()
    }

    pub fn owned_by(&self, owner: &OwnerId) -> Vec<ScopeId> {
        let mut owned: Vec<Arc<ScopeEntry>> = self
            .scopes
            .iter()
            .filter(|e| &e.value().owner == owner)
            .map(|e| Arc::clone(e.value()))
            .collect();
        // Children before parents
        owned.sort_by(|a, b| b.seq.cmp(&a.seq));
        owned.into_iter().map(|e| e.id.clone()).collect()
    }

    /// Entries in entry order
    pub fn in_entry_order(&self) -> Vec<Arc<ScopeEntry>> {
        let mut entries: Vec<Arc<ScopeEntry>> =
            self.scopes.iter().map(|e| Arc::clone(e.value())).collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

#[cfg(test)]
#[path = "arena_tests.rs"]
mod tests;
