// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Category registry
//!
//! Readers take a snapshot of the whole category set; replacement swaps the
//! snapshot in one step, so a reader sees either the old set or the new
//! set and never a mix of the two.

use crate::category::Category;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// An immutable, complete set of categories
#[derive(Debug, Default)]
pub struct CategorySet {
    by_name: HashMap<String, Category>,
    /// Names in configured order
    order: Vec<String>,
    generation: u64,
}

impl CategorySet {
    pub fn lookup(&self, name: &str) -> Option<&Category> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Categories in configured order
    pub fn all(&self) -> Vec<&Category> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Incremented on every replacement
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Names from `requested` that this set does not define, in request order
    pub fn missing<'a, S: AsRef<str>>(&self, requested: &'a [S]) -> Vec<&'a str> {
        requested
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.contains(name))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct CategoryRegistry {
    current: RwLock<Arc<CategorySet>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        let registry = Self::new();
        registry.upsert_categories(categories);
        registry
    }

    /// Current category set; cheap to call on every admission check
    pub fn snapshot(&self) -> Arc<CategorySet> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn lookup(&self, name: &str) -> Option<Category> {
        self.snapshot().lookup(name).cloned()
    }

    pub fn all_categories(&self) -> Vec<Category> {
        self.snapshot().all().into_iter().cloned().collect()
    }

    /// Replace the entire category set.
    ///
    /// Entries with a blank name are dropped and a repeated name keeps its
    /// first definition. Returns the names that were defined before and are
    /// gone now, so callers holding per-category state can drop it.
    pub fn upsert_categories(&self, categories: Vec<Category>) -> Vec<String> {
        let mut by_name = HashMap::with_capacity(categories.len());
        let mut order = Vec::with_capacity(categories.len());
        for category in categories {
            if category.name.trim().is_empty() {
                tracing::warn!("ignoring category with empty name");
                continue;
            }
            if by_name.contains_key(&category.name) {
                tracing::warn!(category = %category.name, "ignoring duplicate category definition");
                continue;
            }
            order.push(category.name.clone());
            by_name.insert(category.name.clone(), category);
        }

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let kept: HashSet<&String> = order.iter().collect();
        let removed: Vec<String> = current
            .order
            .iter()
            .filter(|name| !kept.contains(name))
            .cloned()
            .collect();
        let generation = current.generation + 1;
        *current = Arc::new(CategorySet {
            by_name,
            order,
            generation,
        });

        tracing::info!(
            categories = current.len(),
            removed = removed.len(),
            generation,
            "category set replaced"
        );
        removed
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
