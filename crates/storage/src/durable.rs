// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline gate backed by a write-ahead log
//!
//! Mutations run one at a time under the log's lock, so the log and the
//! in-memory gate always agree. Entry and binding are applied in memory
//! first and rolled back if the append fails; release and finish are
//! journaled first and leave memory untouched if the append fails.
//!
//! On open the log is replayed, scopes of live owners are restored with
//! their recorded nodes, dead owners are finished and journaled, and the log
//! is compacted down to what is still running.

use crate::state::{operations_for, MaterializedGate};
use crate::wal::{Wal, WalError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use throttle_core::{
    CategorySet, FinishedScope, GateError, GateOperation, IdGen, OwnerId, PipelineGate,
    RestoreReport, ScopeId, UuidIdGen,
};

#[derive(Debug, Error)]
pub enum DurableError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Wal(#[from] WalError),
}

pub struct DurableGate<I: IdGen = UuidIdGen> {
    gate: Arc<PipelineGate<I>>,
    wal: Mutex<Wal>,
}

impl<I: IdGen> DurableGate<I> {
    /// Open the log at `path` and restore `gate` from it
    ///
    /// `is_alive` reports whether a recorded owner is still running. Scopes
    /// of dead owners come back in [`RestoreReport::released`] exactly once:
    /// their finish is journaled before the log is compacted.
    pub fn open(
        path: &Path,
        gate: Arc<PipelineGate<I>>,
        is_alive: impl Fn(&OwnerId) -> bool,
    ) -> Result<(Self, RestoreReport), WalError> {
        let ops = Wal::replay(path)?;
        let recorded = MaterializedGate::from_ops(&ops);
        let report = gate.restore(&recorded.to_state(), is_alive);

        let mut wal = Wal::open(path)?;
        for owner in &report.dead_owners {
            wal.append(&GateOperation::OwnerFinished {
                owner: owner.clone(),
            })?;
        }
        wal.rewrite(&operations_for(&gate.snapshot()))?;

        tracing::info!(
            path = %path.display(),
            replayed = ops.len(),
            restored = report.restored.len(),
            released = report.released.len(),
            "durable gate opened"
        );
        Ok((
            Self {
                gate,
                wal: Mutex::new(wal),
            },
            report,
        ))
    }

    pub fn gate(&self) -> &Arc<PipelineGate<I>> {
        &self.gate
    }

    fn lock(&self) -> MutexGuard<'_, Wal> {
        self.wal.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn enter<S: AsRef<str>>(
        &self,
        owner: &OwnerId,
        parent: Option<&ScopeId>,
        categories: &[S],
        known: &CategorySet,
    ) -> Result<ScopeId, DurableError> {
        let mut wal = self.lock();
        let scope = self.gate.enter(owner, parent, categories, known)?;
        let categories = self
            .gate
            .scope(&scope)
            .map(|r| r.categories)
            .unwrap_or_default();

        let op = GateOperation::ScopeEntered {
            scope: scope.clone(),
            owner: owner.clone(),
            parent: parent.cloned(),
            categories,
        };
        if let Err(e) = wal.append(&op) {
            self.gate.finish(&scope);
            return Err(e.into());
        }
        Ok(scope)
    }

    pub fn bind_node(&self, scope: &ScopeId, node: &str) -> Result<(), DurableError> {
        let mut wal = self.lock();
        self.gate.bind_node(scope, node)?;
        let op = GateOperation::NodeBound {
            scope: scope.clone(),
            node: node.to_string(),
        };
        if let Err(e) = wal.append(&op) {
            self.gate.release_node(scope, node);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn release_node(&self, scope: &ScopeId, node: &str) -> Result<bool, WalError> {
        let mut wal = self.lock();
        if !self.gate.is_bound(scope, node) {
            return Ok(false);
        }
        wal.append(&GateOperation::NodeReleased {
            scope: scope.clone(),
            node: node.to_string(),
        })?;
        Ok(self.gate.release_node(scope, node))
    }

    pub fn finish(&self, scope: &ScopeId) -> Result<Option<FinishedScope>, WalError> {
        let mut wal = self.lock();
        if !self.gate.is_running(scope) {
            return Ok(None);
        }
        wal.append(&GateOperation::ScopeFinished {
            scope: scope.clone(),
        })?;
        Ok(self.gate.finish(scope))
    }

    pub fn finish_owner(&self, owner: &OwnerId) -> Result<Vec<FinishedScope>, WalError> {
        let mut wal = self.lock();
        if self.gate.scopes_of(owner).is_empty() {
            return Ok(Vec::new());
        }
        wal.append(&GateOperation::OwnerFinished {
            owner: owner.clone(),
        })?;
        Ok(self.gate.finish_owner(owner))
    }

    /// Rewrite the log down to the scopes running now
    pub fn compact(&self) -> Result<(), WalError> {
        let mut wal = self.lock();
        wal.rewrite(&operations_for(&self.gate.snapshot()))
    }
}

#[cfg(test)]
#[path = "durable_tests.rs"]
mod tests;
