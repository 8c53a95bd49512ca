// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline gate journal inspection
//!
//! Reads the journal without writing to it: every recorded owner is treated
//! as alive, so the output is what a restart would restore.

use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use throttle_core::{PipelineGate, StorableScope};
use throttle_storage::{MaterializedGate, Wal};

#[derive(Args)]
pub struct GateArgs {
    #[command(subcommand)]
    pub command: GateCommand,
}

#[derive(Subcommand)]
pub enum GateCommand {
    /// Show the running-set per category
    Status {
        /// Gate journal
        #[arg(long)]
        wal: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List running scopes in entry order
    Scopes {
        /// Gate journal
        #[arg(long)]
        wal: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Serialize)]
struct CategoryStatus {
    category: String,
    scopes: usize,
    owners: usize,
    /// Bound scopes per node
    nodes: BTreeMap<String, u32>,
}

impl fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|(node, count)| format!("{}={}", node, count))
            .collect();
        write!(
            f,
            "{:<20} {:>6} {:>6} {}",
            self.category,
            self.scopes,
            self.owners,
            nodes.join(",")
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct ScopeRow(StorableScope);

impl fmt::Display for ScopeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        write!(
            f,
            "{:<38} {:<20} {:<38} {:<20} {}",
            s.id.as_str(),
            s.owner.as_str(),
            s.parent.as_ref().map_or("-", |p| p.as_str()),
            s.categories.join(","),
            s.nodes.join(",")
        )
    }
}

pub fn handle(command: GateCommand) -> anyhow::Result<()> {
    match command {
        GateCommand::Status { wal, format } => status(&wal, format),
        GateCommand::Scopes { wal, format } => scopes(&wal, format),
    }
}

fn recorded(wal: &Path) -> anyhow::Result<MaterializedGate> {
    let ops = Wal::replay(wal).with_context(|| format!("reading {}", wal.display()))?;
    Ok(MaterializedGate::from_ops(&ops))
}

/// Gate holding every scope recorded in the journal, read without writing
pub(crate) fn restored(wal: &Path) -> anyhow::Result<PipelineGate> {
    let gate = PipelineGate::new();
    let report = gate.restore(&recorded(wal)?.to_state(), |_| true);
    tracing::debug!(wal = %wal.display(), scopes = report.restored.len(), "journal loaded");
    Ok(gate)
}

fn status(wal: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let gate = restored(wal)?;

    let rows: Vec<CategoryStatus> = gate
        .running_categories()
        .into_iter()
        .filter_map(|category| {
            let set = gate.running_set(&category)?;
            let mut nodes = BTreeMap::new();
            for scope in set.holders().values().flatten() {
                for node in set.nodes_of(scope) {
                    *nodes.entry(node.clone()).or_insert(0) += 1;
                }
            }
            Some(CategoryStatus {
                scopes: set.scope_count(),
                owners: set.holders().len(),
                category,
                nodes,
            })
        })
        .collect();

    let header = format!("{:<20} {:>6} {:>6} NODES", "CATEGORY", "SCOPES", "OWNERS");
    output::print_list(&rows, format, &header, "No running scopes")
}

fn scopes(wal: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<ScopeRow> = recorded(wal)?
        .to_state()
        .scopes
        .into_iter()
        .map(ScopeRow)
        .collect();
    let header = format!(
        "{:<38} {:<20} {:<38} {:<20} NODES",
        "SCOPE", "OWNER", "PARENT", "CATEGORIES"
    );
    output::print_list(&rows, format, &header, "No running scopes")
}
