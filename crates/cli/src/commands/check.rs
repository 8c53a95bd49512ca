// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission check against a fleet snapshot

use super::gate;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use throttle_adapters::{SnapshotFleet, TracedFleet};
use throttle_core::{
    NodeInventory, PipelineGate, QueueItem, SystemClock, ThrottleService, ThrottleSettings,
    Verdict,
};

#[derive(Args)]
pub struct CheckArgs {
    /// Throttle settings file (TOML)
    #[arg(long)]
    pub config: PathBuf,

    /// Fleet snapshot (JSON)
    #[arg(long)]
    pub fleet: PathBuf,

    /// Task to admit
    #[arg(long)]
    pub task: String,

    /// Also check placement on this node
    #[arg(long)]
    pub node: Option<String>,

    /// Gate journal; nodes held by its running scopes count against limits
    #[arg(long)]
    pub wal: Option<PathBuf>,

    /// Build parameter (can be repeated)
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Parse a key=value string into a tuple
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid key=value: no '=' found in '{}'", s))?;
    let key = &s[..pos];
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in '{}'", s));
    }
    Ok((key.to_string(), s[pos + 1..].to_string()))
}

#[derive(Serialize)]
struct CheckReport {
    task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(flatten)]
    verdict: Verdict,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verdict)
    }
}

pub fn handle(args: CheckArgs) -> anyhow::Result<()> {
    let settings = ThrottleSettings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let fleet = SnapshotFleet::load(&args.fleet, &SystemClock)
        .with_context(|| format!("loading {}", args.fleet.display()))?;

    let scopes = match &args.wal {
        Some(wal) => gate::restored(wal)?,
        None => PipelineGate::new(),
    };

    let service =
        ThrottleService::with_parts(TracedFleet::new(fleet), SystemClock, Arc::new(scopes));
    service.apply_settings(&settings);

    let mut item = QueueItem::new(args.task.as_str());
    if service.config_for(&item.task).is_none() {
        tracing::warn!(task = %args.task, "task has no throttle config");
    }
    for (key, value) in args.params {
        item = item.with_param(key, value);
    }

    let mut verdict = service.can_run(&item);
    if let (true, Some(node)) = (verdict.is_allowed(), args.node.as_deref()) {
        if service.fleet().node(node).is_none() {
            bail!("node not in fleet snapshot: {}", node);
        }
        verdict = service.can_take_on(node, &item);
    }

    let report = CheckReport {
        task: args.task,
        node: args.node,
        verdict,
    };
    output::print(&report, args.format)
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
