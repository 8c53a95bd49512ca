// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Category listing

use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use throttle_core::{Category, ThrottleSettings};

#[derive(Args)]
pub struct CategoriesArgs {
    /// Throttle settings file (TOML)
    #[arg(long)]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(transparent)]
struct CategoryRow(Category);

fn limit(value: u32) -> String {
    if value == 0 {
        "-".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Display for CategoryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.0;
        let interval = c
            .min_interval
            .map_or_else(|| "-".to_string(), |d| format!("{:?}", d));
        let labels: Vec<String> = c
            .node_labels
            .iter()
            .map(|o| format!("{}={}", o.label, o.max_per_node))
            .collect();
        write!(
            f,
            "{:<20} {:>8} {:>6} {:>10} {}",
            c.name,
            limit(c.max_per_node),
            limit(c.max_total),
            interval,
            labels.join(",")
        )
    }
}

pub fn handle(args: CategoriesArgs) -> anyhow::Result<()> {
    let settings = ThrottleSettings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let rows: Vec<CategoryRow> = settings.categories.into_iter().map(CategoryRow).collect();
    let header = format!(
        "{:<20} {:>8} {:>6} {:>10} LABELS",
        "NAME", "PER_NODE", "TOTAL", "INTERVAL"
    );
    output::print_list(&rows, args.format, &header, "No categories")
}
