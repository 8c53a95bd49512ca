// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! throttle - admission control for a build fleet

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{categories, check, gate};

#[derive(Parser)]
#[command(
    name = "throttle",
    version,
    about = "Throttle - concurrency limits for a build fleet"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured categories
    Categories(categories::CategoriesArgs),
    /// Decide whether a task may run, and where
    Check(check::CheckArgs),
    /// Pipeline gate journal
    Gate(gate::GateArgs),
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Categories(args) => categories::handle(args),
        Commands::Check(args) => check::handle(args),
        Commands::Gate(args) => gate::handle(args.command),
    }
}
