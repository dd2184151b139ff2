//! WASIM CLI - command-driven WebAssembly program simulator.
//!
//! Deploys and invokes sandboxed wasm programs against a Merkle-indexed
//! key/value store, metering execution with a fuel budget.

pub mod commands;
pub mod context;
pub mod driver;
pub mod error;
pub mod keys;
pub mod marshal;
pub mod output;
pub mod plan;

use clap::Parser;
use colored::Colorize;

fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = context::SimulatorContext::open(cli.db_path())?;

    let command = cli.command;
    if let Err(e) = commands::execute(&ctx, command) {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }

    Ok(())
}
