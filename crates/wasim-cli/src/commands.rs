//! CLI command definitions and dispatch.

use crate::context::SimulatorContext;
use crate::driver::Driver;
use crate::error::SimulatorError;
use crate::keys::create_named_key;
use crate::output;
use crate::plan::unmarshal_plan;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wasim_state::{get_public_key, set_program};
use wasim_types::ProgramId;

/// Main CLI.
#[derive(Parser)]
#[command(name = "wasim")]
#[command(about = "WASIM - WebAssembly program simulator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Database directory (default: $HOME/.wasim/db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wasim")
                .join("db")
        })
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage named keys
    #[command(subcommand)]
    Key(KeyCommands),

    /// Manage programs
    #[command(subcommand)]
    Program(ProgramCommands),
}

/// Key commands.
#[derive(Subcommand)]
pub enum KeyCommands {
    /// Create a new named key and store it in the database
    Create {
        /// Key name
        name: String,
    },
}

/// Program commands.
#[derive(Subcommand)]
pub enum ProgramCommands {
    /// Deploy a program from a wasm file
    Create {
        /// Path to the wasm file
        path: PathBuf,

        /// Name of the caller key to deploy with
        #[arg(short, long)]
        key: String,
    },

    /// Run a simulation plan ("-" reads a single-line plan from stdin)
    Run {
        /// Plan file path or "-"
        plan: String,
    },
}

/// Execute a parsed command against the simulator context.
pub fn execute(ctx: &SimulatorContext, command: Commands) -> Result<(), SimulatorError> {
    match command {
        Commands::Key(KeyCommands::Create { name }) => {
            create_named_key(&ctx.state, &name)?;
            output::print_success(&format!("created new private key: {}", name));
            Ok(())
        }

        Commands::Program(ProgramCommands::Create { path, key }) => {
            // the named caller key must exist before a deploy
            if get_public_key(&ctx.state, &key)?.is_none() {
                return Err(SimulatorError::NamedKeyNotFound(key));
            }

            let bytes = std::fs::read(&path)?;
            let id = ProgramId::random();
            set_program(&ctx.state, &id, &bytes);
            ctx.state.commit()?;

            output::print_success(&format!("deploy transaction successful: {}", id));
            Ok(())
        }

        Commands::Program(ProgramCommands::Run { plan }) => {
            let plan_bytes = if plan == "-" {
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
                line.into_bytes()
            } else {
                std::fs::read(&plan)?
            };

            let plan = unmarshal_plan(&plan_bytes)?;
            let mut driver = Driver::new(ctx.state.clone(), plan);
            driver.run()?;
            output::print_success(&format!("state root: {}", ctx.database().root()));
            Ok(())
        }
    }
}
