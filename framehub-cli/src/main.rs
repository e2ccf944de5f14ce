//! FrameHub CLI - Command-line interface
//!
//! This binary drives the FrameHub coordination core: inspect and create the
//! configuration, print server capabilities, or replay a script of commands.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::replay::{ReplayArgs, DEFAULT_SETTLE_MS};
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "framehub")]
#[command(version = framehub::VERSION)]
#[command(about = "Coordination core for interactive detector-data analysis", long_about = None)]
struct Cli {
    /// Use this configuration file instead of ~/.framehub/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Print the server configuration as JSON
    Info,

    /// Run a JSON script of commands against a fresh core
    ///
    /// Each reply is printed as one JSON line.
    Replay {
        /// Path to a JSON array of commands
        script: PathBuf,

        /// Also print every event an observer received
        #[arg(long)]
        observe: bool,

        /// Milliseconds to wait for running jobs after the last command
        #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
        settle_ms: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(command) => commands::config::run(command, config_path),
        Commands::Info => {
            let runner = CliRunner::new(config_path, cli.debug)?;
            commands::info::run(&runner)
        }
        Commands::Replay {
            script,
            observe,
            settle_ms,
        } => {
            let runner = CliRunner::new(config_path, cli.debug)?;
            commands::replay::run(
                &runner,
                ReplayArgs {
                    script,
                    observe,
                    settle: Duration::from_millis(settle_ms),
                },
            )
        }
    }
}
