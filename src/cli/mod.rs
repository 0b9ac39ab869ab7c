//! Command-line interface for running integration jobs locally.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::candidates::CandidatesArgs;
use commands::init::InitArgs;
use commands::run::RunArgs;
use commands::status::StatusArgs;

/// Command-line interface of the `pretested` binary.
#[derive(Parser, Debug)]
#[command(name = "pretested")]
#[command(about = "Pretested integration: verify ready-branch commits before they reach the target branch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .pretested/config.yaml and local.yaml)
    #[arg(short, long, global = true, env = "PRETESTED_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration and create the job database
    Init(InitArgs),
    /// Run integration cycles for the configured jobs
    Run(RunArgs),
    /// Show the persisted state of every job
    Status(StatusArgs),
    /// List the commits the next cycle of a job would integrate
    Candidates(CandidatesArgs),
}

/// Report a failed command and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let value = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
