//! CLI command implementations

pub mod run;

use clap::{Parser, Subcommand};

pub use run::RunArgs;

/// Checkpointed shard fingerprint archival service
#[derive(Debug, Parser)]
#[command(name = "shard-archiver", version, about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the synchronization loop until interrupted
    Run(RunArgs),
}
