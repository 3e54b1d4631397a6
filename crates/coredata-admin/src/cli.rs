//! Command line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "coredata-admin", about = "Maintenance tasks for the core data store")]
pub struct Cli {
    /// TOML configuration file (defaults to $COREDATA_CONFIG or configuration.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check that the database is reachable
    Ping,
    /// Print document counts per collection
    Count {
        /// Only count events from this device
        #[arg(long)]
        device: Option<String>,
    },
    /// Delete every event and reading
    ScrubEvents {
        #[arg(long)]
        yes: bool,
    },
    /// Delete every value descriptor
    ScrubValueDescriptors {
        #[arg(long)]
        yes: bool,
    },
}
