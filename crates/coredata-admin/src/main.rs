//! Core data maintenance tool
//!
//! Loads the export client configuration, opens the database client and
//! runs one maintenance command:
//! - ping
//! - per-collection counts
//! - scrubbing events or value descriptors

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use coredata_config::ConfigurationStruct;
use coredata_db::{DbClient, InMemoryStore};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    coredata_obs::init("coredata-admin");

    // Load configuration
    let config = match &cli.config {
        Some(path) => {
            let mut cfg = ConfigurationStruct::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            cfg.apply_env(|key| std::env::var(key).ok())?;
            cfg
        }
        None => ConfigurationStruct::load().context("Failed to load configuration")?,
    }
    .into_shared();
    info!(db_type = %config.db_type, host = %config.db_host, "Loaded configuration");

    let client = connect(&config).await?;
    let result = commands::run(&client, cli.command).await;
    client.close().await;

    println!("{}", result?);
    Ok(())
}

async fn connect(config: &ConfigurationStruct) -> Result<DbClient> {
    match config.db_type.as_str() {
        "memory" => Ok(DbClient::with_store(InMemoryStore::new())),
        "mysql" => DbClient::open(&config.database())
            .await
            .context("Failed to connect to database"),
        other => anyhow::bail!("Unsupported db_type {other:?}"),
    }
}
