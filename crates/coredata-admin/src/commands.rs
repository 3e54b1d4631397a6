//! Maintenance commands run against an open client

use anyhow::{bail, Context, Result};
use coredata_db::DbClient;
use tracing::{info, warn};

use crate::cli::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountReport {
    pub events: u64,
    pub readings: u64,
    pub value_descriptors: u64,
}

/// Execute one command, returning the line to print
pub async fn run(client: &DbClient, command: Command) -> Result<String> {
    match command {
        Command::Ping => {
            client.ping().await.context("Database ping failed")?;
            Ok("ok".to_string())
        }
        Command::Count { device: Some(device) } => {
            let events = client
                .event_count_by_device(&device)
                .await
                .context("Failed to count events")?;
            Ok(format!("events[{device}]={events}"))
        }
        Command::Count { device: None } => {
            let report = count(client).await?;
            Ok(format!(
                "events={} readings={} value_descriptors={}",
                report.events, report.readings, report.value_descriptors
            ))
        }
        Command::ScrubEvents { yes } => {
            confirm(yes, "scrub-events")?;
            warn!("Scrubbing all events and readings");
            client
                .scrub_all_events()
                .await
                .context("Failed to scrub events")?;
            Ok("events and readings removed".to_string())
        }
        Command::ScrubValueDescriptors { yes } => {
            confirm(yes, "scrub-value-descriptors")?;
            warn!("Scrubbing all value descriptors");
            client
                .scrub_all_value_descriptors()
                .await
                .context("Failed to scrub value descriptors")?;
            Ok("value descriptors removed".to_string())
        }
    }
}

pub async fn count(client: &DbClient) -> Result<CountReport> {
    let report = CountReport {
        events: client.event_count().await.context("Failed to count events")?,
        readings: client
            .reading_count()
            .await
            .context("Failed to count readings")?,
        value_descriptors: client
            .value_descriptor_count()
            .await
            .context("Failed to count value descriptors")?,
    };
    info!(?report, "Counted collections");
    Ok(report)
}

fn confirm(yes: bool, command: &str) -> Result<()> {
    if !yes {
        bail!("{command} deletes data permanently; pass --yes to proceed");
    }
    Ok(())
}
