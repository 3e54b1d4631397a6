//! Collection layout and stored document shapes
//!
//! Readings and value descriptors are stored exactly as they serialize.
//! Events are stored as [`EventDocument`], which keeps the ids of the
//! event's readings rather than the readings themselves.

use coredata_models::{Event, ObjectId, Reading, Timestamp};
use serde::{Deserialize, Serialize};

/// The three document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Events,
    Readings,
    ValueDescriptors,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Events,
        Collection::Readings,
        Collection::ValueDescriptors,
    ];

    /// Collection (table) name
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Events => collections::EVENTS,
            Collection::Readings => collections::READINGS,
            Collection::ValueDescriptors => collections::VALUE_DESCRIPTORS,
        }
    }

    /// Field whose value must be unique within the collection, if any
    pub fn unique_field(&self) -> Option<&'static str> {
        match self {
            Collection::ValueDescriptors => Some(coredata_models::fields::NAME),
            _ => None,
        }
    }
}

pub mod collections {
    pub const EVENTS: &str = "event";
    pub const READINGS: &str = "reading";
    pub const VALUE_DESCRIPTORS: &str = "valueDescriptor";
}

/// Event as persisted: readings are held by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub id: ObjectId,
    #[serde(default)]
    pub pushed: Timestamp,
    pub device: String,
    #[serde(default)]
    pub created: Timestamp,
    #[serde(default)]
    pub modified: Timestamp,
    #[serde(default)]
    pub origin: Timestamp,
    #[serde(default)]
    pub readings: Vec<ObjectId>,
}

impl EventDocument {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            pushed: event.pushed,
            device: event.device.clone(),
            created: event.created,
            modified: event.modified,
            origin: event.origin,
            readings: event.readings.iter().map(|r| r.id).collect(),
        }
    }

    pub fn into_event(self, readings: Vec<Reading>) -> Event {
        Event {
            id: self.id,
            pushed: self.pushed,
            device: self.device,
            created: self.created,
            modified: self.modified,
            origin: self.origin,
            readings,
        }
    }
}

/// MySQL DDL for one collection table.
///
/// Documents are kept as JSON text; `seq` preserves insertion order. The value
/// descriptor table uniquely indexes a SHA-256 of `name`, so names compare
/// byte for byte whatever their length or the server collation.
pub fn create_table_sql(collection: Collection) -> String {
    let unique = match collection.unique_field() {
        Some(field) => format!(
            "    {field}_hash BINARY(32) GENERATED ALWAYS AS (UNHEX(SHA2(JSON_UNQUOTE(JSON_EXTRACT(doc, '$.{field}')), 256))) STORED,\n    UNIQUE KEY uq_{table}_{field} ({field}_hash),\n",
            table = collection.name(),
        ),
        None => String::new(),
    };

    format!(
        "CREATE TABLE IF NOT EXISTS `{table}` (\n    seq BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,\n    id CHAR(24) NOT NULL,\n    doc LONGTEXT NOT NULL,\n{unique}    UNIQUE KEY uq_{table}_id (id)\n)",
        table = collection.name(),
    )
}
