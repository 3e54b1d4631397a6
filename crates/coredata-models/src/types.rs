//! Core data entity types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ObjectId;

/// Timestamp type (Unix epoch milliseconds)
pub type Timestamp = i64;

/// Current time in epoch milliseconds
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// A set of readings taken from one device at one moment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(default)]
    pub id: ObjectId,

    /// When the event was exported downstream (0 = never)
    #[serde(default)]
    pub pushed: Timestamp,

    /// Name or id of the originating device
    pub device: String,

    #[serde(default)]
    pub created: Timestamp,

    #[serde(default)]
    pub modified: Timestamp,

    /// Timestamp supplied by the device
    #[serde(default)]
    pub origin: Timestamp,

    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Event {
    pub fn new(device: impl Into<String>, readings: Vec<Reading>) -> Self {
        Self {
            device: device.into(),
            readings,
            ..Default::default()
        }
    }
}

/// A single sensor value, named after its value descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    #[serde(default)]
    pub id: ObjectId,

    #[serde(default)]
    pub pushed: Timestamp,

    #[serde(default)]
    pub created: Timestamp,

    #[serde(default)]
    pub origin: Timestamp,

    #[serde(default)]
    pub modified: Timestamp,

    #[serde(default)]
    pub device: String,

    /// Value descriptor name
    pub name: String,

    pub value: String,
}

impl Reading {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Describes the type, unit and formatting of a named reading value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueDescriptor {
    #[serde(default)]
    pub id: ObjectId,

    #[serde(default)]
    pub created: Timestamp,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub modified: Timestamp,

    #[serde(default)]
    pub origin: Timestamp,

    /// Unique across all value descriptors
    pub name: String,

    #[serde(default)]
    pub min: Value,

    #[serde(default)]
    pub max: Value,

    #[serde(default)]
    pub default_value: Value,

    /// Type tag, e.g. "I" for integer or "F" for float
    #[serde(rename = "type", default)]
    pub value_type: String,

    #[serde(default)]
    pub uom_label: String,

    /// printf-style format applied when rendering values
    #[serde(default)]
    pub formatting: String,

    #[serde(default)]
    pub labels: Vec<String>,
}

impl ValueDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Field names as stored in documents
pub mod fields {
    pub const ID: &str = "id";
    pub const DEVICE: &str = "device";
    pub const CREATED: &str = "created";
    pub const PUSHED: &str = "pushed";
    pub const NAME: &str = "name";
    pub const UOM_LABEL: &str = "uomLabel";
    pub const LABELS: &str = "labels";
    pub const TYPE: &str = "type";
    pub const READINGS: &str = "readings";
}
