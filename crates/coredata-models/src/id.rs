//! Object identifiers

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use thiserror::Error;

/// Length of an identifier in its hex encoding
pub const OBJECT_ID_HEX_LEN: usize = 24;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id: {0:?}")]
pub struct InvalidObjectId(pub String);

/// 12-byte document identifier, rendered as 24 lowercase hex characters.
///
/// Layout: 4 bytes of big-endian epoch seconds, 5 bytes chosen randomly once
/// per process, 3 bytes of a wrapping counter. Identifiers generated by one
/// process therefore sort by creation second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        let secs = Utc::now().timestamp() as u32;
        let unique = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// True for the all-zero identifier carried by entities not yet stored
    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 12]
    }

    /// Epoch seconds embedded in the identifier
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Syntactic check only: exactly 24 hex digits
    pub fn is_valid_hex(s: &str) -> bool {
        s.len() == OBJECT_ID_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_valid_hex(s) {
            return Err(InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = InvalidObjectId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}
