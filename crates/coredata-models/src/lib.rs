//! Core data domain types
//!
//! Events, readings and value descriptors as stored by the core data
//! service, plus the 12-byte object identifiers that key them.

pub mod id;
pub mod types;

pub use id::*;
pub use types::*;
