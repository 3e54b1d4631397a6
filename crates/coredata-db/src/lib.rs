//! Data access layer for core data events, readings and value descriptors
//!
//! Every operation on [`DbClient`] maps to a single call against a
//! [`DocumentStore`]. Two stores are provided: [`MySqlDocumentStore`], which
//! keeps JSON documents in MySQL tables, and [`InMemoryStore`] for tests and
//! ephemeral use.

pub mod client;
pub mod filter;
pub mod memory;
pub mod mysql;
pub mod queries;
pub mod schema;
pub mod store;

pub use client::*;
pub use filter::{Filter, Update};
pub use memory::InMemoryStore;
pub use mysql::MySqlDocumentStore;
pub use schema::*;
pub use store::{Document, DocumentStore};

use coredata_models::InvalidObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("No active database client")]
    NoActiveClient,

    #[error("Invalid object id: {0}")]
    InvalidIdentifier(String),

    #[error("Record not found")]
    NotFound,

    #[error("Name is not unique: {0}")]
    NotUnique(String),

    #[error("Value descriptor {0} is still referenced by readings")]
    ValueDescriptorInUse(String),

    #[error("Unexpected database error: {0}")]
    Unexpected(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::PoolClosed => DbError::NoActiveClient,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::NotUnique(db.message().to_string())
            }
            other => DbError::Unexpected(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Unexpected(err.to_string())
    }
}

impl From<InvalidObjectId> for DbError {
    fn from(err: InvalidObjectId) -> Self {
        DbError::InvalidIdentifier(err.0)
    }
}

pub type DbResult<T> = Result<T, DbError>;
