//! Document store boundary

use async_trait::async_trait;
use coredata_models::ObjectId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::filter::{Filter, Update};
use crate::schema::Collection;
use crate::{DbError, DbResult};

/// A stored document: a JSON object carrying a hex `id` field
pub type Document = Map<String, Value>;

/// Storage backend holding the three collections.
///
/// Each call acquires its own handle on the backend (a pooled connection,
/// a lock guard) and releases it before returning, on every path. After
/// [`DocumentStore::close`] every call fails with [`DbError::NoActiveClient`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    async fn ping(&self) -> DbResult<()>;

    /// Insert documents in order. A document whose unique field collides with
    /// a stored one fails with [`DbError::NotUnique`].
    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> DbResult<()>;

    /// Documents matching `filter` in insertion order, capped at `limit`
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DbResult<Vec<Document>>;

    async fn count(&self, collection: Collection, filter: &Filter) -> DbResult<u64>;

    /// Fails with [`DbError::NotFound`] when no document has `id`
    async fn update_by_id(&self, collection: Collection, id: ObjectId, update: Update)
        -> DbResult<()>;

    /// Fails with [`DbError::NotFound`] when no document has `id`
    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> DbResult<()>;

    /// Returns the number of documents removed
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> DbResult<u64>;

    async fn close(&self);

    /// First document matching `filter`, or [`DbError::NotFound`]
    async fn find_one(&self, collection: Collection, filter: &Filter) -> DbResult<Document> {
        self.find(collection, filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or(DbError::NotFound)
    }

    async fn insert_one(&self, collection: Collection, doc: Document) -> DbResult<()> {
        self.insert_many(collection, vec![doc]).await
    }
}

pub fn to_document<T: Serialize>(value: &T) -> DbResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::Unexpected(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> DbResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// The `id` field of a stored document
pub fn document_id(doc: &Document) -> DbResult<ObjectId> {
    let raw = doc
        .get(coredata_models::fields::ID)
        .and_then(Value::as_str)
        .ok_or_else(|| DbError::Unexpected("document has no id".to_string()))?;
    raw.parse()
        .map_err(|_| DbError::Unexpected(format!("document has malformed id {raw:?}")))
}
