//! In-memory document store
//!
//! Collections live in `BTreeMap`s keyed by object id behind a tokio
//! `RwLock`. Generated ids sort by creation second, so iteration order
//! follows insertion order for documents written by one process.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coredata_models::ObjectId;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::filter::{Filter, Update};
use crate::schema::Collection;
use crate::store::{document_id, Document, DocumentStore};
use crate::{DbError, DbResult};

type Collections = HashMap<Collection, BTreeMap<ObjectId, Document>>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
    closed: Arc<AtomicBool>,
    operations: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls issued so far, including failed ones
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    fn begin(&self) -> DbResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::NoActiveClient);
        }
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Value of the collection's unique field in `doc`, if the collection has one
fn unique_key(collection: Collection, doc: &Document) -> Option<(&'static str, &Value)> {
    let field = collection.unique_field()?;
    doc.get(field).map(|v| (field, v))
}

/// Fails if another document in `docs` already holds `doc`'s unique value
fn check_unique(
    collection: Collection,
    docs: &BTreeMap<ObjectId, Document>,
    id: ObjectId,
    doc: &Document,
) -> DbResult<()> {
    if let Some((field, value)) = unique_key(collection, doc) {
        let taken = docs
            .iter()
            .any(|(other_id, other)| *other_id != id && other.get(field) == Some(value));
        if taken {
            return Err(DbError::NotUnique(
                value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> DbResult<()> {
        self.begin()
    }

    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> DbResult<()> {
        self.begin()?;
        let mut guard = self.collections.write().await;
        let stored = guard.entry(collection).or_default();

        // Validate the whole batch before writing any of it
        let mut staged = BTreeMap::new();
        for doc in docs {
            let id = document_id(&doc)?;
            if stored.contains_key(&id) || staged.contains_key(&id) {
                return Err(DbError::Unexpected(format!("duplicate id {id}")));
            }
            check_unique(collection, stored, id, &doc)?;
            check_unique(collection, &staged, id, &doc)?;
            staged.insert(id, doc);
        }

        debug!(collection = collection.name(), count = staged.len(), "insert");
        stored.extend(staged);
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DbResult<Vec<Document>> {
        self.begin()?;
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(&collection) else {
            return Ok(Vec::new());
        };

        let matching = docs.values().filter(|d| filter.matches(d)).cloned();
        Ok(match limit {
            Some(n) => matching.take(n).collect(),
            None => matching.collect(),
        })
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> DbResult<u64> {
        self.begin()?;
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .map(|docs| docs.values().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        update: Update,
    ) -> DbResult<()> {
        self.begin()?;
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection).or_default();

        let current = docs.get(&id).ok_or(DbError::NotFound)?;
        let mut next = match update {
            Update::Replace(doc) => doc,
            Update::Set(fields) => {
                let mut merged = current.clone();
                merged.extend(fields);
                merged
            }
        };
        next.insert(
            coredata_models::fields::ID.to_string(),
            Value::String(id.to_hex()),
        );

        check_unique(collection, docs, id, &next)?;
        docs.insert(id, next);
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> DbResult<()> {
        self.begin()?;
        let mut guard = self.collections.write().await;
        guard
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id))
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> DbResult<u64> {
        self.begin()?;
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|_, d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
