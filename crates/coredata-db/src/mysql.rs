//! MySQL-backed document store
//!
//! Each collection is a table of `(seq, id, doc)` rows where `doc` holds the
//! JSON document as text. Filters become `JSON_CONTAINS` / `JSON_EXTRACT`
//! predicates with bound parameters.

use std::ops::Bound;
use std::time::Duration;

use async_trait::async_trait;
use coredata_models::{fields, ObjectId};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, QueryBuilder, Row};
use tracing::{debug, info, instrument};

use crate::filter::{Filter, Update};
use crate::schema::{create_table_sql, Collection};
use crate::store::{document_id, Document, DocumentStore};
use crate::{DbError, DbResult};

/// Rows per INSERT statement; each row binds two parameters and MySQL caps a
/// prepared statement at 65,535 placeholders
const INSERT_BATCH_ROWS: usize = 1_000;

#[derive(Clone)]
pub struct MySqlDocumentStore {
    pool: MySqlPool,
}

impl MySqlDocumentStore {
    /// Connect a pool; `timeout` bounds both the initial connect and every
    /// later connection acquire
    pub async fn connect(opts: MySqlConnectOptions, timeout: Duration) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(timeout)
            .connect_with(opts)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Create the collection tables if they do not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> DbResult<()> {
        let mut conn = self.acquire().await?;
        for collection in Collection::ALL {
            sqlx::query(&create_table_sql(collection))
                .execute(&mut *conn)
                .await?;
        }
        info!("Collection tables ready");
        Ok(())
    }

    /// Scoped handle for one operation; returned to the pool on drop
    async fn acquire(&self) -> DbResult<PoolConnection<MySql>> {
        if self.pool.is_closed() {
            return Err(DbError::NoActiveClient);
        }
        Ok(self.pool.acquire().await?)
    }
}

/// Path expression for a top-level document field
fn json_path(field: &str) -> String {
    format!("'$.{field}'")
}

fn push_filter(qb: &mut QueryBuilder<'static, MySql>, filter: &Filter) -> DbResult<()> {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq(field, value) if *field == fields::ID => {
            qb.push("id = ").push_bind(id_param(value)?);
        }
        Filter::Eq(field, value) => {
            push_contains(qb, field, value)?;
        }
        Filter::Range {
            field,
            lower,
            upper,
        } => {
            let column = format!("CAST(JSON_EXTRACT(doc, {}) AS SIGNED)", json_path(field));
            let mut parts = Vec::new();
            match lower {
                Bound::Included(v) => parts.push((">=", *v)),
                Bound::Excluded(v) => parts.push((">", *v)),
                Bound::Unbounded => {}
            }
            match upper {
                Bound::Included(v) => parts.push(("<=", *v)),
                Bound::Excluded(v) => parts.push(("<", *v)),
                Bound::Unbounded => {}
            }
            if parts.is_empty() {
                qb.push("TRUE");
            }
            for (i, (op, v)) in parts.into_iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                qb.push(format!("{column} {op} ")).push_bind(v);
            }
        }
        Filter::In(_, values) if values.is_empty() => {
            qb.push("FALSE");
        }
        Filter::In(field, values) if *field == fields::ID => {
            qb.push("id IN (");
            let mut sep = qb.separated(", ");
            for value in values {
                sep.push_bind(id_param(value)?);
            }
            qb.push(")");
        }
        Filter::In(field, values) => {
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_contains(qb, field, value)?;
            }
            qb.push(")");
        }
        Filter::And(parts) if parts.is_empty() => {
            qb.push("TRUE");
        }
        Filter::And(parts) => {
            qb.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_filter(qb, part)?;
            }
            qb.push(")");
        }
    }
    Ok(())
}

/// JSON_CONTAINS is true for an equal scalar and for an array holding it
fn push_contains(
    qb: &mut QueryBuilder<'static, MySql>,
    field: &str,
    value: &Value,
) -> DbResult<()> {
    qb.push("JSON_CONTAINS(doc, ")
        .push_bind(serde_json::to_string(value)?)
        .push(format!(", {})", json_path(field)));
    Ok(())
}

fn id_param(value: &Value) -> DbResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DbError::Unexpected(format!("id filter expects a string, got {value}")))
}

fn select_query(
    collection: Collection,
    filter: &Filter,
    limit: Option<usize>,
) -> DbResult<QueryBuilder<'static, MySql>> {
    let mut qb = QueryBuilder::new(format!("SELECT doc FROM `{}` WHERE ", collection.name()));
    push_filter(&mut qb, filter)?;
    qb.push(" ORDER BY seq");
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    Ok(qb)
}

fn count_query(collection: Collection, filter: &Filter) -> DbResult<QueryBuilder<'static, MySql>> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COUNT(*) AS count FROM `{}` WHERE ",
        collection.name()
    ));
    push_filter(&mut qb, filter)?;
    Ok(qb)
}

fn delete_query(collection: Collection, filter: &Filter) -> DbResult<QueryBuilder<'static, MySql>> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM `{}` WHERE ", collection.name()));
    push_filter(&mut qb, filter)?;
    Ok(qb)
}

fn update_query(
    collection: Collection,
    id: ObjectId,
    update: Update,
) -> DbResult<QueryBuilder<'static, MySql>> {
    let mut qb = QueryBuilder::new(format!("UPDATE `{}` SET doc = ", collection.name()));
    match update {
        Update::Replace(mut doc) => {
            doc.insert(fields::ID.to_string(), Value::String(id.to_hex()));
            qb.push_bind(serde_json::to_string(&doc)?);
        }
        Update::Set(doc) if doc.is_empty() => {
            qb.push("doc");
        }
        Update::Set(doc) => {
            qb.push("JSON_SET(doc");
            for (key, value) in doc {
                if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(DbError::Unexpected(format!("unsupported field name {key:?}")));
                }
                qb.push(format!(", {}, CAST(", json_path(&key)))
                    .push_bind(serde_json::to_string(&value)?)
                    .push(" AS JSON)");
            }
            qb.push(")");
        }
    }
    qb.push(" WHERE id = ").push_bind(id.to_hex());
    Ok(qb)
}

fn insert_query(
    collection: Collection,
    rows: &[(String, String)],
) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO `{}` (id, doc) ", collection.name()));
    qb.push_values(rows.iter().cloned(), |mut b, (id, json)| {
        b.push_bind(id).push_bind(json);
    });
    qb
}

#[async_trait]
impl DocumentStore for MySqlDocumentStore {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn ping(&self) -> DbResult<()> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    #[instrument(skip(self, docs), fields(collection = collection.name(), count = docs.len()))]
    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> DbResult<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(docs.len());
        for doc in &docs {
            rows.push((document_id(doc)?.to_hex(), serde_json::to_string(doc)?));
        }

        let mut conn = self.acquire().await?;
        let mut tx = conn.begin().await?;
        for batch in rows.chunks(INSERT_BATCH_ROWS) {
            insert_query(collection, batch).build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!("Inserted documents");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = collection.name()))]
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DbResult<Vec<Document>> {
        let mut qb = select_query(collection, filter, limit)?;
        let mut conn = self.acquire().await?;
        let rows = qb.build().fetch_all(&mut *conn).await?;

        let docs = rows
            .iter()
            .map(|row| -> DbResult<Document> {
                let raw: String = row.try_get("doc")?;
                Ok(serde_json::from_str::<Document>(&raw)?)
            })
            .collect::<DbResult<Vec<_>>>()?;

        debug!("Retrieved {} documents", docs.len());
        Ok(docs)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> DbResult<u64> {
        let mut qb = count_query(collection, filter)?;
        let mut conn = self.acquire().await?;
        let row = qb.build().fetch_one(&mut *conn).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as u64)
    }

    #[instrument(skip(self, update), fields(collection = collection.name()))]
    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        update: Update,
    ) -> DbResult<()> {
        let mut qb = update_query(collection, id, update)?;
        let mut conn = self.acquire().await?;
        let result = qb.build().execute(&mut *conn).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(collection = collection.name()))]
    async fn delete_by_id(&self, collection: Collection, id: ObjectId) -> DbResult<()> {
        let mut conn = self.acquire().await?;
        let result = sqlx::query(&format!("DELETE FROM `{}` WHERE id = ?", collection.name()))
            .bind(id.to_hex())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(collection = collection.name()))]
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> DbResult<u64> {
        let mut qb = delete_query(collection, filter)?;
        let mut conn = self.acquire().await?;
        let deleted = qb.build().execute(&mut *conn).await?.rows_affected();

        debug!("Deleted {} documents", deleted);
        Ok(deleted)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
