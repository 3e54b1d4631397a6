//! Database client and connection management

use crate::filter::Filter;
use crate::mysql::MySqlDocumentStore;
use crate::schema::Collection;
use crate::store::{Document, DocumentStore};
use crate::{DbError, DbResult};
use coredata_config::DbConfiguration;
use coredata_models::{now_millis, ObjectId, Timestamp};
use sqlx::mysql::MySqlConnectOptions;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Handle on the core data collections.
///
/// Cheap to clone; all clones share one store. Closing any clone closes the
/// store for all of them.
#[derive(Clone)]
pub struct DbClient {
    store: Arc<dyn DocumentStore>,
    clock: Clock,
}

impl fmt::Debug for DbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbClient")
            .field("store", &self.store.name())
            .finish()
    }
}

impl DbClient {
    /// Connect to MySQL and make sure the collection tables exist
    pub async fn open(config: &DbConfiguration) -> DbResult<Self> {
        info!(
            "Connecting to database at {}:{}/{}",
            config.host, config.port, config.database_name
        );

        let opts = DbConnectionBuilder::from_config(config).build();
        let store = MySqlDocumentStore::connect(opts, Duration::from_millis(config.timeout))
            .await
            .map_err(|e| {
                tracing::error!("Error connecting to the database: {}", e);
                e
            })?;
        store.ensure_schema().await?;

        Ok(Self::with_store(store))
    }

    /// Wrap an already constructed store
    pub fn with_store<S: DocumentStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
            clock: Arc::new(now_millis),
        }
    }

    /// Replace the clock used for created/modified stamps and age queries
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Timestamp + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        self.store.ping().await
    }

    /// Release the session. Later operations fail with `NoActiveClient`.
    pub async fn close(&self) {
        self.store.close().await;
        info!("Database session closed");
    }

    /// Fetch matching documents; a zero limit yields nothing without a store call
    pub(crate) async fn find_limit(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: usize,
    ) -> DbResult<Vec<Document>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.store.find(collection, filter, Some(limit)).await
    }

    /// Validate `id` and remove that document from `collection`
    #[instrument(skip(self))]
    pub(crate) async fn delete_by_id(&self, id: &str, collection: Collection) -> DbResult<()> {
        let id = parse_id(id)?;
        self.store.delete_by_id(collection, id).await
    }
}

/// Syntactic identifier check; never touches the store
pub fn parse_id(id: &str) -> DbResult<ObjectId> {
    id.parse().map_err(|_| DbError::InvalidIdentifier(id.to_string()))
}

/// Build MySQL connection options from components
pub struct DbConnectionBuilder {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: Option<String>,
}

impl DbConnectionBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: database.into(),
            username: "core".to_string(),
            password: None,
        }
    }

    pub fn from_config(config: &DbConfiguration) -> Self {
        let builder = Self::new(config.database_name.clone())
            .host(config.host.clone())
            .port(config.port)
            .username(config.username.clone());

        if config.password.is_empty() {
            builder
        } else {
            builder.password(config.password.clone())
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn build(self) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username);

        if let Some(password) = self.password {
            opts = opts.password(&password);
        }

        opts
    }
}
