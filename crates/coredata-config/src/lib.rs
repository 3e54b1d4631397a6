use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Connection settings consumed once when the database client is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfiguration {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
    /// Connect timeout in milliseconds
    pub timeout: u64,
}

impl Default for DbConfiguration {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database_name: "coredata".to_string(),
            username: "core".to_string(),
            password: String::new(),
            timeout: 5000,
        }
    }
}

/// Flat settings record for the export client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationStruct {
    pub hostname: String,
    pub port: u16,
    /// Database driver selector ("mysql" or "memory")
    pub db_type: String,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub db_database: String,
    pub db_port: u16,
    /// Milliseconds
    pub db_connect_timeout: u64,
    /// Milliseconds
    pub db_socket_timeout: u64,
    pub consul_host: String,
    pub consul_port: u16,
    pub check_interval: String,
    pub consul_profiles_active: String,
    pub distro_host: String,
    pub distro_port: u16,
}

impl Default for ConfigurationStruct {
    fn default() -> Self {
        let db = DbConfiguration::default();
        Self {
            hostname: "localhost".to_string(),
            port: 48080,
            db_type: "mysql".to_string(),
            db_host: db.host,
            db_username: db.username,
            db_password: db.password,
            db_database: db.database_name,
            db_port: db.port,
            db_connect_timeout: db.timeout,
            db_socket_timeout: 5000,
            consul_host: "localhost".to_string(),
            consul_port: 8500,
            check_interval: "10s".to_string(),
            consul_profiles_active: "default".to_string(),
            distro_host: "localhost".to_string(),
            distro_port: 48070,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

impl ConfigurationStruct {
    /// Load from the COREDATA_CONFIG path (TOML) if present, falling back to
    /// defaults, then apply COREDATA_* environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("COREDATA_CONFIG").unwrap_or_else(|_| "configuration.toml".to_string());
        let mut cfg = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<Self>(&s)?)
    }

    /// Override database fields from variables resolved by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COREDATA_DB_TYPE") {
            self.db_type = v;
        }
        if let Some(v) = lookup("COREDATA_DB_HOST") {
            self.db_host = v;
        }
        if let Some(v) = lookup("COREDATA_DB_PORT") {
            self.db_port = parse_env("COREDATA_DB_PORT", v)?;
        }
        if let Some(v) = lookup("COREDATA_DB_DATABASE") {
            self.db_database = v;
        }
        if let Some(v) = lookup("COREDATA_DB_USERNAME") {
            self.db_username = v;
        }
        if let Some(v) = lookup("COREDATA_DB_PASSWORD") {
            self.db_password = v;
        }
        if let Some(v) = lookup("COREDATA_DB_CONNECT_TIMEOUT") {
            self.db_connect_timeout = parse_env("COREDATA_DB_CONNECT_TIMEOUT", v)?;
        }
        Ok(())
    }

    /// Database connection settings derived from the flat record
    pub fn database(&self) -> DbConfiguration {
        DbConfiguration {
            host: self.db_host.clone(),
            port: self.db_port,
            database_name: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
            timeout: self.db_connect_timeout,
        }
    }

    /// Distribution service base URL
    pub fn distro_url(&self) -> String {
        format!("http://{}:{}", self.distro_host, self.distro_port)
    }

    /// Freeze into process-wide read-mostly state
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value,
    })
}
