//! # Service Configuration
//!
//! Every setting is a command-line flag that can also be supplied through
//! the environment. Relative schema file names resolve against
//! `--schema-dir`.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use roster_schema::validate::{CREATE_SCHEMA_FILE, UPDATE_SCHEMA_FILE};
use roster_schema::SchemaValidator;
use thiserror::Error;

use crate::store::postgres::is_valid_table_name;

/// Origin allowed by default, the local web front end.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Which [`ProfileStore`](crate::store::ProfileStore) backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuration errors detected before the service starts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid table name '{0}': expected a lowercase SQL identifier")]
    InvalidTable(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("max connections must be greater than zero")]
    ZeroConnections,
}

/// Command-line and environment configuration for `roster-api`.
#[derive(Parser, Clone)]
#[command(name = "roster-api", version, about = "Student profile service")]
pub struct AppConfig {
    /// Address to listen on.
    #[arg(long, env = "ROSTER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 6000)]
    pub port: u16,

    /// Storage backend.
    #[arg(long, env = "ROSTER_STORE", value_enum, default_value_t = StoreBackend::Postgres)]
    pub store: StoreBackend,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/roster"
    )]
    pub database_url: String,

    /// Table holding the profile collection.
    #[arg(long, env = "ROSTER_TABLE", default_value = "student")]
    pub table: String,

    /// Connection pool size.
    #[arg(long, env = "ROSTER_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Directory holding the JSON schema documents.
    #[arg(long, env = "ROSTER_SCHEMA_DIR", default_value = "schemas")]
    pub schema_dir: PathBuf,

    /// Schema applied to create payloads.
    #[arg(long, env = "ROSTER_CREATE_SCHEMA", default_value = CREATE_SCHEMA_FILE)]
    pub create_schema: PathBuf,

    /// Schema applied to update payloads.
    #[arg(long, env = "ROSTER_UPDATE_SCHEMA", default_value = UPDATE_SCHEMA_FILE)]
    pub update_schema: PathBuf,

    /// Comma-separated CORS origin allow-list. Empty allows any origin.
    #[arg(
        long,
        env = "ROSTER_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = DEFAULT_CORS_ORIGIN
    )]
    pub cors_origins: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "ROSTER_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "ROSTER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store == StoreBackend::Postgres && !is_valid_table_name(&self.table) {
            return Err(ConfigError::InvalidTable(self.table.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            cors_origins: self
                .cors_origins
                .iter()
                .map(|o| o.trim())
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn schema_validator(&self) -> SchemaValidator {
        SchemaValidator::new(
            self.schema_dir.join(&self.create_schema),
            self.schema_dir.join(&self.update_schema),
        )
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("store", &self.store)
            .field("database_url", &redact_url(&self.database_url))
            .field("table", &self.table)
            .field("max_connections", &self.max_connections)
            .field("schema_dir", &self.schema_dir)
            .field("create_schema", &self.create_schema)
            .field("update_schema", &self.update_schema)
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// Replace the userinfo part of a URL with `***`.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Transport settings consumed by [`app`](crate::app).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Allowed CORS origins. Empty means any origin, without credentials.
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}
