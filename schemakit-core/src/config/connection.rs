//! Database connection configuration.

use super::Credentials;
use crate::error::SchemaKitError;
use crate::models::DatabaseType;
use crate::quoting::QuoteOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a database connection.
///
/// Credentials are carried alongside but are never serialized or displayed.
///
/// # Example
/// ```rust
/// use schemakit_core::{ConnectionConfig, DatabaseType};
///
/// let config = ConnectionConfig::new(DatabaseType::MySQL, "localhost")
///     .with_port(3307)
///     .with_database("ilias");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.to_string(), "mysql://localhost:3307/ilias");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend dialect tag
    pub backend: DatabaseType,
    /// Database host address (ignored by SQLite)
    #[serde(default = "default_host")]
    pub host: String,
    /// Optional port number; the backend default applies when unset
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or file path for SQLite
    #[serde(default)]
    pub database: Option<String>,
    /// Client character set
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Connection timeout duration
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Literal quoting compatibility switches
    #[serde(default)]
    pub quote: QuoteOptions,
    /// Username and password, never serialized
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_charset() -> String {
    "utf8".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.backend {
            DatabaseType::SQLite => write!(
                f,
                "sqlite://{}",
                self.database.as_deref().unwrap_or(":memory:")
            ),
            DatabaseType::MySQL => write!(
                f,
                "mysql://{}:{}/{}",
                self.host,
                self.effective_port().unwrap_or_default(),
                self.database.as_deref().unwrap_or_default()
            ),
        }
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a new connection config with defaults for everything but
    /// backend and host.
    pub fn new(backend: DatabaseType, host: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            port: None,
            database: None,
            charset: default_charset(),
            connect_timeout: default_connect_timeout(),
            quote: QuoteOptions::default(),
            credentials: None,
        }
    }

    /// SQLite configuration for an in-memory database.
    pub fn sqlite_memory() -> Self {
        Self::new(DatabaseType::SQLite, "")
    }

    /// SQLite configuration for a database file.
    pub fn sqlite_file(path: impl Into<String>) -> Self {
        Self::new(DatabaseType::SQLite, "").with_database(path)
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Builder method to set quoting options.
    pub fn with_quote_options(mut self, quote: QuoteOptions) -> Self {
        self.quote = quote;
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The configured port, or the backend default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.backend.default_port())
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns a configuration error if a value can never produce a working
    /// connection.
    pub fn validate(&self) -> crate::Result<()> {
        if self.backend == DatabaseType::MySQL && self.host.trim().is_empty() {
            return Err(SchemaKitError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(SchemaKitError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.charset.trim().is_empty() {
            return Err(SchemaKitError::configuration("charset cannot be empty"));
        }

        if self.connect_timeout.is_zero() {
            return Err(SchemaKitError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if let Some(database) = &self.database
            && database.trim().is_empty()
        {
            return Err(SchemaKitError::configuration(
                "database name cannot be blank",
            ));
        }

        Ok(())
    }
}
