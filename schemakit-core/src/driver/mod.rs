//! Live backend connections.
//!
//! A [`Driver`] is one open sqlx connection. Statements go through the text
//! protocol (`sqlx::raw_sql`) so statements such as `LOCK TABLES` that some
//! servers refuse to prepare still work, and every result is buffered in
//! full before it is handed back.

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "sqlite")]
mod sqlite;

use crate::config::ConnectionConfig;
use crate::models::DatabaseType;
use crate::statement::Row;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A failure reported by the backend or the connector.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Backend message
    pub message: String,
    /// SQLSTATE or vendor error code, when the backend reported one
    pub code: Option<String>,
}

impl DriverError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

#[cfg(any(feature = "mysql", feature = "sqlite"))]
impl From<sqlx::Error> for DriverError {
    fn from(error: sqlx::Error) -> Self {
        let code = error
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());
        let message = match &error {
            sqlx::Error::Database(db) => db.message().to_string(),
            other => other.to_string(),
        };
        Self { message, code }
    }
}

/// Buffered rows plus their column names.
pub type Fetched = (Arc<[String]>, Vec<Row>);

/// One open backend connection.
#[async_trait]
pub trait Driver: Send {
    /// Runs a row-producing statement and buffers all rows.
    async fn fetch(&mut self, sql: &str) -> Result<Fetched, DriverError>;

    /// Runs a statement and returns the affected-row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Opens a connection for `config` using the already generated `dsn`.
///
/// # Errors
/// Fails when the backend is unreachable, rejects the credentials, does not
/// answer within the configured timeout, or was compiled out.
pub(crate) async fn open(
    config: &ConnectionConfig,
    dsn: &str,
) -> Result<Box<dyn Driver>, DriverError> {
    match config.backend {
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => Ok(Box::new(mysql::MySqlDriver::connect(config, dsn).await?)),
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => Ok(Box::new(sqlite::SqliteDriver::connect(config, dsn).await?)),
        #[allow(unreachable_patterns)]
        other => Err(DriverError::new(format!(
            "support for {} was not compiled in; enable the '{}' feature",
            other,
            other.to_string().to_ascii_lowercase()
        ))),
    }
}

/// Column names of a buffered result, taken from its first row.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub(crate) fn column_names<R: sqlx::Row>(rows: &[R]) -> Arc<[String]> {
    use sqlx::Column;

    rows.first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let error = DriverError::new("no such table: t");
        assert_eq!(error.to_string(), "no such table: t");
        assert!(error.code.is_none());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_from_sqlx_error_without_code() {
        let error = DriverError::from(sqlx::Error::RowNotFound);
        assert!(error.code.is_none());
        assert!(!error.message.is_empty());
    }
}
