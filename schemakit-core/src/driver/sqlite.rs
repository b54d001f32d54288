//! SQLite connection over sqlx.

use super::{Driver, DriverError, Fetched, column_names};
use crate::config::ConnectionConfig;
use crate::models::Value;
use crate::statement::Row;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Executor as _, Row as _};
use std::str::FromStr;

pub(crate) struct SqliteDriver {
    connection: SqliteConnection,
}

impl SqliteDriver {
    pub(crate) async fn connect(config: &ConnectionConfig, dsn: &str) -> Result<Self, DriverError> {
        // Concurrent writers on one file wait for the lock instead of failing
        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .busy_timeout(config.connect_timeout);

        let connection = tokio::time::timeout(config.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                DriverError::new(format!(
                    "connection timed out after {}s",
                    config.connect_timeout.as_secs()
                ))
            })??;

        Ok(Self { connection })
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn fetch(&mut self, sql: &str) -> Result<Fetched, DriverError> {
        let rows = self.connection.fetch_all(sqlx::raw_sql(sql)).await?;
        let columns = column_names(&rows);
        let rows = rows
            .iter()
            .map(|row| {
                let values = (0..row.len()).map(|index| extract_value(row, index)).collect();
                Row::new(columns.clone(), values)
            })
            .collect();
        Ok((columns, rows))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        let result = self.connection.execute(sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.connection.close().await?;
        Ok(())
    }
}

/// Converts one column into a [`Value`] following the stored value's class.
fn extract_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::Integer);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::Float);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::Text);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map_or(Value::Null, Value::Bytes);
    }
    Value::Null
}
