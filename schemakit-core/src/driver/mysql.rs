//! MySQL connection over sqlx.

use super::{Driver, DriverError, Fetched, column_names};
use crate::config::ConnectionConfig;
use crate::dialect::SESSION_SQL_MODE;
use crate::models::Value;
use crate::statement::Row;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Executor as _, Row as _};
use std::str::FromStr;

pub(crate) struct MySqlDriver {
    connection: MySqlConnection,
}

impl MySqlDriver {
    pub(crate) async fn connect(config: &ConnectionConfig, dsn: &str) -> Result<Self, DriverError> {
        let mut options = MySqlConnectOptions::from_str(dsn)?;
        if let Some(credentials) = &config.credentials {
            options = options.username(credentials.username());
            if let Some(password) = credentials.password() {
                options = options.password(password);
            }
        }

        let connection = tokio::time::timeout(config.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                DriverError::new(format!(
                    "connection timed out after {}s",
                    config.connect_timeout.as_secs()
                ))
            })??;

        let mut driver = Self { connection };
        driver.execute(SESSION_SQL_MODE).await?;
        Ok(driver)
    }
}

#[async_trait]
impl Driver for MySqlDriver {
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

/// Converts one column of a text-protocol row into a [`Value`].
fn extract_value(row: &MySqlRow, index: usize) -> Value {
    // Try different types in order of likelihood
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::Integer);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return match v {
            None => Value::Null,
            Some(n) => i64::try_from(n).map_or_else(|_| Value::Text(n.to_string()), Value::Integer),
        };
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
    // DECIMAL, temporal and other types arrive as text
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::Text);
    }
    Value::Null
}
