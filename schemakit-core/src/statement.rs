//! Buffered result sets and rows.
//!
//! Results are fully buffered when the statement runs, so a [`ResultSet`]
//! never holds the connection. It is released automatically once fetching
//! reaches the end, or explicitly with [`ResultSet::free`].

use crate::error::SchemaKitError;
use crate::models::Value;
use crate::Result;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;

/// One result row keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row; `values` must be in `columns` order.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in select order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Looks up a value by column name, falling back to a case-insensitive
    /// match.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
            })?;
        self.values.get(index)
    }

    /// Text view of a column; NULL and missing columns are `None`.
    pub fn get_text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Value::as_text)
    }

    /// Integer view of a column; NULL, missing and non-numeric are `None`.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    /// Required text column.
    ///
    /// # Errors
    /// Returns a schema error naming the column when it is missing or NULL.
    pub fn require_text(&self, column: &str) -> Result<String> {
        self.get_text(column).ok_or_else(|| {
            SchemaKitError::schema(format!("metadata row is missing column '{}'", column))
        })
    }

    /// Value of the first column, for single-value queries.
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }

    /// Field-name-keyed JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// A buffered result set.
#[derive(Debug)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
    row_count: usize,
    released: bool,
}

impl ResultSet {
    /// Wraps rows produced by a driver.
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            row_count: rows.len(),
            rows: rows.into(),
            released: false,
        }
    }

    /// Column names of the result.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows the backend returned, independent of how many have
    /// been fetched.
    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    /// True once the result was exhausted or freed.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Next row as a field-name-keyed map; `None` at end of data, which also
    /// releases the result.
    pub fn fetch_assoc(&mut self) -> Option<Row> {
        if self.released {
            return None;
        }
        let row = self.rows.pop_front();
        if row.is_none() {
            self.free();
        }
        row
    }

    /// Next row deserialized into `T`; `Ok(None)` at end of data, which also
    /// releases the result.
    ///
    /// # Errors
    /// Returns a serialization error when the row does not fit `T`.
    pub fn fetch_object<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let Some(row) = self.fetch_assoc() else {
            return Ok(None);
        };
        serde_json::from_value(row.to_json())
            .map(Some)
            .map_err(|source| SchemaKitError::Serialization {
                context: "Failed to map result row onto record type".to_string(),
                source,
            })
    }

    /// Drains all remaining rows and releases the result.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        let rows = self.rows.drain(..).collect();
        self.free();
        rows
    }

    /// Releases the result; later fetches return end of data.
    pub fn free(&mut self) {
        self.rows.clear();
        self.released = true;
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch_assoc()
    }
}
