//! Core data models for the portable schema description.
//!
//! These types describe tables, columns, indexes and constraints
//! independently of any backend. Dialects translate them to native DDL and
//! the introspector reconstructs them from live metadata.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Port used when the configuration leaves it unset.
    pub fn default_port(self) -> Option<u16> {
        match self {
            DatabaseType::MySQL => Some(3306),
            DatabaseType::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = crate::SchemaKitError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "innodb" => Ok(DatabaseType::MySQL),
            "sqlite" | "sqlite3" => Ok(DatabaseType::SQLite),
            other => Err(crate::SchemaKitError::configuration(format!(
                "unknown database type '{}'",
                other
            ))),
        }
    }
}

/// Backend-independent column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortableType {
    Text,
    Integer,
    Float,
    Date,
    Time,
    DateTime,
    Clob,
    Timestamp,
}

impl PortableType {
    /// All portable types.
    pub const ALL: [PortableType; 8] = [
        PortableType::Integer,
        PortableType::Float,
        PortableType::Text,
        PortableType::Clob,
        PortableType::Date,
        PortableType::Time,
        PortableType::DateTime,
        PortableType::Timestamp,
    ];

    /// Lowercase tag used in serialized definitions and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            PortableType::Text => "text",
            PortableType::Integer => "integer",
            PortableType::Float => "float",
            PortableType::Date => "date",
            PortableType::Time => "time",
            PortableType::DateTime => "datetime",
            PortableType::Clob => "clob",
            PortableType::Timestamp => "timestamp",
        }
    }

    /// Text-like types accept string operators such as LIKE.
    pub fn is_text_like(self) -> bool {
        matches!(self, PortableType::Text | PortableType::Clob)
    }

    /// Numeric types render their defaults without quotes.
    pub fn is_numeric(self) -> bool {
        matches!(self, PortableType::Integer | PortableType::Float)
    }
}

impl std::fmt::Display for PortableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortableType {
    type Err = crate::SchemaKitError;

    fn from_str(s: &str) -> crate::Result<Self> {
        PortableType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::SchemaKitError::schema(format!("unknown portable type '{}'", s)))
    }
}

/// Portable description of a single column.
///
/// Attribute combinations are checked by
/// [`check_column_definition`](crate::types::check_column_definition) before
/// any DDL is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    #[serde(rename = "type")]
    pub column_type: PortableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fixed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub autoincrement: bool,
}

impl ColumnDefinition {
    /// Creates a nullable column of the given type with no other attributes.
    pub fn new(column_type: PortableType) -> Self {
        Self {
            column_type,
            length: None,
            precision: None,
            not_null: false,
            default: None,
            fixed: false,
            is_primary: false,
            autoincrement: false,
        }
    }

    /// Shorthand for a `text(length)` column.
    pub fn text(length: u32) -> Self {
        Self::new(PortableType::Text).with_length(length)
    }

    /// Shorthand for an `integer(length)` column.
    pub fn integer(length: u32) -> Self {
        Self::new(PortableType::Integer).with_length(length)
    }

    /// Builder method to set length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Builder method to set precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Builder method to set the default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Builder method to mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Builder method for fixed-width text.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Builder method to mark the column as (part of) the primary key.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Builder method for an auto-increment ("sequence") column.
    /// Implies NOT NULL.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self.not_null = true;
        self
    }

    /// Compares two definitions after filling in the lengths a backend
    /// assumes when none is given. `is_primary` is ignored: it follows from
    /// the table's primary key, not from the column.
    pub fn is_equivalent_to(&self, other: &ColumnDefinition) -> bool {
        fn normalized(definition: &ColumnDefinition) -> ColumnDefinition {
            let length = match definition.column_type {
                PortableType::Integer => Some(definition.length.unwrap_or(4)),
                PortableType::Text => Some(definition.length.unwrap_or(255)),
                _ => definition.length,
            };
            ColumnDefinition {
                length,
                is_primary: false,
                ..definition.clone()
            }
        }
        normalized(self) == normalized(other)
    }
}

/// Table name plus ordered columns and an optional primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<(String, ColumnDefinition)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
}

impl TableDefinition {
    /// Creates an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Appends a column, keeping declaration order.
    pub fn column(mut self, name: impl Into<String>, definition: ColumnDefinition) -> Self {
        self.columns.push((name.into(), definition));
        self
    }

    /// Sets an explicit primary key column list.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Looks up a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, definition)| definition)
    }

    /// Effective primary key: the explicit list, or else the columns flagged
    /// primary, or else the auto-increment column.
    pub fn effective_primary_key(&self) -> Vec<String> {
        if !self.primary_key.is_empty() {
            return self.primary_key.clone();
        }
        let flagged: Vec<String> = self
            .columns
            .iter()
            .filter(|(_, d)| d.is_primary)
            .map(|(n, _)| n.clone())
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.columns
            .iter()
            .filter(|(_, d)| d.autoincrement)
            .map(|(n, _)| n.clone())
            .collect()
    }
}

/// Logical index description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub fulltext: bool,
}

/// Kind of table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

/// Primary-key or unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    pub name: String,
    pub kind: ConstraintKind,
    pub fields: Vec<String>,
}

/// One plausible reconstruction of a live column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDefinition {
    pub definition: ColumnDefinition,
    /// Native type as reported by the backend, e.g. `varchar(20)`.
    pub native_type: String,
}

/// Optional capabilities a dialect may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// `begin_transaction` / `commit` / `rollback`
    Transactions,
    /// Fulltext indexes
    Fulltext,
    /// Routing reads to a replica connection
    ReadReplica,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Transactions => write!(f, "transactions"),
            Feature::Fulltext => write!(f, "fulltext indexes"),
            Feature::ReadReplica => write!(f, "read replica routing"),
        }
    }
}

/// Table lock mode used by `lock_tables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Read,
    Write,
}

/// A table to lock, with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLock {
    pub table: String,
    pub mode: LockMode,
    pub alias: Option<String>,
}

impl TableLock {
    /// Read lock on a table.
    pub fn read(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            mode: LockMode::Read,
            alias: None,
        }
    }

    /// Write lock on a table.
    pub fn write(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            mode: LockMode::Write,
            alias: None,
        }
    }

    /// Builder method to lock the table under an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// A typed column assignment used by `insert`, `update` and `replace`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub column_type: PortableType,
    pub value: Value,
}

impl FieldValue {
    /// Creates an assignment of `value`, quoted as `column_type`.
    pub fn new(name: impl Into<String>, column_type: PortableType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            value: value.into(),
        }
    }
}

/// A scalar value as read from, or written to, the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    /// Binary data; rendered as a hex literal and as base64 in JSON
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text view of the value; numbers are formatted, bytes decoded lossily.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Integer view of the value; text is parsed strictly.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            Value::Null | Value::Float(_) => None,
        }
    }

    /// JSON rendering; byte strings become `base64:` prefixed text.
    pub fn to_json(&self) -> serde_json::Value {
        use base64::Engine;

        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(b)
            )),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
