//! SQL dialects.
//!
//! A [`Dialect`] renders the portable schema model into one backend's SQL and
//! parses that backend's metadata back. It is selected once from
//! [`ConnectionConfig::backend`](crate::ConnectionConfig) and kept for the
//! lifetime of the [`Database`](crate::Database).

mod mysql;
mod reserved;
mod sqlite;

pub use mysql::MySqlDialect;
#[cfg(feature = "mysql")]
pub(crate) use mysql::SESSION_SQL_MODE;
pub use reserved::{MYSQL_RESERVED, SQLITE_RESERVED};
pub use sqlite::SqliteDialect;

use crate::config::ConnectionConfig;
use crate::error::SchemaKitError;
use crate::models::{ColumnDefinition, DatabaseType, Feature, TableDefinition, TableLock};
use crate::schema::AlterAction;
use crate::statement::Row;
use crate::types::{self, NamingRules, NativeColumn};
use crate::Result;

/// Statements that atomically advance an emulated sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceIncrement {
    /// One statement that updates and returns the new value.
    Returning(String),
    /// An update followed by a select of the new value on the same
    /// connection.
    UpdateThenSelect { update: String, select: String },
}

/// Backend-specific SQL rendering and metadata parsing.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    /// Backend this dialect speaks.
    fn database_type(&self) -> DatabaseType;

    /// Capability predicate.
    fn supports(&self, feature: Feature) -> bool;

    /// Connection descriptor for `config`; never contains credentials.
    fn generate_dsn(&self, config: &ConnectionConfig) -> Result<String>;

    /// Name limits and reserved words.
    fn rules(&self) -> &NamingRules;

    /// Identifier quote character.
    fn identifier_quote(&self) -> char;

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quotes a string literal with backend escaping.
    fn quote_string(&self, value: &str) -> String;

    /// Native column type for a portable definition.
    fn native_type(&self, definition: &ColumnDefinition) -> String {
        types::native_type(definition)
    }

    /// Rendered DEFAULT literal, if the definition has one.
    fn default_literal(&self, definition: &ColumnDefinition) -> Option<String> {
        let default = definition.default.as_deref()?;
        let numeric = match definition.column_type {
            crate::models::PortableType::Integer => default.trim().parse::<i64>().is_ok(),
            crate::models::PortableType::Float => default
                .trim()
                .parse::<f64>()
                .is_ok_and(f64::is_finite),
            _ => false,
        };
        Some(if numeric {
            default.trim().to_string()
        } else {
            self.quote_string(default)
        })
    }

    /// Column declaration as used in CREATE and ALTER; never contains the
    /// primary key clause.
    fn column_declaration(&self, name: &str, definition: &ColumnDefinition) -> String;

    /// `CREATE TABLE` statement.
    fn create_table_sql(&self, table: &TableDefinition) -> Result<String>;

    /// `DROP TABLE` statement.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Single `ALTER TABLE` statement for one resolved change.
    fn alter_table_sql(&self, table: &str, action: &AlterAction) -> Result<String>;

    /// Derives the stored constraint name from a table-scoped one.
    ///
    /// Backends that namespace constraints per table return `name`
    /// unchanged; backends with global names derive a composite.
    fn constraint_name(&self, _table: &str, name: &str) -> String {
        name.to_string()
    }

    /// Physical index name: characters outside `[a-zA-Z0-9_$]` become `_`,
    /// followed by the `_idx` suffix.
    fn index_name(&self, name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_idx", cleaned)
    }

    /// Logical name of a physical index of `table`.
    fn logical_index_name(&self, _table: &str, physical: &str) -> String {
        physical
            .strip_suffix("_idx")
            .unwrap_or(physical)
            .to_string()
    }

    /// Name of the counter table backing `table`'s emulated sequence.
    fn sequence_table_name(&self, table: &str) -> String {
        format!("{}_seq", table)
    }

    /// Logical name reported for the primary key constraint.
    fn primary_key_identifier(&self) -> &'static str {
        "PRIMARY"
    }

    /// `CREATE INDEX` statement.
    fn create_index_sql(&self, table: &str, physical: &str, fields: &[String]) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote_identifier(physical),
            self.quote_identifier(table),
            self.field_list(fields)
        )
    }

    /// `DROP INDEX` statement.
    fn drop_index_sql(&self, table: &str, physical: &str) -> String;

    /// Adds a unique constraint backed by the physical index name.
    fn add_unique_sql(&self, table: &str, physical: &str, fields: &[String]) -> String;

    /// Adds a primary key to an existing table.
    fn add_primary_key_sql(&self, table: &str, fields: &[String]) -> Result<String>;

    /// Drops the primary key of an existing table.
    fn drop_primary_key_sql(&self, table: &str) -> Result<String>;

    /// Statements creating an emulated sequence table starting at `start`.
    fn create_sequence_sql(&self, sequence_table: &str, start: i64) -> Vec<String> {
        let mut statements = vec![format!(
            "CREATE TABLE {} ({} INT NOT NULL, PRIMARY KEY ({}))",
            self.quote_identifier(sequence_table),
            self.quote_identifier("sequence"),
            self.quote_identifier("sequence")
        )];
        if start > 1 {
            statements.push(self.sequence_seed_sql(sequence_table, start.saturating_sub(1)));
        }
        statements
    }

    /// Inserts the counter row of an empty sequence table.
    fn sequence_seed_sql(&self, sequence_table: &str, value: i64) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(sequence_table),
            self.quote_identifier("sequence"),
            value
        )
    }

    /// Statements that atomically advance a sequence table.
    fn sequence_increment(&self, sequence_table: &str) -> SequenceIncrement;

    /// Query returning the identifier generated by the last insert.
    fn last_insert_id_sql(&self) -> &'static str;

    /// Clause appended to a query by a pending limit.
    fn limit_clause(&self, limit: u64, offset: u64) -> String;

    /// Statement acquiring table locks.
    fn lock_tables_sql(&self, locks: &[TableLock]) -> String;

    /// Statement releasing table locks.
    fn unlock_tables_sql(&self) -> String;

    /// Statement starting a transaction.
    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    /// `CREATE DATABASE` statement.
    fn create_database_sql(
        &self,
        name: &str,
        charset: &str,
        collation: Option<&str>,
    ) -> Result<String>;

    /// Statement reclaiming storage of a table.
    fn optimize_table_sql(&self, table: &str) -> String;

    /// Current timestamp expression.
    fn now(&self) -> &'static str;

    /// String concatenation of already-rendered expressions.
    fn concat(&self, parts: &[String]) -> String;

    /// Substring expression; `position` is 1-based.
    fn substr(&self, expression: &str, position: u64, length: Option<u64>) -> String {
        match length {
            Some(length) => format!("SUBSTR({}, {}, {})", expression, position, length),
            None => format!("SUBSTR({}, {})", expression, position),
        }
    }

    /// Position of `needle` in `haystack` from `position` (1-based), 0 when
    /// absent.
    fn locate(&self, needle: &str, haystack: &str, position: u64) -> String;

    /// Query listing base tables, one `table_name` column.
    fn list_tables_sql(&self) -> String;

    /// Query returning `cnt` = 1 when the table exists.
    fn table_exists_sql(&self, table: &str) -> String;

    /// Query returning one metadata row per column, in ordinal order.
    fn table_columns_sql(&self, table: &str) -> String;

    /// Parses one row of [`table_columns_sql`](Self::table_columns_sql).
    fn parse_column_row(&self, row: &Row) -> Result<NativeColumn>;

    /// Query returning one row per indexed column with `index_name`,
    /// `column_name`, `seq`, `is_unique` and `origin` (`pk`, `ft` or other).
    fn table_indexes_sql(&self, table: &str) -> String;

    /// Comma-separated quoted identifiers.
    fn field_list(&self, fields: &[String]) -> String {
        fields
            .iter()
            .map(|f| self.quote_identifier(f))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Fails with [`SchemaKitError::UnsupportedFeature`] unless supported.
    fn require(&self, feature: Feature) -> Result<()> {
        if self.supports(feature) {
            Ok(())
        } else {
            Err(SchemaKitError::unsupported_feature(
                feature.to_string(),
                self.database_type().to_string(),
            ))
        }
    }
}

/// Selects the dialect for a backend.
pub fn for_backend(backend: DatabaseType) -> Box<dyn Dialect> {
    match backend {
        DatabaseType::MySQL => Box::new(MySqlDialect),
        DatabaseType::SQLite => Box::new(SqliteDialect),
    }
}
