//! Portable database abstraction and schema management for SchemaKit.
//!
//! This crate sits above a raw SQL connection and lets callers create,
//! alter and introspect tables, indexes, constraints and sequences without
//! writing backend-specific DDL.
//!
//! # Architecture
//! - [`Database`] owns the connection and the [`Dialect`] chosen once from
//!   [`ConnectionConfig::backend`]
//! - [`SchemaManager`], [`Introspector`] and [`SequenceEmulator`] are
//!   borrowed views over a `Database`
//! - Portable column types are mapped to native types and validated in
//!   [`types`]; literals are quoted per type in [`quoting`]
//!
//! # Example
//! ```rust,no_run
//! use schemakit_core::models::{ColumnDefinition, PortableType, TableDefinition};
//! use schemakit_core::{ConnectionConfig, Database};
//!
//! # async fn example() -> schemakit_core::Result<()> {
//! let mut db = Database::new(ConnectionConfig::sqlite_memory())?;
//! db.connect(false).await?;
//!
//! let orders = TableDefinition::new("orders")
//!     .column("id", ColumnDefinition::integer(4).autoincrement())
//!     .column("total", ColumnDefinition::new(PortableType::Float).not_null())
//!     .primary_key(["id"]);
//! db.manager().create_table(&orders, false, false).await?;
//! assert!(db.manager().table_exists("orders").await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod dialect;
mod driver;
pub mod error;
pub mod logging;
pub mod models;
pub mod query_utils;
pub mod quoting;
pub mod schema;
pub mod sequence;
pub mod statement;
pub mod types;

// Re-export commonly used types
pub use config::{ConnectionConfig, Credentials};
pub use database::Database;
pub use dialect::{Dialect, MySqlDialect, SqliteDialect};
pub use driver::DriverError;
pub use error::{Result, SchemaKitError};
pub use logging::{LogFormat, init_logging};
pub use models::{
    CandidateDefinition, ColumnDefinition, ConstraintDefinition, ConstraintKind, DatabaseType,
    Feature, FieldValue, IndexDefinition, LockMode, PortableType, TableDefinition, TableLock,
    Value,
};
pub use query_utils::QueryUtils;
pub use quoting::{QuoteOptions, Quoter};
pub use schema::{
    ColumnChange, DefinitionAnalyzer, Introspector, SchemaManager, TableChange,
};
pub use sequence::SequenceEmulator;
pub use statement::{ResultSet, Row};
pub use types::NamingRules;
