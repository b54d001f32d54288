//! Schema management and reverse engineering.
//!
//! [`SchemaManager`] applies changes, [`Introspector`] reads the live schema
//! back into the portable model, and [`DefinitionAnalyzer`] decides between
//! ambiguous reconstructions. Both views borrow the [`Database`](crate::Database)
//! mutably for their lifetime.

mod analyzer;
mod change;
mod manager;
mod reverse;

pub use analyzer::DefinitionAnalyzer;
pub use change::{AlterAction, ColumnChange, TableChange};
pub use manager::SchemaManager;
pub use reverse::Introspector;
