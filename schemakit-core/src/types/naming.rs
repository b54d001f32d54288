//! Naming rules for tables, columns and indexes.
//!
//! Every DDL operation checks its names against these rules first, so
//! malformed or reserved names never reach the backend.

use crate::error::SchemaKitError;
use crate::Result;
use std::sync::OnceLock;

/// Name limits and reserved words of one dialect.
#[derive(Debug, Clone, Copy)]
pub struct NamingRules {
    /// Longest accepted table name
    pub max_table_name: usize,
    /// Longest accepted column name
    pub max_column_name: usize,
    /// Longest accepted logical index name
    pub max_index_name: usize,
    /// Longest accepted text column length
    pub max_text_length: u32,
    reserved: &'static [&'static str],
}

fn name_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[a-z][_a-z0-9]*$").expect("Invalid name pattern"))
}

impl NamingRules {
    /// Default limits with the given reserved word list.
    pub const fn new(reserved: &'static [&'static str]) -> Self {
        Self {
            max_table_name: 22,
            max_column_name: 30,
            max_index_name: 3,
            max_text_length: 4000,
            reserved,
        }
    }

    /// Case-insensitive reserved word lookup.
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved.iter().any(|r| r.eq_ignore_ascii_case(word))
    }

    /// Validates a table name.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Schema`] describing the first violated rule.
    pub fn check_table_name(&self, name: &str) -> Result<()> {
        self.check_name("table", name, self.max_table_name)
    }

    /// Validates a column name.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Schema`] describing the first violated rule.
    pub fn check_column_name(&self, name: &str) -> Result<()> {
        self.check_name("column", name, self.max_column_name)
    }

    /// Validates a logical index (or unique constraint) name.
    ///
    /// # Errors
    /// Returns [`SchemaKitError::Schema`] describing the first violated rule.
    pub fn check_index_name(&self, name: &str) -> Result<()> {
        self.check_name("index", name, self.max_index_name)
    }

    fn check_name(&self, kind: &str, name: &str, max_len: usize) -> Result<()> {
        if !name_pattern().is_match(name) {
            return Err(SchemaKitError::schema(format!(
                "Invalid {} name '{}': must only contain _a-z0-9 and must start with a-z",
                kind, name
            )));
        }
        if self.is_reserved(name) {
            return Err(SchemaKitError::schema(format!(
                "Invalid {} name '{}': {} is a reserved word",
                kind,
                name,
                name.to_ascii_uppercase()
            )));
        }
        if name.len() > max_len {
            return Err(SchemaKitError::schema(format!(
                "Invalid {} name '{}': max. {} characters",
                kind, name, max_len
            )));
        }
        Ok(())
    }
}
