//! Reverse engineering of live schema into the portable model.

use super::analyzer::DefinitionAnalyzer;
use crate::database::Database;
use crate::error::SchemaKitError;
use crate::models::{
    CandidateDefinition, ConstraintDefinition, ConstraintKind, IndexDefinition, TableDefinition,
};
use crate::statement::Row;
use crate::types::{self, NativeColumn};
use crate::Result;
use tracing::debug;

/// One physical index as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub physical: String,
    pub fields: Vec<String>,
    pub unique: bool,
    pub primary: bool,
    pub fulltext: bool,
}

/// Borrowed introspection view over a [`Database`].
pub struct Introspector<'a> {
    db: &'a mut Database,
}

impl<'a> Introspector<'a> {
    pub(crate) fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Base tables, without sequence counter tables.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let suffix = self.db.dialect().sequence_table_name("");
        Ok(self
            .all_tables()
            .await?
            .into_iter()
            .filter(|name| !name.ends_with(&suffix))
            .collect())
    }

    /// Tables that have an emulated sequence, by table name.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn list_sequences(&mut self) -> Result<Vec<String>> {
        let suffix = self.db.dialect().sequence_table_name("");
        Ok(self
            .all_tables()
            .await?
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// True when `table` has an emulated sequence.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn sequence_exists(&mut self, table: &str) -> Result<bool> {
        let sequence_table = self.db.dialect().sequence_table_name(table);
        self.table_exists(&sequence_table).await
    }

    /// True when a base table named `table` exists.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let sql = self.db.dialect().table_exists_sql(table);
        let rows = self.db.fetch_rows(&sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_i64("cnt"))
            .is_some_and(|count| count > 0))
    }

    /// Column names of `table` in ordinal order.
    ///
    /// # Errors
    /// Returns a schema error when the table does not exist.
    pub async fn list_table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .native_columns(table)
            .await?
            .into_iter()
            .map(|column| column.name)
            .collect())
    }

    /// Logical names of the plain (non-unique, non-primary) indexes.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn list_table_indexes(&mut self, table: &str) -> Result<Vec<String>> {
        let entries = self.index_entries(table).await?;
        let dialect = self.db.dialect();
        Ok(entries
            .iter()
            .filter(|entry| !entry.unique && !entry.primary)
            .map(|entry| dialect.logical_index_name(table, &entry.physical))
            .collect())
    }

    /// Primary key identifier (when the table has one) followed by the
    /// logical names of its unique constraints.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn list_table_constraints(&mut self, table: &str) -> Result<Vec<String>> {
        let mut constraints = Vec::new();
        if !self.primary_key_fields(table).await?.is_empty() {
            constraints.push(self.db.dialect().primary_key_identifier().to_string());
        }
        let entries = self.index_entries(table).await?;
        let dialect = self.db.dialect();
        constraints.extend(
            entries
                .iter()
                .filter(|entry| entry.unique && !entry.primary)
                .map(|entry| dialect.logical_index_name(table, &entry.physical)),
        );
        Ok(constraints)
    }

    /// Every plausible portable reconstruction of one column.
    ///
    /// # Errors
    /// Returns a schema error when the table or column does not exist or the
    /// native type has no portable counterpart.
    pub async fn get_table_field_definition(
        &mut self,
        table: &str,
        column: &str,
    ) -> Result<Vec<CandidateDefinition>> {
        let columns = self.native_columns(table).await?;
        let native = columns
            .iter()
            .find(|c| c.name == column)
            .or_else(|| columns.iter().find(|c| c.name.eq_ignore_ascii_case(column)))
            .ok_or_else(|| {
                SchemaKitError::schema(format!(
                    "Column '{}' does not exist in table '{}'",
                    column, table
                ))
            })?;
        debug!(
            "Column {}.{} has native type {}",
            table,
            native.name,
            native.native_type()
        );
        types::candidate_definitions(native)
    }

    /// Field list and uniqueness of a plain index, by logical or physical
    /// name.
    ///
    /// # Errors
    /// Returns a schema error when no such index exists.
    pub async fn get_table_index_definition(
        &mut self,
        table: &str,
        index: &str,
    ) -> Result<IndexDefinition> {
        let entries = self.index_entries(table).await?;
        let dialect = self.db.dialect();
        entries
            .into_iter()
            .filter(|entry| !entry.unique && !entry.primary)
            .find(|entry| {
                entry.physical == index || dialect.logical_index_name(table, &entry.physical) == index
            })
            .map(|entry| IndexDefinition {
                name: dialect.logical_index_name(table, &entry.physical),
                fields: entry.fields,
                unique: entry.unique,
                fulltext: entry.fulltext,
            })
            .ok_or_else(|| {
                SchemaKitError::schema(format!(
                    "Index '{}' does not exist on table '{}'",
                    index, table
                ))
            })
    }

    /// Field list of the primary key (by its identifier) or of a unique
    /// constraint.
    ///
    /// # Errors
    /// Returns a schema error when no such constraint exists.
    pub async fn get_table_constraint_definition(
        &mut self,
        table: &str,
        constraint: &str,
    ) -> Result<ConstraintDefinition> {
        let primary_identifier = self.db.dialect().primary_key_identifier();
        if constraint.eq_ignore_ascii_case(primary_identifier) {
            let fields = self.primary_key_fields(table).await?;
            if fields.is_empty() {
                return Err(SchemaKitError::schema(format!(
                    "Table '{}' has no primary key",
                    table
                )));
            }
            return Ok(ConstraintDefinition {
                name: primary_identifier.to_string(),
                kind: ConstraintKind::PrimaryKey,
                fields,
            });
        }

        let entries = self.index_entries(table).await?;
        let dialect = self.db.dialect();
        entries
            .into_iter()
            .filter(|entry| entry.unique && !entry.primary)
            .find(|entry| {
                entry.physical == constraint
                    || dialect.logical_index_name(table, &entry.physical) == constraint
            })
            .map(|entry| ConstraintDefinition {
                name: dialect.logical_index_name(table, &entry.physical),
                kind: ConstraintKind::Unique,
                fields: entry.fields,
            })
            .ok_or_else(|| {
                SchemaKitError::schema(format!(
                    "Constraint '{}' does not exist on table '{}'",
                    constraint, table
                ))
            })
    }

    /// Full portable definition of a table: the analyzer's best candidate
    /// for every column plus the primary key.
    ///
    /// # Errors
    /// Returns a schema error when the table does not exist or a column has
    /// no portable counterpart.
    pub async fn get_table_definition(&mut self, table: &str) -> Result<TableDefinition> {
        let columns = self.native_columns(table).await?;
        let primary_key = self.primary_key_fields(table).await?;
        let analyzer = DefinitionAnalyzer::new(self.db.dialect());
        let mut definition = TableDefinition::new(table).primary_key(primary_key);
        for column in &columns {
            let candidates = types::candidate_definitions(column)?;
            let best = analyzer.get_best_definition_alternative(&candidates)?;
            definition = definition.column(column.name.clone(), best.definition.clone());
        }
        Ok(definition)
    }

    pub(crate) async fn native_columns(&mut self, table: &str) -> Result<Vec<NativeColumn>> {
        let sql = self.db.dialect().table_columns_sql(table);
        let rows = self.db.fetch_rows(&sql).await?;
        if rows.is_empty() {
            return Err(SchemaKitError::schema(format!(
                "Table '{}' does not exist",
                table
            )));
        }
        let dialect = self.db.dialect();
        rows.iter().map(|row| dialect.parse_column_row(row)).collect()
    }

    /// Physical indexes of `table` with ordered field lists, in name order.
    pub(crate) async fn index_entries(&mut self, table: &str) -> Result<Vec<IndexEntry>> {
        let sql = self.db.dialect().table_indexes_sql(table);
        let rows = self.db.fetch_rows(&sql).await?;
        group_index_rows(&rows)
    }

    /// Primary key columns in key order.
    pub(crate) async fn primary_key_fields(&mut self, table: &str) -> Result<Vec<String>> {
        let entries = self.index_entries(table).await?;
        if let Some(primary) = entries.into_iter().find(|entry| entry.primary) {
            return Ok(primary.fields);
        }
        // SQLite rowid aliases have no backing index
        Ok(self
            .native_columns(table)
            .await?
            .into_iter()
            .filter(|column| column.primary)
            .map(|column| column.name)
            .collect())
    }

    async fn all_tables(&mut self) -> Result<Vec<String>> {
        let sql = self.db.dialect().list_tables_sql();
        let rows = self.db.fetch_rows(&sql).await?;
        rows.iter().map(|row| row.require_text("table_name")).collect()
    }
}

/// Groups per-column index rows into indexes, ordering fields by `seq`.
pub(crate) fn group_index_rows(rows: &[Row]) -> Result<Vec<IndexEntry>> {
    let mut grouped: Vec<(IndexEntry, Vec<(i64, String)>)> = Vec::new();
    for row in rows {
        let physical = row.require_text("index_name")?;
        let column = row.require_text("column_name")?;
        let seq = row.get_i64("seq").unwrap_or(0);
        let origin = row.get_text("origin").unwrap_or_default();
        let position = match grouped.iter().position(|(entry, _)| entry.physical == physical) {
            Some(position) => position,
            None => {
                grouped.push((
                    IndexEntry {
                        physical,
                        fields: Vec::new(),
                        unique: row.get_i64("is_unique").unwrap_or(0) != 0,
                        primary: origin == "pk",
                        fulltext: origin == "ft",
                    },
                    Vec::new(),
                ));
                grouped.len().saturating_sub(1)
            }
        };
        if let Some((_, fields)) = grouped.get_mut(position) {
            fields.push((seq, column));
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(mut entry, mut fields)| {
            fields.sort_by_key(|(seq, _)| *seq);
            entry.fields = fields.into_iter().map(|(_, column)| column).collect();
            entry
        })
        .collect())
}
