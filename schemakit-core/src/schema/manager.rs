//! Schema mutations: tables, columns, indexes, constraints and sequences.
//!
//! Names and definitions are validated before any DDL is sent unless the
//! caller opts out on `create_table`. Column renames and modifications start
//! from the live definition so attributes the caller does not restate are
//! kept.

use super::analyzer::DefinitionAnalyzer;
use super::change::{AlterAction, ColumnChange, TableChange};
use crate::database::Database;
use crate::error::SchemaKitError;
use crate::models::{ColumnDefinition, ConstraintDefinition, ConstraintKind, Feature, TableDefinition};
use crate::types;
use crate::Result;
use tracing::{debug, info, warn};

/// Borrowed schema management view over a [`Database`].
pub struct SchemaManager<'a> {
    db: &'a mut Database,
}

impl<'a> SchemaManager<'a> {
    pub(crate) fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Creates a table.
    ///
    /// With `drop_first` an existing table of the same name is dropped
    /// (best effort) before creation. `ignore_validation_errors` skips the
    /// name and definition checks.
    ///
    /// # Errors
    /// Returns a schema error for invalid names or definitions, or a query
    /// error when the backend rejects the DDL.
    pub async fn create_table(
        &mut self,
        table: &TableDefinition,
        drop_first: bool,
        ignore_validation_errors: bool,
    ) -> Result<()> {
        if !ignore_validation_errors {
            types::check_table_definition(table, self.db.dialect().rules())?;
        }
        if drop_first {
            self.drop_table(&table.name, false).await?;
        }
        let sql = self.db.dialect().create_table_sql(table)?;
        self.db.exec(&sql).await?;
        info!("Created table {} with {} columns", table.name, table.columns.len());
        Ok(())
    }

    /// Drops a table together with its emulated sequence.
    ///
    /// When the table does not exist and `error_if_missing` is false this is
    /// a no-op that returns `false`.
    ///
    /// # Errors
    /// Returns a query error from the backend; with `error_if_missing` this
    /// includes the does-not-exist failure.
    pub async fn drop_table(&mut self, table: &str, error_if_missing: bool) -> Result<bool> {
        if !error_if_missing && !self.table_exists(table).await? {
            warn!("Table {} does not exist, nothing to drop", table);
            return Ok(false);
        }
        let sql = self.db.dialect().drop_table_sql(table);
        self.db.exec(&sql).await?;
        info!("Dropped table {}", table);

        let mut sequences = self.db.sequences();
        if sequences.sequence_exists(table).await? {
            sequences.drop_sequence(table).await?;
        }
        Ok(true)
    }

    /// True when the table exists.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.db.reverse().table_exists(table).await
    }

    /// True when the table exists and has the column.
    ///
    /// # Errors
    /// Returns a query error when a metadata query fails.
    pub async fn table_column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        if !self.table_exists(table).await? {
            return Ok(false);
        }
        let columns = self.db.reverse().list_table_columns(table).await?;
        Ok(columns.iter().any(|c| c == column))
    }

    /// Applies one change to a table.
    ///
    /// Returns `false` without touching the backend when the table is
    /// missing and `error_if_missing` is false.
    ///
    /// # Errors
    /// Returns a schema error for a missing table (when requested), invalid
    /// names or an invalid resulting definition, an unsupported-feature
    /// error when the dialect cannot express the change, or a query error.
    pub async fn alter_table(
        &mut self,
        table: &str,
        change: TableChange,
        error_if_missing: bool,
    ) -> Result<bool> {
        if !self.table_exists(table).await? {
            if error_if_missing {
                return Err(SchemaKitError::schema(format!(
                    "Table '{}' does not exist",
                    table
                )));
            }
            warn!("Table {} does not exist, skipping alteration", table);
            return Ok(false);
        }

        let action = self.resolve_change(table, change).await?;
        let sql = self.db.dialect().alter_table_sql(table, &action)?;
        self.db.exec(&sql).await?;
        info!("Altered table {}: {:?}", table, action);
        Ok(true)
    }

    async fn resolve_change(&mut self, table: &str, change: TableChange) -> Result<AlterAction> {
        let rules = *self.db.dialect().rules();
        match change {
            TableChange::AddColumn { name, definition } => {
                rules.check_column_name(&name)?;
                types::check_column_definition(&definition, &rules)?;
                Ok(AlterAction::AddColumn { name, definition })
            }
            TableChange::RemoveColumn { name } => Ok(AlterAction::DropColumn { name }),
            TableChange::RenameColumn {
                from,
                to,
                definition,
            } => {
                rules.check_column_name(&to)?;
                let definition = match definition {
                    Some(definition) => definition,
                    None => self.current_definition(table, &from).await?,
                };
                types::check_column_definition(&definition, &rules)?;
                Ok(AlterAction::RenameColumn {
                    from,
                    to,
                    definition,
                })
            }
            TableChange::ChangeColumn { name, change } => {
                let current = self.current_definition(table, &name).await?;
                let definition = change.apply(&current);
                types::check_column_definition(&definition, &rules)?;
                Ok(AlterAction::ChangeColumn { name, definition })
            }
            TableChange::RenameTable { to } => {
                rules.check_table_name(&to)?;
                Ok(AlterAction::RenameTable { to })
            }
        }
    }

    /// Live definition of a column, reduced to what a definition may carry.
    async fn current_definition(&mut self, table: &str, column: &str) -> Result<ColumnDefinition> {
        let candidates = self
            .db
            .reverse()
            .get_table_field_definition(table, column)
            .await?;
        let analyzer = DefinitionAnalyzer::new(self.db.dialect());
        let best = analyzer.get_best_definition_alternative(&candidates)?;
        debug!(
            "Current definition of {}.{} is {:?} (native {})",
            table, column, best.definition, best.native_type
        );
        Ok(types::strip_disallowed(&best.definition))
    }

    /// Adds a column.
    ///
    /// # Errors
    /// As [`alter_table`](Self::alter_table) with a missing table reported.
    pub async fn add_table_column(
        &mut self,
        table: &str,
        column: &str,
        definition: ColumnDefinition,
    ) -> Result<()> {
        let change = TableChange::AddColumn {
            name: column.to_string(),
            definition,
        };
        self.alter_table(table, change, true).await.map(|_| ())
    }

    /// Drops a column.
    ///
    /// # Errors
    /// As [`alter_table`](Self::alter_table) with a missing table reported.
    pub async fn drop_table_column(&mut self, table: &str, column: &str) -> Result<()> {
        let change = TableChange::RemoveColumn {
            name: column.to_string(),
        };
        self.alter_table(table, change, true).await.map(|_| ())
    }

    /// Renames a column, keeping its current definition.
    ///
    /// # Errors
    /// As [`alter_table`](Self::alter_table) with a missing table reported.
    pub async fn rename_table_column(&mut self, table: &str, from: &str, to: &str) -> Result<()> {
        let change = TableChange::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
            definition: None,
        };
        self.alter_table(table, change, true).await.map(|_| ())
    }

    /// Merges `change` onto the current definition of a column.
    ///
    /// # Errors
    /// As [`alter_table`](Self::alter_table) with a missing table reported.
    pub async fn modify_table_column(
        &mut self,
        table: &str,
        column: &str,
        change: ColumnChange,
    ) -> Result<()> {
        let change = TableChange::ChangeColumn {
            name: column.to_string(),
            change,
        };
        self.alter_table(table, change, true).await.map(|_| ())
    }

    /// Renames a table.
    ///
    /// # Errors
    /// As [`alter_table`](Self::alter_table) with a missing table reported.
    pub async fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        let change = TableChange::RenameTable { to: to.to_string() };
        self.alter_table(from, change, true).await.map(|_| ())
    }

    /// Creates an index named `name` over `fields`.
    ///
    /// # Errors
    /// Returns a schema error for an invalid name or empty field list, an
    /// unsupported-feature error for fulltext indexes without backend
    /// support, or a query error.
    pub async fn create_index<S: AsRef<str>>(
        &mut self,
        table: &str,
        name: &str,
        fields: &[S],
        fulltext: bool,
    ) -> Result<()> {
        let dialect = self.db.dialect();
        dialect.rules().check_index_name(name)?;
        if fulltext {
            dialect.require(Feature::Fulltext)?;
        }
        let fields = field_list(table, fields)?;
        let physical = self.physical_index_name(table, name);
        let sql = self.db.dialect().create_index_sql(table, &physical, &fields);
        self.db.exec(&sql).await?;
        info!("Created index {} on {} ({})", physical, table, fields.join(", "));
        Ok(())
    }

    /// Drops the index named `name`.
    ///
    /// # Errors
    /// Returns a query error when the backend rejects the statement.
    pub async fn drop_index(&mut self, table: &str, name: &str) -> Result<()> {
        let physical = self.physical_index_name(table, name);
        let sql = self.db.dialect().drop_index_sql(table, &physical);
        self.db.exec(&sql).await?;
        info!("Dropped index {} on {}", physical, table);
        Ok(())
    }

    /// True when a plain index named `name` exists.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn index_exists(&mut self, table: &str, name: &str) -> Result<bool> {
        let indexes = self.db.reverse().list_table_indexes(table).await?;
        Ok(indexes.iter().any(|index| index == name))
    }

    /// True when a plain index has exactly `fields`, in order.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn index_exists_by_fields<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
    ) -> Result<bool> {
        Ok(self.find_by_fields(table, fields, false).await?.is_some())
    }

    /// Drops the first plain index whose ordered field list equals
    /// `fields`. Returns `false` when none matches.
    ///
    /// # Errors
    /// Returns a query error when a statement fails.
    pub async fn drop_index_by_fields<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
    ) -> Result<bool> {
        let Some(physical) = self.find_by_fields(table, fields, false).await? else {
            debug!("No index on {} matches the requested fields", table);
            return Ok(false);
        };
        let sql = self.db.dialect().drop_index_sql(table, &physical);
        self.db.exec(&sql).await?;
        info!("Dropped index {} on {}", physical, table);
        Ok(true)
    }

    /// Adds a primary key.
    ///
    /// # Errors
    /// Returns a schema error for an empty field list, an unsupported-feature
    /// error when the dialect cannot add keys later, or a query error.
    pub async fn add_primary_key<S: AsRef<str>>(&mut self, table: &str, fields: &[S]) -> Result<()> {
        let fields = field_list(table, fields)?;
        let sql = self.db.dialect().add_primary_key_sql(table, &fields)?;
        self.db.exec(&sql).await?;
        info!("Added primary key on {} ({})", table, fields.join(", "));
        Ok(())
    }

    /// Drops the primary key.
    ///
    /// # Errors
    /// Returns an unsupported-feature error when the dialect cannot drop
    /// keys, or a query error.
    pub async fn drop_primary_key(&mut self, table: &str) -> Result<()> {
        let sql = self.db.dialect().drop_primary_key_sql(table)?;
        self.db.exec(&sql).await?;
        info!("Dropped primary key on {}", table);
        Ok(())
    }

    /// Adds a unique constraint named `name` over `fields`.
    ///
    /// # Errors
    /// Returns a schema error for an invalid name or empty field list, or a
    /// query error.
    pub async fn add_unique_constraint<S: AsRef<str>>(
        &mut self,
        table: &str,
        name: &str,
        fields: &[S],
    ) -> Result<()> {
        self.db.dialect().rules().check_index_name(name)?;
        let fields = field_list(table, fields)?;
        let physical = self.physical_index_name(table, name);
        let sql = self.db.dialect().add_unique_sql(table, &physical, &fields);
        self.db.exec(&sql).await?;
        info!(
            "Added unique constraint {} on {} ({})",
            physical,
            table,
            fields.join(", ")
        );
        Ok(())
    }

    /// Drops the unique constraint named `name`.
    ///
    /// # Errors
    /// Returns a query error when the backend rejects the statement.
    pub async fn drop_unique_constraint(&mut self, table: &str, name: &str) -> Result<()> {
        let physical = self.physical_index_name(table, name);
        let sql = self.db.dialect().drop_index_sql(table, &physical);
        self.db.exec(&sql).await?;
        info!("Dropped unique constraint {} on {}", physical, table);
        Ok(())
    }

    /// True when a unique constraint has exactly `fields`, in order.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn unique_constraint_exists<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
    ) -> Result<bool> {
        Ok(self.find_by_fields(table, fields, true).await?.is_some())
    }

    /// Drops the first unique constraint whose ordered field list equals
    /// `fields`. Returns `false` when none matches.
    ///
    /// # Errors
    /// Returns a query error when a statement fails.
    pub async fn drop_unique_constraint_by_fields<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
    ) -> Result<bool> {
        let Some(physical) = self.find_by_fields(table, fields, true).await? else {
            debug!("No unique constraint on {} matches the requested fields", table);
            return Ok(false);
        };
        let sql = self.db.dialect().drop_index_sql(table, &physical);
        self.db.exec(&sql).await?;
        info!("Dropped unique constraint {} on {}", physical, table);
        Ok(true)
    }

    /// Creates a primary key or unique constraint.
    ///
    /// # Errors
    /// As [`add_primary_key`](Self::add_primary_key) or
    /// [`add_unique_constraint`](Self::add_unique_constraint).
    pub async fn create_constraint(
        &mut self,
        table: &str,
        constraint: &ConstraintDefinition,
    ) -> Result<()> {
        match constraint.kind {
            ConstraintKind::PrimaryKey => self.add_primary_key(table, constraint.fields.as_slice()).await,
            ConstraintKind::Unique => {
                self.add_unique_constraint(table, &constraint.name, constraint.fields.as_slice())
                    .await
            }
        }
    }

    /// Creates the emulated sequence of `table`.
    ///
    /// # Errors
    /// As [`SequenceEmulator::create_sequence`](crate::SequenceEmulator::create_sequence).
    pub async fn create_sequence(&mut self, table: &str, start: i64) -> Result<()> {
        self.db.sequences().create_sequence(table, start).await
    }

    /// Drops the emulated sequence of `table`.
    ///
    /// # Errors
    /// As [`SequenceEmulator::drop_sequence`](crate::SequenceEmulator::drop_sequence).
    pub async fn drop_sequence(&mut self, table: &str) -> Result<()> {
        self.db.sequences().drop_sequence(table).await
    }

    /// Physical name of the index or unique constraint `name` on `table`.
    pub fn physical_index_name(&self, table: &str, name: &str) -> String {
        let dialect = self.db.dialect();
        dialect.index_name(&dialect.constraint_name(table, name))
    }

    async fn find_by_fields<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
        unique: bool,
    ) -> Result<Option<String>> {
        let entries = self.db.reverse().index_entries(table).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.primary && entry.unique == unique)
            .find(|entry| {
                entry.fields.len() == fields.len()
                    && entry
                        .fields
                        .iter()
                        .zip(fields)
                        .all(|(have, want)| have == want.as_ref())
            })
            .map(|entry| entry.physical))
    }
}

fn field_list<S: AsRef<str>>(table: &str, fields: &[S]) -> Result<Vec<String>> {
    if fields.is_empty() {
        return Err(SchemaKitError::schema(format!(
            "No fields given for index or constraint on '{}'",
            table
        )));
    }
    Ok(fields.iter().map(|f| f.as_ref().to_string()).collect())
}
