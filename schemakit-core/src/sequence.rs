//! Sequence emulation.
//!
//! Backends without native sequences keep one counter table per sequence,
//! named `<table>_seq` with a single `sequence` column. Advancing the
//! counter is a single atomic statement (or an update plus a same-connection
//! read of the value it produced), so concurrent callers never receive the
//! same identifier.

use crate::database::Database;
use crate::dialect::SequenceIncrement;
use crate::error::SchemaKitError;
use crate::Result;
use tracing::{debug, info, warn};

/// Borrowed sequence view over a [`Database`].
pub struct SequenceEmulator<'a> {
    db: &'a mut Database,
}

impl<'a> SequenceEmulator<'a> {
    pub(crate) fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Creates the counter table of `table` so that the first
    /// [`next_id`](Self::next_id) returns `start`.
    ///
    /// # Errors
    /// Returns a schema error for an invalid table name or a start below 1,
    /// or a query error.
    pub async fn create_sequence(&mut self, table: &str, start: i64) -> Result<()> {
        self.db.dialect().rules().check_table_name(table)?;
        if start < 1 {
            return Err(SchemaKitError::schema(format!(
                "Sequence start for '{}' must be at least 1, got {}",
                table, start
            )));
        }
        let sequence_table = self.db.dialect().sequence_table_name(table);
        let statements = self
            .db
            .dialect()
            .create_sequence_sql(&sequence_table, start);
        for sql in &statements {
            self.db.exec(sql).await?;
        }
        info!("Created sequence {} starting at {}", sequence_table, start);
        Ok(())
    }

    /// Drops the counter table of `table`.
    ///
    /// # Errors
    /// Returns a query error when the table does not exist.
    pub async fn drop_sequence(&mut self, table: &str) -> Result<()> {
        let sequence_table = self.db.dialect().sequence_table_name(table);
        let sql = self.db.dialect().drop_table_sql(&sequence_table);
        self.db.exec(&sql).await?;
        info!("Dropped sequence {}", sequence_table);
        Ok(())
    }

    /// True when `table` has a counter table.
    ///
    /// # Errors
    /// Returns a query error when the metadata query fails.
    pub async fn sequence_exists(&mut self, table: &str) -> Result<bool> {
        self.db.reverse().sequence_exists(table).await
    }

    /// Next identifier for `table`.
    ///
    /// With a counter table the counter is advanced atomically; an empty
    /// counter yields 1. Without one, the connection's last generated
    /// identifier plus one is returned, which is not safe with concurrent
    /// writers.
    ///
    /// # Errors
    /// Returns a query error when a statement fails.
    pub async fn next_id(&mut self, table: &str) -> Result<i64> {
        if self.sequence_exists(table).await? {
            let sequence_table = self.db.dialect().sequence_table_name(table);
            return self.next_emulated(&sequence_table).await;
        }

        warn!(
            "Table {} has no sequence table; using last insert id + 1, which is unsafe with concurrent writers",
            table
        );
        let sql = self.db.dialect().last_insert_id_sql();
        let rows = self.db.fetch_rows(sql).await?;
        let last = rows
            .first()
            .and_then(|row| row.get_i64("id"))
            .unwrap_or(0);
        Ok(last.saturating_add(1))
    }

    async fn next_emulated(&mut self, sequence_table: &str) -> Result<i64> {
        if let Some(id) = self.increment(sequence_table).await? {
            return Ok(id);
        }

        // Empty counter: the first id is 1
        let seed = self.db.dialect().sequence_seed_sql(sequence_table, 1);
        let seeded = self.db.exec(&seed).await;
        match seeded {
            Ok(_) => {
                debug!("Seeded sequence {}", sequence_table);
                Ok(1)
            }
            Err(SchemaKitError::Query { message, .. }) => {
                // Another writer seeded first; its row is there now
                debug!("Seeding {} lost a race ({}), retrying", sequence_table, message);
                self.increment(sequence_table).await?.ok_or_else(|| {
                    SchemaKitError::schema(format!(
                        "Sequence table '{}' is still empty after seeding",
                        sequence_table
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Advances the counter; `None` when the counter table has no row.
    async fn increment(&mut self, sequence_table: &str) -> Result<Option<i64>> {
        let statements = self.db.dialect().sequence_increment(sequence_table);
        match statements {
            SequenceIncrement::Returning(sql) => {
                let rows = self.db.fetch_rows(&sql).await?;
                Ok(rows.first().and_then(|row| row.get_i64("id")))
            }
            SequenceIncrement::UpdateThenSelect { update, select } => {
                if self.db.exec(&update).await? == 0 {
                    return Ok(None);
                }
                let rows = self.db.fetch_rows(&select).await?;
                Ok(rows.first().and_then(|row| row.get_i64("id")))
            }
        }
    }
}
