//! JSON rendering of command results.

use anyhow::{Context, Result};
use schemakit_core::{ConstraintDefinition, Database, IndexDefinition};
use serde::Serialize;
use tracing::info;

/// Indexes and constraints of one table.
#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub table: String,
    pub indexes: Vec<IndexDefinition>,
    pub constraints: Vec<ConstraintDefinition>,
}

impl IndexReport {
    /// Reads every plain index and constraint of `table`.
    pub async fn collect(db: &mut Database, table: &str) -> Result<Self> {
        let mut reverse = db.reverse();
        let mut indexes = Vec::new();
        for name in reverse.list_table_indexes(table).await? {
            indexes.push(reverse.get_table_index_definition(table, &name).await?);
        }
        let mut constraints = Vec::new();
        for name in reverse.list_table_constraints(table).await? {
            constraints.push(reverse.get_table_constraint_definition(table, &name).await?);
        }
        info!(
            "Found {} indexes and {} constraints on {}",
            indexes.len(),
            constraints.len(),
            table
        );
        Ok(Self {
            table: table.to_string(),
            indexes,
            constraints,
        })
    }
}

/// Pretty-prints `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemakit_core::{ColumnDefinition, ConnectionConfig, TableDefinition};

    #[tokio::test]
    async fn test_index_report() {
        let mut db = Database::new(ConnectionConfig::sqlite_memory()).expect("database");
        db.connect(false).await.expect("connect");
        let table = TableDefinition::new("tags")
            .column("id", ColumnDefinition::integer(4).not_null())
            .column("label", ColumnDefinition::text(30))
            .primary_key(["id"]);
        db.manager()
            .create_table(&table, false, false)
            .await
            .expect("create table");
        db.manager()
            .create_index("tags", "lbl", &["label"], false)
            .await
            .expect("create index");

        let report = IndexReport::collect(&mut db, "tags").await.expect("report");
        assert_eq!(report.indexes.len(), 1);
        assert_eq!(report.indexes[0].name, "lbl");
        assert_eq!(report.constraints.len(), 1);
        assert_eq!(report.constraints[0].fields, vec!["id".to_string()]);

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["table"], "tags");
    }
}
