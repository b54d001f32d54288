//! SQLite dialect.
//!
//! Index names are global in SQLite, so constraint and index names are
//! prefixed with the table name. Metadata comes from the `pragma_*`
//! table-valued functions.

use super::reserved::SQLITE_RESERVED;
use super::{Dialect, SequenceIncrement};
use crate::config::ConnectionConfig;
use crate::error::SchemaKitError;
use crate::models::{ColumnDefinition, DatabaseType, Feature, TableDefinition, TableLock};
use crate::schema::AlterAction;
use crate::statement::Row;
use crate::types::{NamingRules, NativeColumn};
use crate::Result;

static RULES: NamingRules = NamingRules::new(SQLITE_RESERVED);

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn unsupported(&self, what: &str) -> SchemaKitError {
        SchemaKitError::unsupported_feature(what, self.database_type().to_string())
    }
}

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::Transactions)
    }

    fn generate_dsn(&self, config: &ConnectionConfig) -> Result<String> {
        match config.database.as_deref() {
            None | Some(":memory:") => Ok("sqlite::memory:".to_string()),
            Some(path) => Ok(format!("sqlite://{}?mode=rwc", path)),
        }
    }

    fn rules(&self) -> &NamingRules {
        &RULES
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn native_type(&self, definition: &ColumnDefinition) -> String {
        if definition.autoincrement {
            // Only INTEGER PRIMARY KEY aliases the rowid.
            "INTEGER".to_string()
        } else {
            crate::types::native_type(definition)
        }
    }

    fn column_declaration(&self, name: &str, definition: &ColumnDefinition) -> String {
        let mut declaration = format!(
            "{} {}",
            self.quote_identifier(name),
            self.native_type(definition)
        );
        if definition.autoincrement {
            declaration.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if let Some(default) = self.default_literal(definition) {
            declaration.push_str(" DEFAULT ");
            declaration.push_str(&default);
        }
        if definition.not_null {
            declaration.push_str(" NOT NULL");
        }
        declaration
    }

    fn create_table_sql(&self, table: &TableDefinition) -> Result<String> {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|(name, definition)| self.column_declaration(name, definition))
            .collect();
        let primary_key = table.effective_primary_key();
        let autoincrement: Vec<&String> = table
            .columns
            .iter()
            .filter(|(_, d)| d.autoincrement)
            .map(|(n, _)| n)
            .collect();
        match autoincrement.as_slice() {
            [] => {
                if !primary_key.is_empty() {
                    parts.push(format!("PRIMARY KEY ({})", self.field_list(&primary_key)));
                }
            }
            [column] if primary_key.len() == 1 && primary_key[0] == **column => {}
            _ => {
                return Err(SchemaKitError::schema(format!(
                    "Table '{}': SQLite requires an autoincrement column to be the only primary key column",
                    table.name
                )));
            }
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        ))
    }

    fn alter_table_sql(&self, table: &str, action: &AlterAction) -> Result<String> {
        let quoted = self.quote_identifier(table);
        match action {
            AlterAction::AddColumn { definition, .. } if definition.autoincrement => {
                Err(self.unsupported("adding an autoincrement column"))
            }
            AlterAction::AddColumn { name, definition } => Ok(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quoted,
                self.column_declaration(name, definition)
            )),
            AlterAction::DropColumn { name } => Ok(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quoted,
                self.quote_identifier(name)
            )),
            AlterAction::RenameColumn { from, to, .. } => Ok(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quoted,
                self.quote_identifier(from),
                self.quote_identifier(to)
            )),
            AlterAction::ChangeColumn { .. } => Err(self.unsupported("changing a column definition")),
            AlterAction::RenameTable { to } => Ok(format!(
                "ALTER TABLE {} RENAME TO {}",
                quoted,
                self.quote_identifier(to)
            )),
        }
    }

    fn constraint_name(&self, table: &str, name: &str) -> String {
        format!("{}_{}", table, name)
    }

    fn logical_index_name(&self, table: &str, physical: &str) -> String {
        let without_suffix = physical.strip_suffix("_idx").unwrap_or(physical);
        without_suffix
            .strip_prefix(table)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(without_suffix)
            .to_string()
    }

    fn drop_index_sql(&self, _table: &str, physical: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(physical))
    }

    fn add_unique_sql(&self, table: &str, physical: &str, fields: &[String]) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.quote_identifier(physical),
            self.quote_identifier(table),
            self.field_list(fields)
        )
    }

    fn add_primary_key_sql(&self, _table: &str, _fields: &[String]) -> Result<String> {
        Err(self.unsupported("adding a primary key to an existing table"))
    }

    fn drop_primary_key_sql(&self, _table: &str) -> Result<String> {
        Err(self.unsupported("dropping a primary key"))
    }

    fn sequence_increment(&self, sequence_table: &str) -> SequenceIncrement {
        let table = self.quote_identifier(sequence_table);
        let column = self.quote_identifier("sequence");
        SequenceIncrement::Returning(format!(
            "UPDATE {table} SET {column} = {column} + 1 \
             WHERE {column} = (SELECT MAX({column}) FROM {table}) RETURNING {column} AS id"
        ))
    }

    fn last_insert_id_sql(&self) -> &'static str {
        "SELECT last_insert_rowid() AS id"
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> String {
        format!(" LIMIT {} OFFSET {}", limit, offset)
    }

    fn lock_tables_sql(&self, _locks: &[TableLock]) -> String {
        // SQLite only locks the whole database.
        "BEGIN IMMEDIATE".to_string()
    }

    fn unlock_tables_sql(&self) -> String {
        "COMMIT".to_string()
    }

    fn create_database_sql(
        &self,
        _name: &str,
        _charset: &str,
        _collation: Option<&str>,
    ) -> Result<String> {
        Err(self.unsupported("CREATE DATABASE"))
    }

    fn optimize_table_sql(&self, _table: &str) -> String {
        "VACUUM".to_string()
    }

    fn now(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("({})", parts.join(" || "))
    }

    fn locate(&self, needle: &str, haystack: &str, position: u64) -> String {
        if position <= 1 {
            return format!("INSTR({}, {})", haystack, needle);
        }
        let found = format!("INSTR(SUBSTR({}, {}), {})", haystack, position, needle);
        format!(
            "(CASE WHEN {found} = 0 THEN 0 ELSE {found} + {} END)",
            position.saturating_sub(1)
        )
    }

    fn list_tables_sql(&self) -> String {
        "SELECT name AS table_name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name"
            .to_string()
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) AS cnt FROM sqlite_master WHERE type = 'table' AND name = {}",
            self.quote_string(table)
        )
    }

    fn table_columns_sql(&self, table: &str) -> String {
        let table = self.quote_string(table);
        format!(
            "SELECT ti.name AS name, ti.type AS column_type, ti.\"notnull\" AS not_null, \
             ti.dflt_value AS column_default, ti.pk AS pk, \
             (SELECT sql FROM sqlite_master WHERE type = 'table' AND name = {table}) AS table_sql \
             FROM pragma_table_info({table}) AS ti ORDER BY ti.cid"
        )
    }

    fn parse_column_row(&self, row: &Row) -> Result<NativeColumn> {
        let name = row.require_text("name")?;
        let declared = row.get_text("column_type").unwrap_or_default();
        let mut column = NativeColumn::from_declared(name, &declared);
        column.nullable = row.get_i64("not_null").unwrap_or(0) == 0;
        column.default = row.get_text("column_default");
        column.primary = row.get_i64("pk").unwrap_or(0) > 0;
        column.autoincrement = column.primary
            && column.data_type == "integer"
            && row
                .get_text("table_sql")
                .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));
        Ok(column)
    }

    fn table_indexes_sql(&self, table: &str) -> String {
        format!(
            "SELECT il.name AS index_name, ii.name AS column_name, ii.seqno + 1 AS seq, \
             il.\"unique\" AS is_unique, il.origin AS origin \
             FROM pragma_index_list({}) AS il \
             JOIN pragma_index_info(il.name) AS ii \
             ORDER BY il.name, ii.seqno",
            self.quote_string(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortableType, Value};
    use std::sync::Arc;

    #[test]
    fn test_generate_dsn() {
        assert_eq!(
            SqliteDialect
                .generate_dsn(&ConnectionConfig::sqlite_memory())
                .unwrap(),
            "sqlite::memory:"
        );
        assert_eq!(
            SqliteDialect
                .generate_dsn(&ConnectionConfig::sqlite_file("/tmp/app.db"))
                .unwrap(),
            "sqlite:///tmp/app.db?mode=rwc"
        );
    }

    #[test]
    fn test_capabilities() {
        assert!(SqliteDialect.supports(Feature::Transactions));
        assert!(!SqliteDialect.supports(Feature::Fulltext));
        assert!(!SqliteDialect.supports(Feature::ReadReplica));
    }

    #[test]
    fn test_create_table_with_autoincrement() {
        let table = TableDefinition::new("orders")
            .column("id", ColumnDefinition::integer(4).autoincrement())
            .column("total", ColumnDefinition::new(PortableType::Float).not_null());
        assert_eq!(
            SqliteDialect.create_table_sql(&table).unwrap(),
            "CREATE TABLE \"orders\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             \"total\" DOUBLE NOT NULL)"
        );
    }

    #[test]
    fn test_create_table_composite_key() {
        let table = TableDefinition::new("link")
            .column("a", ColumnDefinition::integer(4).not_null())
            .column("b", ColumnDefinition::integer(4).not_null().with_default("0"))
            .primary_key(["a", "b"]);
        assert_eq!(
            SqliteDialect.create_table_sql(&table).unwrap(),
            "CREATE TABLE \"link\" (\"a\" INT NOT NULL, \"b\" INT DEFAULT 0 NOT NULL, \
             PRIMARY KEY (\"a\", \"b\"))"
        );

        let invalid = TableDefinition::new("t")
            .column("id", ColumnDefinition::integer(4).autoincrement())
            .column("b", ColumnDefinition::integer(4).not_null())
            .primary_key(["id", "b"]);
        assert!(SqliteDialect.create_table_sql(&invalid).is_err());
    }

    #[test]
    fn test_alter_table_sql() {
        let dialect = SqliteDialect;
        assert_eq!(
            dialect
                .alter_table_sql(
                    "t",
                    &AlterAction::RenameColumn {
                        from: "a".into(),
                        to: "b".into(),
                        definition: ColumnDefinition::text(5),
                    }
                )
                .unwrap(),
            "ALTER TABLE \"t\" RENAME COLUMN \"a\" TO \"b\""
        );
        assert!(matches!(
            dialect.alter_table_sql(
                "t",
                &AlterAction::ChangeColumn {
                    name: "a".into(),
                    definition: ColumnDefinition::text(5),
                }
            ),
            Err(SchemaKitError::UnsupportedFeature { .. })
        ));
        assert_eq!(
            dialect
                .alter_table_sql("t", &AlterAction::DropColumn { name: "a".into() })
                .unwrap(),
            "ALTER TABLE \"t\" DROP COLUMN \"a\""
        );
    }

    #[test]
    fn test_constraint_naming_is_table_scoped() {
        let dialect = SqliteDialect;
        let physical = dialect.index_name(&dialect.constraint_name("orders", "i1"));
        assert_eq!(physical, "orders_i1_idx");
        assert_eq!(dialect.logical_index_name("orders", &physical), "i1");
        assert_eq!(
            dialect.logical_index_name("orders", "sqlite_autoindex_orders_1"),
            "sqlite_autoindex_orders_1"
        );
    }

    #[test]
    fn test_statement_helpers() {
        let dialect = SqliteDialect;
        assert_eq!(dialect.limit_clause(10, 20), " LIMIT 10 OFFSET 20");
        assert_eq!(dialect.quote_string("it's"), "'it''s'");
        assert_eq!(dialect.lock_tables_sql(&[TableLock::write("t")]), "BEGIN IMMEDIATE");
        assert_eq!(dialect.concat(&["a".to_string(), "b".to_string()]), "(a || b)");
        assert_eq!(dialect.locate("'x'", "name", 1), "INSTR(name, 'x')");
        assert!(dialect.create_database_sql("x", "utf8", None).is_err());
        assert!(matches!(
            dialect.sequence_increment("t_seq"),
            SequenceIncrement::Returning(sql) if sql.ends_with("RETURNING \"sequence\" AS id")
        ));
    }

    #[test]
    fn test_parse_column_row() {
        let columns: Arc<[String]> = ["name", "column_type", "not_null", "column_default", "pk", "table_sql"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let row = Row::new(
            columns,
            vec![
                Value::from("id"),
                Value::from("INTEGER"),
                Value::from(1),
                Value::Null,
                Value::from(1),
                Value::from("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL)"),
            ],
        );
        let column = SqliteDialect.parse_column_row(&row).unwrap();
        assert!(column.autoincrement);
        assert!(column.primary);
        assert!(!column.nullable);
    }
}
