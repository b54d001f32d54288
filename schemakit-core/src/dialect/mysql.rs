//! MySQL dialect (the reference dialect).
//!
//! Metadata comes from `information_schema`. Name columns are wrapped in
//! `CAST(... AS CHAR)` because MySQL 8 reports them as VARBINARY.

use super::reserved::MYSQL_RESERVED;
use super::{Dialect, SequenceIncrement};
use crate::config::ConnectionConfig;
use crate::error::SchemaKitError;
use crate::models::{ColumnDefinition, DatabaseType, Feature, LockMode, TableDefinition, TableLock};
use crate::schema::AlterAction;
use crate::statement::Row;
use crate::types::{NamingRules, NativeColumn};
use crate::Result;

static RULES: NamingRules = NamingRules::new(MYSQL_RESERVED);

/// Session setup run on every new MySQL connection.
///
/// String literals are quoted by doubling `'` only, which is unambiguous
/// once backslash escapes are off.
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
pub(crate) const SESSION_SQL_MODE: &str =
    "SET SESSION sql_mode = CONCAT_WS(',', @@SESSION.sql_mode, 'NO_BACKSLASH_ESCAPES')";

/// MySQL / MariaDB dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::Transactions | Feature::Fulltext | Feature::ReadReplica => false,
        }
    }

    fn generate_dsn(&self, config: &ConnectionConfig) -> Result<String> {
        let port = config
            .effective_port()
            .unwrap_or(3306);
        let mut dsn = format!("mysql://{}:{}", config.host, port);
        if let Some(database) = &config.database {
            dsn.push('/');
            dsn.push_str(database);
        }
        dsn.push_str("?charset=");
        dsn.push_str(&config.charset);

        url::Url::parse(&dsn).map_err(|e| {
            SchemaKitError::connection_failed(format!("Malformed MySQL DSN for {}", config), None, e)
        })?;
        Ok(dsn)
    }

    fn rules(&self) -> &NamingRules {
        &RULES
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn quote_string(&self, value: &str) -> String {
        // Backslashes stay literal: connections run with NO_BACKSLASH_ESCAPES.
        format!("'{}'", value.replace('\'', "''"))
    }

    fn column_declaration(&self, name: &str, definition: &ColumnDefinition) -> String {
        let mut declaration = format!(
            "{} {}",
            self.quote_identifier(name),
            self.native_type(definition)
        );
        if let Some(default) = self.default_literal(definition) {
            declaration.push_str(" DEFAULT ");
            declaration.push_str(&default);
        }
        declaration.push_str(if definition.not_null {
            " NOT NULL"
        } else {
            " NULL"
        });
        if definition.autoincrement {
            declaration.push_str(" AUTO_INCREMENT");
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
        if !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.field_list(&primary_key)));
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        ))
    }

    fn alter_table_sql(&self, table: &str, action: &AlterAction) -> Result<String> {
        let table = self.quote_identifier(table);
        Ok(match action {
            AlterAction::AddColumn { name, definition } => format!(
                "ALTER TABLE {} ADD {}",
                table,
                self.column_declaration(name, definition)
            ),
            AlterAction::DropColumn { name } => {
                format!("ALTER TABLE {} DROP {}", table, self.quote_identifier(name))
            }
            AlterAction::RenameColumn {
                from,
                to,
                definition,
            } => format!(
                "ALTER TABLE {} CHANGE {} {}",
                table,
                self.quote_identifier(from),
                self.column_declaration(to, definition)
            ),
            AlterAction::ChangeColumn { name, definition } => format!(
                "ALTER TABLE {} CHANGE {} {}",
                table,
                self.quote_identifier(name),
                self.column_declaration(name, definition)
            ),
            AlterAction::RenameTable { to } => format!(
                "ALTER TABLE {} RENAME TO {}",
                table,
                self.quote_identifier(to)
            ),
        })
    }

    fn drop_index_sql(&self, table: &str, physical: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {}",
            self.quote_identifier(table),
            self.quote_identifier(physical)
        )
    }

    fn add_unique_sql(&self, table: &str, physical: &str, fields: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD UNIQUE {} ({})",
            self.quote_identifier(table),
            self.quote_identifier(physical),
            self.field_list(fields)
        )
    }

    fn add_primary_key_sql(&self, table: &str, fields: &[String]) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.quote_identifier(table),
            self.field_list(fields)
        ))
    }

    fn drop_primary_key_sql(&self, table: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.quote_identifier(table)
        ))
    }

    fn sequence_increment(&self, sequence_table: &str) -> SequenceIncrement {
        let column = self.quote_identifier("sequence");
        SequenceIncrement::UpdateThenSelect {
            update: format!(
                "UPDATE {} SET {} = LAST_INSERT_ID({} + 1) ORDER BY {} DESC LIMIT 1",
                self.quote_identifier(sequence_table),
                column,
                column,
                column
            ),
            select: "SELECT LAST_INSERT_ID() AS id".to_string(),
        }
    }

    fn last_insert_id_sql(&self) -> &'static str {
        "SELECT LAST_INSERT_ID() AS id"
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> String {
        format!(" LIMIT {}, {}", offset, limit)
    }

    fn lock_tables_sql(&self, locks: &[TableLock]) -> String {
        let parts: Vec<String> = locks
            .iter()
            .map(|lock| {
                let mut part = self.quote_identifier(&lock.table);
                if let Some(alias) = &lock.alias {
                    part.push_str(" AS ");
                    part.push_str(&self.quote_identifier(alias));
                }
                part.push_str(match lock.mode {
                    LockMode::Read => " READ",
                    LockMode::Write => " WRITE",
                });
                part
            })
            .collect();
        format!("LOCK TABLES {}", parts.join(", "))
    }

    fn unlock_tables_sql(&self) -> String {
        "UNLOCK TABLES".to_string()
    }

    fn create_database_sql(
        &self,
        name: &str,
        charset: &str,
        collation: Option<&str>,
    ) -> Result<String> {
        let mut sql = format!(
            "CREATE DATABASE {} CHARACTER SET {}",
            self.quote_identifier(name),
            charset
        );
        if let Some(collation) = collation.filter(|c| !c.is_empty()) {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        Ok(sql)
    }

    fn optimize_table_sql(&self, table: &str) -> String {
        format!("OPTIMIZE TABLE {}", self.quote_identifier(table))
    }

    fn now(&self) -> &'static str {
        "NOW()"
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn locate(&self, needle: &str, haystack: &str, position: u64) -> String {
        format!("LOCATE({}, {}, {})", needle, haystack, position)
    }

    fn list_tables_sql(&self) -> String {
        "SELECT CAST(TABLE_NAME AS CHAR) AS table_name FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
            .to_string()
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) AS cnt FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
            self.quote_string(table)
        )
    }

    fn table_columns_sql(&self, table: &str) -> String {
        format!(
            "SELECT CAST(COLUMN_NAME AS CHAR) AS name, \
             CAST(COLUMN_TYPE AS CHAR) AS column_type, \
             CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
             CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
             CAST(EXTRA AS CHAR) AS extra, \
             CAST(COLUMN_KEY AS CHAR) AS column_key \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            self.quote_string(table)
        )
    }

    fn parse_column_row(&self, row: &Row) -> Result<NativeColumn> {
        let name = row.require_text("name")?;
        let declared = row.require_text("column_type")?;
        let mut column = NativeColumn::from_declared(name, &declared);
        column.nullable = row
            .get_text("is_nullable")
            .is_some_and(|v| v.eq_ignore_ascii_case("YES"));
        column.default = row.get_text("column_default");
        column.autoincrement = row
            .get_text("extra")
            .is_some_and(|v| v.to_ascii_lowercase().contains("auto_increment"));
        column.primary = row
            .get_text("column_key")
            .is_some_and(|v| v.eq_ignore_ascii_case("PRI"));
        Ok(column)
    }

    fn table_indexes_sql(&self, table: &str) -> String {
        format!(
            "SELECT CAST(INDEX_NAME AS CHAR) AS index_name, \
             CAST(COLUMN_NAME AS CHAR) AS column_name, \
             SEQ_IN_INDEX AS seq, \
             CASE WHEN NON_UNIQUE = 0 THEN 1 ELSE 0 END AS is_unique, \
             CAST(CASE WHEN INDEX_NAME = 'PRIMARY' THEN 'pk' \
             WHEN INDEX_TYPE = 'FULLTEXT' THEN 'ft' ELSE 'c' END AS CHAR) AS origin \
             FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} \
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
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
        let config = ConnectionConfig::new(DatabaseType::MySQL, "db.local").with_database("ilias");
        assert_eq!(
            MySqlDialect.generate_dsn(&config).unwrap(),
            "mysql://db.local:3306/ilias?charset=utf8"
        );

        let config = ConnectionConfig::new(DatabaseType::MySQL, "db.local")
            .with_port(3307)
            .with_charset("utf8mb4");
        assert_eq!(
            MySqlDialect.generate_dsn(&config).unwrap(),
            "mysql://db.local:3307?charset=utf8mb4"
        );
    }

    #[test]
    fn test_generate_dsn_rejects_bad_host() {
        let config = ConnectionConfig::new(DatabaseType::MySQL, "bad host");
        let err = MySqlDialect.generate_dsn(&config).unwrap_err();
        assert!(matches!(err, SchemaKitError::Connection { .. }));
        assert!(err.to_string().contains("Malformed MySQL DSN"));
    }

    #[test]
    fn test_capabilities() {
        assert!(!MySqlDialect.supports(Feature::Transactions));
        assert!(!MySqlDialect.supports(Feature::Fulltext));
        assert!(!MySqlDialect.supports(Feature::ReadReplica));
    }

    /// Scans a string literal starting at the first byte of `sql`; returns
    /// the decoded value and the byte offset just past the closing quote.
    fn scan_literal(sql: &str, backslash_escapes: bool) -> Option<(String, usize)> {
        let mut chars = sql.char_indices().peekable();
        if chars.next()?.1 != '\'' {
            return None;
        }
        let mut value = String::new();
        while let Some((index, c)) = chars.next() {
            match c {
                '\\' if backslash_escapes => value.push(chars.next()?.1),
                '\'' => {
                    if chars.peek().is_some_and(|(_, next)| *next == '\'') {
                        chars.next();
                        value.push('\'');
                    } else {
                        return Some((value, index + 1));
                    }
                }
                other => value.push(other),
            }
        }
        None
    }

    #[test]
    fn test_quote_string_doubles_quotes() {
        assert_eq!(MySqlDialect.quote_string("it's"), "'it''s'");
        assert_eq!(MySqlDialect.quote_string("a'b\\c"), "'a''b\\c'");
        assert_eq!(MySqlDialect.quote_string(""), "''");
    }

    #[test]
    fn test_quoted_literal_ends_where_it_should_in_both_modes() {
        let quoted = MySqlDialect.quote_string("a'b\\c");
        let statement = format!("{} OR 1=1", quoted);

        let (value, end) = scan_literal(&statement, false).unwrap();
        assert_eq!(value, "a'b\\c");
        assert_eq!(end, quoted.len());

        // Even with backslash escapes on, the literal does not run past its
        // closing quote.
        let (_, end) = scan_literal(&statement, true).unwrap();
        assert_eq!(end, quoted.len());
    }

    #[test]
    fn test_session_disables_backslash_escapes() {
        assert!(SESSION_SQL_MODE.starts_with("SET SESSION sql_mode"));
        assert!(SESSION_SQL_MODE.contains("NO_BACKSLASH_ESCAPES"));
        assert!(SESSION_SQL_MODE.contains("@@SESSION.sql_mode"));
    }

    #[test]
    fn test_create_table_sql() {
        let table = TableDefinition::new("orders")
            .column("id", ColumnDefinition::integer(4).autoincrement())
            .column("total", ColumnDefinition::new(PortableType::Float).not_null())
            .column("note", ColumnDefinition::text(100).with_default("none"));
        assert_eq!(
            MySqlDialect.create_table_sql(&table).unwrap(),
            "CREATE TABLE `orders` (`id` INT NOT NULL AUTO_INCREMENT, \
             `total` DOUBLE NOT NULL, `note` VARCHAR(100) DEFAULT 'none' NULL, \
             PRIMARY KEY (`id`))"
        );
    }

    #[test]
    fn test_alter_table_sql() {
        let dialect = MySqlDialect;
        let definition = ColumnDefinition::text(20).not_null();
        let cases = [
            (
                AlterAction::AddColumn {
                    name: "title".into(),
                    definition: definition.clone(),
                },
                "ALTER TABLE `t` ADD `title` VARCHAR(20) NOT NULL",
            ),
            (
                AlterAction::DropColumn {
                    name: "title".into(),
                },
                "ALTER TABLE `t` DROP `title`",
            ),
            (
                AlterAction::RenameColumn {
                    from: "title".into(),
                    to: "heading".into(),
                    definition: definition.clone(),
                },
                "ALTER TABLE `t` CHANGE `title` `heading` VARCHAR(20) NOT NULL",
            ),
            (
                AlterAction::ChangeColumn {
                    name: "title".into(),
                    definition,
                },
                "ALTER TABLE `t` CHANGE `title` `title` VARCHAR(20) NOT NULL",
            ),
            (
                AlterAction::RenameTable { to: "u".into() },
                "ALTER TABLE `t` RENAME TO `u`",
            ),
        ];
        for (action, expected) in cases {
            assert_eq!(dialect.alter_table_sql("t", &action).unwrap(), expected);
        }
    }

    #[test]
    fn test_index_and_constraint_sql() {
        let dialect = MySqlDialect;
        let fields = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            dialect.create_index_sql("t", "i1_idx", &fields),
            "CREATE INDEX `i1_idx` ON `t` (`a`, `b`)"
        );
        assert_eq!(
            dialect.drop_index_sql("t", "i1_idx"),
            "ALTER TABLE `t` DROP INDEX `i1_idx`"
        );
        assert_eq!(
            dialect.add_unique_sql("t", "u1_idx", &fields),
            "ALTER TABLE `t` ADD UNIQUE `u1_idx` (`a`, `b`)"
        );
        assert_eq!(
            dialect.add_primary_key_sql("t", &fields).unwrap(),
            "ALTER TABLE `t` ADD PRIMARY KEY (`a`, `b`)"
        );
        assert_eq!(
            dialect.drop_primary_key_sql("t").unwrap(),
            "ALTER TABLE `t` DROP PRIMARY KEY"
        );
    }

    #[test]
    fn test_statement_helpers() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.limit_clause(10, 20), " LIMIT 20, 10");
        assert_eq!(
            dialect.lock_tables_sql(&[
                TableLock::write("orders"),
                TableLock::read("items").with_alias("i"),
            ]),
            "LOCK TABLES `orders` WRITE, `items` AS `i` READ"
        );
        assert_eq!(dialect.unlock_tables_sql(), "UNLOCK TABLES");
        assert_eq!(
            dialect
                .create_database_sql("app", "utf8", Some("utf8_general_ci"))
                .unwrap(),
            "CREATE DATABASE `app` CHARACTER SET utf8 COLLATE utf8_general_ci"
        );
        assert_eq!(
            dialect.concat(&["`a`".to_string(), "'-'".to_string()]),
            "CONCAT(`a`, '-')"
        );
        assert_eq!(
            dialect.sequence_increment("t_seq"),
            SequenceIncrement::UpdateThenSelect {
                update: "UPDATE `t_seq` SET `sequence` = LAST_INSERT_ID(`sequence` + 1) \
                         ORDER BY `sequence` DESC LIMIT 1"
                    .to_string(),
                select: "SELECT LAST_INSERT_ID() AS id".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_column_row() {
        let columns: Arc<[String]> = [
            "name",
            "column_type",
            "is_nullable",
            "column_default",
            "extra",
            "column_key",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let row = Row::new(
            columns,
            vec![
                Value::from("id"),
                Value::from("int(11)"),
                Value::from("NO"),
                Value::Null,
                Value::from("auto_increment"),
                Value::from("PRI"),
            ],
        );
        let column = MySqlDialect.parse_column_row(&row).unwrap();
        assert_eq!(column.name, "id");
        assert_eq!(column.data_type, "int");
        assert_eq!(column.native_type(), "int");
        assert!(!column.nullable);
        assert!(column.autoincrement);
        assert!(column.primary);
        assert_eq!(column.default, None);
    }
}
