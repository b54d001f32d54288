//! SQLite schema management integration tests.
//!
//! This test suite covers:
//! - Table creation, existence checks and dropping
//! - Column add/rename/drop through `alter_table`
//! - Plain indexes and lookup by field list
//! - Unique constraints and constraint listing
//! - Reverse engineering a created table back into the portable model,
//!   for every column kind
//!
//! Note: SQLite tests use in-memory databases, so no testcontainers needed.

#![cfg(feature = "sqlite")]

use schemakit_core::{
    ColumnChange, ColumnDefinition, ConnectionConfig, ConstraintKind, Database, PortableType,
    Result, SchemaKitError, TableChange, TableDefinition,
};

/// Helper function to open a connected in-memory database
async fn connected() -> Result<Database> {
    let mut db = Database::new(ConnectionConfig::sqlite_memory())?;
    db.connect(false).await?;
    Ok(db)
}

fn orders_table() -> TableDefinition {
    TableDefinition::new("orders")
        .column("id", ColumnDefinition::integer(4).autoincrement())
        .column("customer", ColumnDefinition::text(40).not_null())
        .column("total", ColumnDefinition::new(PortableType::Float))
        .column("placed_at", ColumnDefinition::new(PortableType::Timestamp))
        .primary_key(["id"])
}

// =============================================================================
// Table Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_create_table_and_exists() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    assert!(db.manager().table_exists("orders").await?);
    assert!(!db.manager().table_exists("invoices").await?);
    assert!(db.manager().table_column_exists("orders", "customer").await?);
    assert!(!db.manager().table_column_exists("orders", "missing").await?);
    assert!(!db.manager().table_column_exists("invoices", "id").await?);

    let tables = db.reverse().list_tables().await?;
    assert_eq!(tables, vec!["orders".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_create_table_rejects_reserved_name() -> Result<()> {
    let mut db = connected().await?;
    let table = TableDefinition::new("select").column("id", ColumnDefinition::integer(4));

    let result = db.manager().create_table(&table, false, false).await;
    assert!(matches!(result, Err(SchemaKitError::Schema { .. })));
    assert!(!db.manager().table_exists("select").await?);
    Ok(())
}

#[tokio::test]
async fn test_create_table_drop_first_replaces_table() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let replacement = TableDefinition::new("orders").column("code", ColumnDefinition::text(8));
    db.manager().create_table(&replacement, true, false).await?;

    let columns = db.reverse().list_table_columns("orders").await?;
    assert_eq!(columns, vec!["code".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_drop_table_missing() -> Result<()> {
    let mut db = connected().await?;

    assert!(!db.manager().drop_table("ghost", false).await?);
    let result = db.manager().drop_table("ghost", true).await;
    assert!(matches!(result, Err(SchemaKitError::Query { .. })));
    Ok(())
}

#[tokio::test]
async fn test_drop_table_removes_sequence() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;
    db.manager().create_sequence("orders", 1).await?;
    assert_eq!(db.reverse().list_sequences().await?, vec!["orders".to_string()]);

    assert!(db.manager().drop_table("orders", true).await?);
    assert!(!db.manager().table_exists("orders").await?);
    assert!(db.reverse().list_sequences().await?.is_empty());
    Ok(())
}

// =============================================================================
// Alteration Tests
// =============================================================================

#[tokio::test]
async fn test_add_rename_and_drop_column() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    db.manager()
        .add_table_column("orders", "note", ColumnDefinition::text(200))
        .await?;
    assert!(db.manager().table_column_exists("orders", "note").await?);

    db.manager()
        .rename_table_column("orders", "note", "remark")
        .await?;
    assert!(!db.manager().table_column_exists("orders", "note").await?);
    assert!(db.manager().table_column_exists("orders", "remark").await?);

    let candidates = db
        .reverse()
        .get_table_field_definition("orders", "remark")
        .await?;
    assert_eq!(candidates[0].definition, ColumnDefinition::text(200));

    db.manager().drop_table_column("orders", "remark").await?;
    assert!(!db.manager().table_column_exists("orders", "remark").await?);
    Ok(())
}

#[tokio::test]
async fn test_alter_missing_table() -> Result<()> {
    let mut db = connected().await?;
    let change = TableChange::RemoveColumn {
        name: "x".to_string(),
    };

    assert!(!db.manager().alter_table("ghost", change.clone(), false).await?);
    let result = db.manager().alter_table("ghost", change, true).await;
    assert!(matches!(result, Err(SchemaKitError::Schema { .. })));
    Ok(())
}

#[tokio::test]
async fn test_add_column_rejects_invalid_name() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let result = db
        .manager()
        .add_table_column("orders", "1bad", ColumnDefinition::text(10))
        .await;
    assert!(matches!(result, Err(SchemaKitError::Schema { .. })));
    Ok(())
}

#[tokio::test]
async fn test_change_column_unsupported() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let result = db
        .manager()
        .modify_table_column("orders", "customer", ColumnChange::default().with_length(80))
        .await;
    assert!(matches!(
        result,
        Err(SchemaKitError::UnsupportedFeature { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_rename_table() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    db.manager().rename_table("orders", "purchases").await?;
    assert!(!db.manager().table_exists("orders").await?);
    assert!(db.manager().table_exists("purchases").await?);
    Ok(())
}

// =============================================================================
// Index Tests
// =============================================================================

#[tokio::test]
async fn test_create_and_drop_index() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    db.manager()
        .create_index("orders", "i1", &["customer", "placed_at"], false)
        .await?;
    assert!(db.manager().index_exists("orders", "i1").await?);
    assert_eq!(
        db.manager().physical_index_name("orders", "i1"),
        "orders_i1_idx"
    );
    assert_eq!(
        db.reverse().list_table_indexes("orders").await?,
        vec!["i1".to_string()]
    );

    let index = db.reverse().get_table_index_definition("orders", "i1").await?;
    assert_eq!(index.fields, vec!["customer".to_string(), "placed_at".to_string()]);
    assert!(!index.unique);

    db.manager().drop_index("orders", "i1").await?;
    assert!(!db.manager().index_exists("orders", "i1").await?);
    Ok(())
}

#[tokio::test]
async fn test_index_lookup_by_fields_is_order_sensitive() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;
    db.manager()
        .create_index("orders", "i1", &["customer", "total"], false)
        .await?;

    assert!(
        db.manager()
            .index_exists_by_fields("orders", &["customer", "total"])
            .await?
    );
    assert!(
        !db.manager()
            .index_exists_by_fields("orders", &["total", "customer"])
            .await?
    );
    assert!(
        !db.manager()
            .drop_index_by_fields("orders", &["total", "customer"])
            .await?
    );
    assert!(
        db.manager()
            .drop_index_by_fields("orders", &["customer", "total"])
            .await?
    );
    assert!(db.reverse().list_table_indexes("orders").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_fulltext_index_unsupported() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let result = db
        .manager()
        .create_index("orders", "ft", &["customer"], true)
        .await;
    assert!(matches!(
        result,
        Err(SchemaKitError::UnsupportedFeature { .. })
    ));
    Ok(())
}

// =============================================================================
// Constraint Tests
// =============================================================================

#[tokio::test]
async fn test_unique_constraints() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    db.manager()
        .add_unique_constraint("orders", "uc", &["customer"])
        .await?;
    assert!(
        db.manager()
            .unique_constraint_exists("orders", &["customer"])
            .await?
    );

    let constraints = db.reverse().list_table_constraints("orders").await?;
    assert_eq!(
        constraints,
        vec!["PRIMARY".to_string(), "uc".to_string()]
    );
    // Unique constraints are not reported as plain indexes
    assert!(db.reverse().list_table_indexes("orders").await?.is_empty());

    let unique = db
        .reverse()
        .get_table_constraint_definition("orders", "uc")
        .await?;
    assert_eq!(unique.kind, ConstraintKind::Unique);
    assert_eq!(unique.fields, vec!["customer".to_string()]);

    let primary = db
        .reverse()
        .get_table_constraint_definition("orders", "PRIMARY")
        .await?;
    assert_eq!(primary.kind, ConstraintKind::PrimaryKey);
    assert_eq!(primary.fields, vec!["id".to_string()]);

    assert!(
        db.manager()
            .drop_unique_constraint_by_fields("orders", &["customer"])
            .await?
    );
    assert!(
        !db.manager()
            .unique_constraint_exists("orders", &["customer"])
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn test_unique_constraint_enforced() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;
    db.manager()
        .add_unique_constraint("orders", "uc", &["customer"])
        .await?;

    db.manipulate("INSERT INTO orders (customer) VALUES ('acme')")
        .await?;
    let duplicate = db
        .manipulate("INSERT INTO orders (customer) VALUES ('acme')")
        .await;
    assert!(matches!(duplicate, Err(SchemaKitError::Query { .. })));
    assert!(db.last_error_code().is_some());
    Ok(())
}

#[tokio::test]
async fn test_primary_key_changes_unsupported() -> Result<()> {
    let mut db = connected().await?;
    let table = TableDefinition::new("tags").column("name", ColumnDefinition::text(20));
    db.manager().create_table(&table, false, false).await?;

    let result = db.manager().add_primary_key("tags", &["name"]).await;
    assert!(matches!(
        result,
        Err(SchemaKitError::UnsupportedFeature { .. })
    ));
    Ok(())
}

// =============================================================================
// Reverse Engineering Tests
// =============================================================================

#[tokio::test]
async fn test_table_definition_round_trip() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let definition = db.reverse().get_table_definition("orders").await?;
    assert_eq!(definition.name, "orders");
    assert_eq!(definition.primary_key, vec!["id".to_string()]);

    let id = definition.get_column("id").expect("id column");
    assert_eq!(id.column_type, PortableType::Integer);
    assert!(id.autoincrement);

    let customer = definition.get_column("customer").expect("customer column");
    assert_eq!(customer.column_type, PortableType::Text);
    assert_eq!(customer.length, Some(40));
    assert!(customer.not_null);

    // DATETIME is the native type of the portable timestamp
    let placed_at = definition.get_column("placed_at").expect("placed_at column");
    assert_eq!(placed_at.column_type, PortableType::Timestamp);
    Ok(())
}

/// Columns covering every portable type and attribute that survives a
/// SQLite round trip unchanged.
fn round_trip_columns() -> Vec<(&'static str, ColumnDefinition)> {
    vec![
        ("i1", ColumnDefinition::integer(1)),
        ("i2", ColumnDefinition::integer(2).not_null()),
        ("i3", ColumnDefinition::integer(3).with_default("-7")),
        ("i4", ColumnDefinition::integer(4).not_null().with_default("3")),
        ("i8", ColumnDefinition::integer(8)),
        ("label", ColumnDefinition::text(12).with_default("o'k")),
        ("quoted", ColumnDefinition::text(30).with_default("say \"hi\"")),
        ("code", ColumnDefinition::text(3).fixed().not_null()),
        ("ratio", ColumnDefinition::new(PortableType::Float).with_precision(10)),
        ("amount", ColumnDefinition::new(PortableType::Float).with_default("1.5")),
        ("body", ColumnDefinition::new(PortableType::Clob).not_null()),
        ("born", ColumnDefinition::new(PortableType::Date).with_default("2020-01-31")),
        ("opens", ColumnDefinition::new(PortableType::Time)),
        ("seen", ColumnDefinition::new(PortableType::DateTime).not_null()),
        ("stamp", ColumnDefinition::new(PortableType::Timestamp)),
    ]
}

#[tokio::test]
async fn test_every_column_kind_round_trips() -> Result<()> {
    let mut db = connected().await?;
    let columns = round_trip_columns();
    let table = columns
        .iter()
        .fold(TableDefinition::new("kinds"), |table, (name, definition)| {
            table.column(*name, definition.clone())
        });
    db.manager().create_table(&table, false, false).await?;

    let reconstructed = db.reverse().get_table_definition("kinds").await?;
    for (name, declared) in &columns {
        let candidates = db.reverse().get_table_field_definition("kinds", name).await?;
        assert!(
            candidates.iter().any(|c| c.definition.is_equivalent_to(declared)),
            "{name}: {declared:?} not among {candidates:?}"
        );

        let picked = reconstructed.get_column(name).expect("column reconstructed");
        assert!(
            picked.is_equivalent_to(declared),
            "{name}: picked {picked:?}, declared {declared:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_autoincrement_round_trips_for_every_width() -> Result<()> {
    let mut db = connected().await?;
    for width in [1, 2, 3, 4, 8] {
        let name = format!("auto{width}");
        let declared = ColumnDefinition::integer(width).autoincrement();
        let table = TableDefinition::new(name.as_str())
            .column("id", declared.clone())
            .column("label", ColumnDefinition::text(10));
        db.manager().create_table(&table, false, false).await?;

        let candidates = db.reverse().get_table_field_definition(&name, "id").await?;
        assert!(
            candidates.iter().any(|c| c.definition.is_equivalent_to(&declared)),
            "{name}: {declared:?} not among {candidates:?}"
        );

        // Every autoincrement column is a 64-bit rowid alias.
        let reconstructed = db.reverse().get_table_definition(&name).await?;
        let id = reconstructed.get_column("id").expect("id column");
        assert!(id.is_equivalent_to(&ColumnDefinition::integer(8).autoincrement()));
        assert_eq!(reconstructed.primary_key, vec!["id".to_string()]);
    }
    Ok(())
}

#[tokio::test]
async fn test_rename_keeps_64_bit_autoincrement() -> Result<()> {
    let mut db = connected().await?;
    let table = TableDefinition::new("events")
        .column("id", ColumnDefinition::integer(8).autoincrement())
        .column("kind", ColumnDefinition::text(10));
    db.manager().create_table(&table, false, false).await?;

    db.manager().rename_table_column("events", "id", "event_id").await?;

    let reconstructed = db.reverse().get_table_definition("events").await?;
    let id = reconstructed.get_column("event_id").expect("renamed column");
    assert_eq!(id.length, Some(8));
    assert!(id.autoincrement);
    assert_eq!(reconstructed.primary_key, vec!["event_id".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_field_definition_missing_column() -> Result<()> {
    let mut db = connected().await?;
    db.manager().create_table(&orders_table(), false, false).await?;

    let result = db
        .reverse()
        .get_table_field_definition("orders", "missing")
        .await;
    assert!(matches!(result, Err(SchemaKitError::Schema { .. })));

    let result = db.reverse().get_table_definition("ghost").await;
    assert!(matches!(result, Err(SchemaKitError::Schema { .. })));
    Ok(())
}
