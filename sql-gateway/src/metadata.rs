//! Table metadata resolution
//!
//! Joins the three catalog lookups (columns, primary keys, foreign keys) into
//! a single [`TableMetadata`]. Nothing is cached: every call re-queries the
//! catalog.

use crate::database::DatabaseProvider;
use crate::schema::{CatalogColumn, ColumnMetadata, ForeignKeyInfo, TableDescriptor, TableMetadata};
use crate::{Error, Result};

/// Introspect a table
///
/// An unknown table yields metadata with an empty column list rather than an
/// error; use [`require_table_metadata`] when absence should fail.
pub async fn resolve_table_metadata<DB: DatabaseProvider>(
    database: &DB,
    table: &TableDescriptor,
) -> Result<TableMetadata> {
    let (columns, primary_keys, foreign_keys) = tokio::try_join!(
        database.catalog_columns(table),
        database.catalog_primary_keys(table),
        database.catalog_foreign_keys(table),
    )?;

    Ok(assemble_metadata(table, columns, primary_keys, foreign_keys))
}

/// Introspect a table, failing with [`Error::TableNotFound`] if it has no columns
pub async fn require_table_metadata<DB: DatabaseProvider>(
    database: &DB,
    table: &TableDescriptor,
) -> Result<TableMetadata> {
    let metadata = resolve_table_metadata(database, table).await?;

    if metadata.is_empty() {
        return Err(Error::TableNotFound {
            schema: table.schema.clone(),
            table: table.table.clone(),
        });
    }

    Ok(metadata)
}

/// Join catalog rows by column name
pub fn assemble_metadata(
    table: &TableDescriptor,
    columns: Vec<CatalogColumn>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<ForeignKeyInfo>,
) -> TableMetadata {
    let columns = columns
        .into_iter()
        .map(|column| {
            let foreign_key = foreign_keys
                .iter()
                .find(|foreign_key| foreign_key.column == column.name);

            ColumnMetadata {
                is_primary_key: primary_keys.contains(&column.name),
                is_foreign_key: foreign_key.is_some(),
                foreign_schema: foreign_key.map(|key| key.foreign_schema.clone()),
                foreign_table: foreign_key.map(|key| key.foreign_table.clone()),
                foreign_column: foreign_key.map(|key| key.foreign_column.clone()),
                name: column.name,
                data_type: column.data_type,
                nullable: column.nullable,
                default_expr: column.default_expr,
                is_identity: column.is_identity,
                is_updatable: column.is_updatable,
            }
        })
        .collect();

    TableMetadata {
        schema: table.schema.clone(),
        table: table.table.clone(),
        columns,
        primary_keys,
        foreign_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog_column, RecordingProvider};

    fn orders_catalog() -> RecordingProvider {
        RecordingProvider::new()
            .with_columns(vec![
                catalog_column("id", "integer"),
                catalog_column("customer_id", "integer"),
                catalog_column("note", "text"),
            ])
            .with_primary_keys(vec!["id".to_string()])
            .with_foreign_keys(vec![ForeignKeyInfo {
                constraint_name: "orders_customer_id_fkey".to_string(),
                column: "customer_id".to_string(),
                foreign_schema: "public".to_string(),
                foreign_table: "customers".to_string(),
                foreign_column: "id".to_string(),
            }])
    }

    #[tokio::test]
    async fn joins_keys_onto_columns() {
        let database = orders_catalog();
        let metadata = resolve_table_metadata(&database, &TableDescriptor::new("public", "orders"))
            .await
            .unwrap();

        let id = &metadata.columns[0];
        assert!(id.is_primary_key);
        assert!(!id.is_foreign_key);

        let customer = &metadata.columns[1];
        assert!(!customer.is_primary_key);
        assert!(customer.is_foreign_key);
        assert_eq!(customer.foreign_table.as_deref(), Some("customers"));
        assert_eq!(customer.foreign_column.as_deref(), Some("id"));

        let note = &metadata.columns[2];
        assert!(!note.is_primary_key && !note.is_foreign_key);
        assert_eq!(note.foreign_schema, None);
    }

    #[tokio::test]
    async fn resolving_twice_is_identical_and_uncached() {
        let database = orders_catalog();
        let table = TableDescriptor::new("public", "orders");

        let first = resolve_table_metadata(&database, &table).await.unwrap();
        let second = resolve_table_metadata(&database, &table).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(database.catalog_calls(), 6);
    }

    #[tokio::test]
    async fn unknown_table_is_empty_not_an_error() {
        let database = RecordingProvider::new();
        let table = TableDescriptor::new("public", "missing");

        let metadata = resolve_table_metadata(&database, &table).await.unwrap();
        assert!(metadata.is_empty());

        let error = require_table_metadata(&database, &table).await.unwrap_err();
        assert!(matches!(error, Error::TableNotFound { .. }));
    }
}
