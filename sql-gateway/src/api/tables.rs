//! Table listing and metadata endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::database::traits::DatabaseProvider;
use crate::metadata::require_table_metadata;
use crate::schema::{TableDescriptor, TablesResponse};
use crate::Error;

/// Query parameters for GET /meta/tables
#[derive(Debug, Clone, Deserialize)]
pub struct ListTablesQuery {
    /// Schema to list, defaults to `public` (PostgreSQL) or `main` (SQLite)
    pub schema: Option<String>,
}

/// Handler for GET /meta/tables
///
/// Returns the base tables of one schema.
pub async fn list_tables_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
    Query(query): Query<ListTablesQuery>,
) -> Response {
    let schema = query
        .schema
        .unwrap_or_else(|| database.dialect().default_schema().to_string());

    match database.list_tables(&schema).await {
        Ok(tables) => (StatusCode::OK, Json(TablesResponse { tables })).into_response(),
        Err(error) => {
            tracing::error!(schema = %schema, error = %error, "Failed to list tables");
            Error::from(error).into_response()
        }
    }
}

/// Handler for GET /meta/tables/{schema}/{table}
///
/// Returns columns with key flags, primary keys and foreign keys. Responds
/// with 404 when the catalog reports no columns for the table.
pub async fn table_metadata_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
    Path((schema, table)): Path<(String, String)>,
) -> Response {
    let descriptor = TableDescriptor::new(schema, table);

    match require_table_metadata(database.as_ref(), &descriptor).await {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(error) => error.into_response(),
    }
}
