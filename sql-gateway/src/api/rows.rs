//! Row fetching endpoint with pagination

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::api::json_body;
use crate::database::traits::DatabaseProvider;
use crate::query::fetch_table_page;
use crate::schema::{TableDescriptor, TableRowsRequest};

/// Handler for POST /meta/tables/{schema}/{table}/rows
///
/// Fetches one page of rows with sorting and equality filters.
///
/// Request body (all fields optional):
/// ```json
/// {
///   "page": 2,
///   "pageSize": 10,
///   "sortBy": "name",
///   "sortDirection": "desc",
///   "filters": { "category": "tools" },
///   "primaryKeys": ["id"]
/// }
/// ```
///
/// Response:
/// ```json
/// { "rows": [...], "total": 25, "page": 2, "pageSize": 10, "totalPages": 3 }
/// ```
///
/// Unknown sort or filter columns are rejected with 400, unknown tables with 404.
pub async fn table_rows_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
    Path((schema, table)): Path<(String, String)>,
    payload: Result<Json<TableRowsRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let descriptor = TableDescriptor::new(schema, table);

    match fetch_table_page(database.as_ref(), &descriptor, request).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => {
            tracing::warn!(
                schema = %descriptor.schema,
                table = %descriptor.table,
                error = %error,
                "Failed to fetch table rows"
            );
            error.into_response()
        }
    }
}
