//! Raw and parameterized SQL execution endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::json_body;
use crate::database::traits::DatabaseProvider;
use crate::query::{run_parameterized, run_script};
use crate::schema::QueryRequest;

/// Handler for POST /meta/query
///
/// Without `params` the body is treated as a script: every statement runs in
/// order and the rows of the first SELECT are returned. With `params` the body
/// is a single statement executed inside a transaction.
///
/// # Security Warning
///
/// This endpoint executes ANY SQL statement including DDL and DML.
///
/// Request body:
/// ```json
/// {
///   "query": "CREATE TABLE t(x int); INSERT INTO t VALUES (1); SELECT * FROM t;"
/// }
/// ```
///
/// Response:
/// ```json
/// [{ "x": 1 }]
/// ```
///
/// Response (error, status 400):
/// ```json
/// { "error": "ExecutionError", "message": "syntax error at or near \"SELCT\"" }
/// ```
pub async fn execute_query_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };

    let result = match request.params {
        Some(params) => run_parameterized(database.as_ref(), &request.query, params).await,
        None => run_script(database.as_ref(), &request.query).await,
    };

    match result {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Request body for POST /meta/query/parameterized
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterizedQueryRequest {
    pub query: String,
    pub params: Vec<Value>,
}

/// Handler for POST /meta/query/parameterized
///
/// Executes exactly one statement with positional parameters inside a
/// transaction and returns its rows.
///
/// Request body:
/// ```json
/// { "query": "SELECT * FROM items WHERE id = $1", "params": [7] }
/// ```
pub async fn execute_parameterized_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
    payload: Result<Json<ParameterizedQueryRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };

    match run_parameterized(database.as_ref(), &request.query, request.params).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(error) => error.into_response(),
    }
}
