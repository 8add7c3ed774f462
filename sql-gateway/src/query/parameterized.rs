//! Single statement execution with bound parameters

use crate::database::DatabaseProvider;
use crate::query::split::split_statements;
use crate::query::validation::validate_statement;
use crate::schema::{ExecutionMode, Statement};
use crate::{Error, Result};
use serde_json::Value;

/// Execute one statement with positional parameters inside a transaction
///
/// Text holding more than one statement is rejected before any I/O. The transaction is rolled back if the statement fails. Start and
/// completion (or failure) are logged with the statement text.
pub async fn run_parameterized<DB: DatabaseProvider>(
    database: &DB,
    text: &str,
    params: Vec<Value>,
) -> Result<Vec<Value>> {
    validate_statement(text, Some(&params))?;
    let statement_count = split_statements(text)?.len();
    if statement_count != 1 {
        return Err(Error::Validation(format!(
            "Expected exactly one statement, found {}",
            statement_count
        )));
    }

    let has_params = !params.is_empty();
    tracing::info!(query = %text, has_params, "Executing parameterized query");

    let statement = Statement::with_params(text, params);
    match database
        .execute(&statement, ExecutionMode::Transactional)
        .await
    {
        Ok(result) => {
            let rows = normalize_rows(result.rows);
            tracing::info!(
                query = %text,
                has_params,
                row_count = rows.len(),
                execution_time_ms = result.execution_time_ms,
                "Parameterized query completed"
            );
            Ok(rows)
        }
        Err(error) => {
            tracing::error!(query = %text, has_params, error = %error, "Parameterized query failed");
            Err(error.into())
        }
    }
}

/// Collapse a nested result whose first element is empty into no rows
pub fn normalize_rows(rows: Vec<Value>) -> Vec<Value> {
    match rows.first() {
        Some(Value::Array(first)) if first.is_empty() => Vec::new(),
        _ => rows,
    }
}
