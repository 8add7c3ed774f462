//! Multi-statement script execution

use crate::database::DatabaseProvider;
use crate::query::split::split_statements;
use crate::query::validation::validate_statement;
use crate::schema::{QueryResult, Statement};
use crate::{Error, Result};
use serde_json::Value;

/// Run every statement of a script in order and surface the first SELECT
///
/// Statements execute one after another on a single connection, each
/// committing on its own; a failure stops the script but earlier statements
/// stay applied. The rows of the first statement whose leading keyword is
/// `SELECT` are returned, later SELECT results are discarded. A script
/// without a SELECT returns an empty sequence.
pub async fn run_script<DB: DatabaseProvider>(database: &DB, script: &str) -> Result<Vec<Value>> {
    validate_statement(script, None)?;

    let statements: Vec<Statement> = split_statements(script)?
        .into_iter()
        .map(Statement::new)
        .collect();

    if statements.is_empty() {
        return Err(Error::Validation(
            "Query contains no statements".to_string(),
        ));
    }

    tracing::info!(statements = statements.len(), "Executing script");

    let results = database
        .execute_sequence(&statements)
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Script execution failed");
            Error::from(error)
        })?;

    let rows = first_select_rows(&statements, results);
    tracing::info!(row_count = rows.len(), "Script completed");

    Ok(rows)
}

fn first_select_rows(statements: &[Statement], results: Vec<QueryResult>) -> Vec<Value> {
    statements
        .iter()
        .zip(results)
        .find(|(statement, _)| statement.leading_keyword() == "SELECT")
        .map(|(_, result)| result.rows)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExecutionMode, MAX_QUERY_LENGTH};
    use crate::testing::RecordingProvider;
    use serde_json::json;

    #[tokio::test]
    async fn returns_rows_of_the_only_select() {
        let database = RecordingProvider::new();
        database.push_rows(vec![]);
        database.push_rows(vec![]);
        database.push_rows(vec![json!({"x": 1})]);
        database.push_rows(vec![]);

        let rows = run_script(
            &database,
            "CREATE TABLE t(x int); INSERT INTO t VALUES (1); SELECT * FROM t; DELETE FROM t;",
        )
        .await
        .unwrap();

        assert_eq!(rows, vec![json!({"x": 1})]);
        assert_eq!(
            database.executed_texts(),
            vec![
                "CREATE TABLE t(x int)",
                "INSERT INTO t VALUES (1)",
                "SELECT * FROM t",
                "DELETE FROM t",
            ]
        );
        assert!(database
            .executed()
            .iter()
            .all(|(_, mode)| *mode == ExecutionMode::Autocommit));
    }

    #[tokio::test]
    async fn first_select_wins() {
        let database = RecordingProvider::new();
        database.push_rows(vec![json!({"a": 1})]);
        database.push_rows(vec![json!({"b": 2})]);

        let rows = run_script(&database, "select 1 AS a; SELECT 2 AS b")
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({"a": 1})]);
    }

    #[tokio::test]
    async fn script_without_select_returns_empty() {
        let database = RecordingProvider::new();

        let rows = run_script(&database, "CREATE TABLE t(x int); INSERT INTO t VALUES (1)")
            .await
            .unwrap();

        assert!(rows.is_empty());
        assert_eq!(database.executed().len(), 2);
    }

    #[tokio::test]
    async fn failure_stops_the_script() {
        let database = RecordingProvider::new();
        database.push_rows(vec![]);
        database.push_error("relation \"missing\" does not exist");

        let error = run_script(
            &database,
            "INSERT INTO t VALUES (1); SELECT * FROM missing; SELECT 1",
        )
        .await
        .unwrap_err();

        assert!(matches!(error, Error::Execution(message) if message.contains("missing")));
        assert_eq!(database.executed().len(), 2);
    }

    #[tokio::test]
    async fn oversized_script_never_reaches_the_database() {
        let database = RecordingProvider::new();
        let script = format!("SELECT '{}'", "x".repeat(MAX_QUERY_LENGTH));

        let error = run_script(&database, &script).await.unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        assert!(database.executed().is_empty());
    }

    #[tokio::test]
    async fn comment_only_script_is_rejected() {
        let database = RecordingProvider::new();

        let error = run_script(&database, "-- nothing to do").await.unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        assert!(database.executed().is_empty());
    }
}
