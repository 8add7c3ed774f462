//! Database provider trait
//!
//! This trait defines the interface that all database implementations must provide.

use crate::schema::{
    CatalogColumn, Dialect, ExecutionMode, ForeignKeyInfo, QueryResult, Statement,
    TableDescriptor, TableSummary,
};
use async_trait::async_trait;
use thiserror::Error;

/// Database provider trait for statement execution and catalog access
///
/// A provider owns the connection pool. Everything that touches the
/// database goes through these methods.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + 'static {
    /// SQL flavour, used for placeholders and default schema names
    fn dialect(&self) -> Dialect;

    /// Execute a single statement on a pooled connection
    ///
    /// In [`ExecutionMode::Transactional`] the statement is wrapped in a
    /// transaction that is rolled back if the driver reports an error.
    ///
    /// # Returns
    ///
    /// Rows for row-returning statements, otherwise the affected row count
    async fn execute(
        &self,
        statement: &Statement,
        mode: ExecutionMode,
    ) -> Result<QueryResult, DatabaseError>;

    /// Execute statements in order, stopping at the first failure
    ///
    /// Each statement commits on its own. Implementations should run the whole
    /// sequence on one connection so later statements observe earlier ones,
    /// and roll back a transaction the script left open before releasing it.
    async fn execute_sequence(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<QueryResult>, DatabaseError> {
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            results.push(self.execute(statement, ExecutionMode::Autocommit).await?);
        }
        Ok(results)
    }

    /// Columns of a table in ordinal order (empty if the table is unknown)
    async fn catalog_columns(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<CatalogColumn>, DatabaseError>;

    /// Primary key column names in key order
    async fn catalog_primary_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<String>, DatabaseError>;

    /// Foreign key mappings declared on the table
    async fn catalog_foreign_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError>;

    /// Base tables in a schema
    async fn list_tables(&self, schema: &str) -> Result<Vec<TableSummary>, DatabaseError>;

    /// Close the pool, waiting for checked-out connections to return
    async fn close(&self);
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Generic database error
    #[error("{0}")]
    Query(String),

    /// No connection became available within the acquire timeout
    #[error("Timed out waiting for a database connection")]
    PoolTimeout,

    /// The pool has been closed
    #[error("Database connection pool is closed")]
    PoolClosed,

    /// Unsupported parameter value
    #[error("Unsupported parameter: {0}")]
    Parameter(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolTimeout,
            sqlx::Error::PoolClosed => DatabaseError::PoolClosed,
            sqlx::Error::Database(database_error) => {
                DatabaseError::Query(database_error.message().to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}

/// Quote an identifier, doubling any embedded double quotes
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
