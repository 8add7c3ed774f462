//! In-memory provider for unit tests
//!
//! Records every executed statement and replays queued results, so tests can
//! assert on the exact SQL produced and on the number of database calls.

use crate::database::traits::{DatabaseError, DatabaseProvider};
use crate::schema::{
    CatalogColumn, Dialect, ExecutionMode, ForeignKeyInfo, QueryResult, Statement,
    TableDescriptor, TableSummary,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) struct RecordingProvider {
    dialect: Dialect,
    executed: Mutex<Vec<(Statement, ExecutionMode)>>,
    results: Mutex<VecDeque<Result<QueryResult, DatabaseError>>>,
    columns: Vec<CatalogColumn>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<ForeignKeyInfo>,
    catalog_calls: AtomicUsize,
}

impl RecordingProvider {
    pub(crate) fn new() -> Self {
        Self {
            dialect: Dialect::Postgres,
            executed: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
            catalog_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub(crate) fn with_columns(mut self, columns: Vec<CatalogColumn>) -> Self {
        self.columns = columns;
        self
    }

    pub(crate) fn with_primary_keys(mut self, primary_keys: Vec<String>) -> Self {
        self.primary_keys = primary_keys;
        self
    }

    pub(crate) fn with_foreign_keys(mut self, foreign_keys: Vec<ForeignKeyInfo>) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// Queue the rows returned by the next execution
    pub(crate) fn push_rows(&self, rows: Vec<Value>) {
        self.results.lock().unwrap().push_back(Ok(QueryResult {
            row_count: rows.len() as u64,
            rows,
            execution_time_ms: 0.0,
        }));
    }

    /// Queue a failure for the next execution
    pub(crate) fn push_error(&self, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(DatabaseError::Query(message.to_string())));
    }

    pub(crate) fn executed(&self) -> Vec<(Statement, ExecutionMode)> {
        self.executed.lock().unwrap().clone()
    }

    pub(crate) fn executed_texts(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .map(|(statement, _)| statement.text)
            .collect()
    }

    pub(crate) fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn catalog_column(name: &str, data_type: &str) -> CatalogColumn {
    CatalogColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable: true,
        default_expr: None,
        is_identity: false,
        is_updatable: true,
    }
}

#[async_trait]
impl DatabaseProvider for RecordingProvider {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(
        &self,
        statement: &Statement,
        mode: ExecutionMode,
    ) -> Result<QueryResult, DatabaseError> {
        self.executed
            .lock()
            .unwrap()
            .push((statement.clone(), mode));

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::default()))
    }

    async fn catalog_columns(
        &self,
        _table: &TableDescriptor,
    ) -> Result<Vec<CatalogColumn>, DatabaseError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.columns.clone())
    }

    async fn catalog_primary_keys(
        &self,
        _table: &TableDescriptor,
    ) -> Result<Vec<String>, DatabaseError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.primary_keys.clone())
    }

    async fn catalog_foreign_keys(
        &self,
        _table: &TableDescriptor,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.foreign_keys.clone())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableSummary>, DatabaseError> {
        Ok(vec![TableSummary {
            schema: schema.to_string(),
            name: "items".to_string(),
        }])
    }

    async fn close(&self) {}
}
