//! SQLite database provider implementation

use crate::config::PoolSettings;
use crate::database::{elapsed_milliseconds, opens_transaction};
use crate::database::traits::{DatabaseError, DatabaseProvider};
use crate::schema::{
    CatalogColumn, Dialect, ExecutionMode, ForeignKeyInfo, QueryResult, Statement,
    TableDescriptor, TableSummary,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Either, Executor, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::time::Instant;

/// SQLite database provider
pub struct SqliteProvider {
    pool: SqlitePool,
}

impl SqliteProvider {
    /// Create a new SQLite provider from an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool against `database_url`
    ///
    /// In-memory databases are private to a connection, so use
    /// `max_connections = 1` for `sqlite::memory:`.
    pub async fn connect(
        database_url: &str,
        settings: &PoolSettings,
    ) -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(settings.idle_timeout())
            .max_lifetime(settings.max_lifetime())
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// The underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Convert a SQLite row to a JSON object
    fn row_to_json(row: &SqliteRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for (index, column) in row.columns().iter().enumerate() {
            let value = Self::extract_column_value(row, index, column.type_info().name())?;
            map.insert(column.name().to_string(), value);
        }

        Ok(Value::Object(map))
    }

    /// Extract a column value from a SQLite row and convert to JSON
    fn extract_column_value(
        row: &SqliteRow,
        index: usize,
        type_name: &str,
    ) -> Result<Value, DatabaseError> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        // SQLite reports affinities; the declared type only narrows the first attempt
        match type_name {
            "BOOLEAN" | "BOOL" => {
                if let Ok(value) = row.try_get::<bool, _>(index) {
                    return Ok(Value::Bool(value));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" => {
                if let Ok(value) = row.try_get::<f64, _>(index) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            _ => {}
        }

        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
        }

        Ok(Value::Null)
    }

    /// Bind JSON scalars as positional parameters
    fn bind_parameters<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &[Value],
    ) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, DatabaseError> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(value) => query.bind(*value),
                Value::Number(number) => match number.as_i64() {
                    Some(integer) => query.bind(integer),
                    None => query.bind(number.as_f64().unwrap_or_default()),
                },
                Value::String(text) => query.bind(text.clone()),
                other => return Err(DatabaseError::Parameter(other.to_string())),
            };
        }
        Ok(query)
    }

    /// Run one statement on any executor (pool, connection or transaction)
    ///
    /// Rows are collected whatever the statement kind; `row_count` is the
    /// number of rows returned, or the affected count when none were.
    // Deprecated in sqlx 0.8; no replacement yields rows and rows_affected together
    #[allow(deprecated)]
    async fn run_statement<'c, E>(
        executor: E,
        statement: &Statement,
    ) -> Result<QueryResult, DatabaseError>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        let query = Self::bind_parameters(sqlx::query(&statement.text), &statement.params)?;

        let mut stream = query.fetch_many(executor);
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(outcome) => rows_affected += outcome.rows_affected(),
                Either::Right(row) => rows.push(Self::row_to_json(&row)?),
            }
        }

        Ok(QueryResult {
            row_count: if rows.is_empty() {
                rows_affected
            } else {
                rows.len() as u64
            },
            rows,
            execution_time_ms: 0.0,
        })
    }

    /// First primary key column of `table`, used when a foreign key omits its target column
    async fn first_primary_key(&self, schema: &str, table: &str) -> Result<Option<String>, DatabaseError> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?, ?) WHERE pk = 1")
                .bind(table)
                .bind(schema)
                .fetch_optional(&self.pool)
                .await?;
        Ok(name)
    }
}

#[async_trait]
impl DatabaseProvider for SqliteProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(
        &self,
        statement: &Statement,
        mode: ExecutionMode,
    ) -> Result<QueryResult, DatabaseError> {
        let start_time = Instant::now();

        let mut result = match mode {
            ExecutionMode::Autocommit => Self::run_statement(&self.pool, statement).await?,
            ExecutionMode::Transactional => {
                let mut transaction = self.pool.begin().await?;
                match Self::run_statement(&mut *transaction, statement).await {
                    Ok(result) => {
                        transaction.commit().await?;
                        result
                    }
                    Err(error) => {
                        if let Err(rollback_error) = transaction.rollback().await {
                            tracing::warn!(error = %rollback_error, "Rollback failed");
                        }
                        return Err(error);
                    }
                }
            }
        };

        result.execution_time_ms = elapsed_milliseconds(start_time);
        Ok(result)
    }

    async fn execute_sequence(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<QueryResult>, DatabaseError> {
        let mut connection = self.pool.acquire().await?;
        let mut results = Vec::with_capacity(statements.len());
        let mut outcome = Ok(());

        for statement in statements {
            let start_time = Instant::now();
            match Self::run_statement(&mut *connection, statement).await {
                Ok(mut result) => {
                    result.execution_time_ms = elapsed_milliseconds(start_time);
                    results.push(result);
                }
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }

        // An uncommitted BEGIN must not travel back into the pool
        if opens_transaction(statements) {
            if let Err(error) = sqlx::query("ROLLBACK").execute(&mut *connection).await {
                tracing::debug!(error = %error, "No open script transaction to roll back");
            }
        }

        outcome.map(|_| results)
    }

    async fn catalog_columns(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<CatalogColumn>, DatabaseError> {
        // pragma_table_info returns: cid, name, type, notnull, dflt_value, pk
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?, ?) ORDER BY cid"#,
        )
        .bind(&table.table)
        .bind(&table.schema)
        .fetch_all(&self.pool)
        .await?;

        let primary_key_count = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").unwrap_or(0) > 0)
            .count();

        rows.iter()
            .map(|row| {
                let data_type: String = row.try_get("type")?;
                let not_null: i64 = row.try_get("notnull")?;
                let primary_key: i64 = row.try_get("pk")?;

                // A lone INTEGER PRIMARY KEY aliases the rowid
                let is_identity = primary_key_count == 1
                    && primary_key == 1
                    && data_type.eq_ignore_ascii_case("INTEGER");

                Ok(CatalogColumn {
                    name: row.try_get("name")?,
                    data_type,
                    nullable: not_null == 0 && primary_key == 0,
                    default_expr: row.try_get("dflt_value").ok().flatten(),
                    is_identity,
                    is_updatable: true,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn catalog_primary_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<String>, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM pragma_table_info(?, ?) WHERE pk > 0 ORDER BY pk",
        )
        .bind(&table.table)
        .bind(&table.schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn catalog_foreign_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError> {
        let rows = sqlx::query(
            r#"SELECT id, "from", "table", "to" FROM pragma_foreign_key_list(?, ?) ORDER BY id, seq"#,
        )
        .bind(&table.table)
        .bind(&table.schema)
        .fetch_all(&self.pool)
        .await?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let foreign_table: String = row.try_get("table")?;
            let target_column: Option<String> = row.try_get("to")?;

            let foreign_column = match target_column {
                Some(column) => column,
                None => self
                    .first_primary_key(&table.schema, &foreign_table)
                    .await?
                    .unwrap_or_else(|| "rowid".to_string()),
            };

            foreign_keys.push(ForeignKeyInfo {
                constraint_name: format!("fk_{}_{}", table.table, id),
                column: row.try_get("from")?,
                foreign_schema: table.schema.clone(),
                foreign_table,
                foreign_column,
            });
        }

        Ok(foreign_keys)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableSummary>, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM pragma_table_list WHERE schema = ? AND type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(names
            .into_iter()
            .map(|name| TableSummary {
                schema: schema.to_string(),
                name,
            })
            .collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
