//! PostgreSQL database provider implementation

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
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Either, Executor, PgPool, Postgres, Row, TypeInfo};
use std::time::Instant;

/// PostgreSQL database provider
pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    /// Create a new PostgreSQL provider from an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool against `database_url`
    pub async fn connect(
        database_url: &str,
        settings: &PoolSettings,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(settings.idle_timeout())
            .max_lifetime(settings.max_lifetime())
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Convert a PostgreSQL row to a JSON object
    fn row_to_json(row: &PgRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for (index, column) in row.columns().iter().enumerate() {
            let type_name = column.type_info().name();

            let value: Value = match type_name {
                "BOOL" => {
                    let val: Option<bool> = row.try_get(index)?;
                    val.map(Value::Bool).unwrap_or(Value::Null)
                }
                "INT2" => {
                    let val: Option<i16> = row.try_get(index)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT4" => {
                    let val: Option<i32> = row.try_get(index)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT8" => {
                    let val: Option<i64> = row.try_get(index)?;
                    val.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "FLOAT4" => {
                    let val: Option<f32> = row.try_get(index)?;
                    val.and_then(|v| serde_json::Number::from_f64(v as f64))
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "FLOAT8" => {
                    let val: Option<f64> = row.try_get(index)?;
                    val.and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
                    let val: Option<String> = row.try_get(index)?;
                    val.map(Value::String).unwrap_or(Value::Null)
                }
                "BYTEA" => {
                    let val: Option<Vec<u8>> = row.try_get(index)?;
                    val.map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len())))
                        .unwrap_or(Value::Null)
                }
                "TIMESTAMP" => {
                    let val: Option<NaiveDateTime> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "TIMESTAMPTZ" => {
                    let val: Option<DateTime<Utc>> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_rfc3339())).unwrap_or(Value::Null)
                }
                "DATE" => {
                    let val: Option<NaiveDate> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "TIME" => {
                    let val: Option<NaiveTime> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "JSON" | "JSONB" => {
                    let val: Option<Value> = row.try_get(index)?;
                    val.unwrap_or(Value::Null)
                }
                "UUID" => {
                    let val: Option<Uuid> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                "NUMERIC" => {
                    // Keep precision by returning the decimal as a string
                    let val: Option<Decimal> = row.try_get(index)?;
                    val.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null)
                }
                _ => {
                    let val: Option<String> = row.try_get(index).ok().flatten();
                    val.map(Value::String).unwrap_or(Value::Null)
                }
            };

            map.insert(column.name().to_string(), value);
        }

        Ok(Value::Object(map))
    }

    /// Bind JSON scalars as positional parameters
    fn bind_parameters<'q>(
        mut query: Query<'q, Postgres, PgArguments>,
        params: &[Value],
    ) -> Result<Query<'q, Postgres, PgArguments>, DatabaseError> {
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
        E: Executor<'c, Database = Postgres>,
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
}

#[async_trait]
impl DatabaseProvider for PostgresProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        let column_query = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default,
                (is_identity = 'YES' OR column_default LIKE 'nextval(%') AS is_identity,
                is_updatable::text AS is_updatable
            FROM information_schema.columns
            WHERE table_schema = $1
              AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query(column_query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let is_nullable: String = row.try_get("is_nullable")?;
                let is_updatable: String = row.try_get("is_updatable")?;
                let is_identity: Option<bool> = row.try_get("is_identity")?;

                Ok(CatalogColumn {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: is_nullable == "YES",
                    default_expr: row.try_get("column_default")?,
                    is_identity: is_identity.unwrap_or(false),
                    is_updatable: is_updatable == "YES",
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn catalog_primary_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<String>, DatabaseError> {
        let pk_query = r#"
            SELECT kcu.column_name::text AS column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
        "#;

        let rows = sqlx::query(pk_query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("column_name"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::from)
    }

    async fn catalog_foreign_keys(
        &self,
        table: &TableDescriptor,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError> {
        let fk_query = r#"
            SELECT
                tc.constraint_name::text AS constraint_name,
                kcu.column_name::text AS column_name,
                ccu.table_schema::text AS foreign_schema,
                ccu.table_name::text AS foreign_table,
                ccu.column_name::text AS foreign_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
              AND ccu.constraint_schema = tc.constraint_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query(fk_query)
            .bind(&table.schema)
            .bind(&table.table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeyInfo {
                    constraint_name: row.try_get("constraint_name")?,
                    column: row.try_get("column_name")?,
                    foreign_schema: row.try_get("foreign_schema")?,
                    foreign_table: row.try_get("foreign_table")?,
                    foreign_column: row.try_get("foreign_column")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableSummary>, DatabaseError> {
        let query = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = sqlx::query(query).bind(schema).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(TableSummary {
                    schema: schema.to_string(),
                    name: row.try_get("table_name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
