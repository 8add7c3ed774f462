//! # sql-gateway
//!
//! An HTTP query and data-access gateway for administrative SQL consoles,
//! easily integrable as an Axum router.
//!
//! ## Features
//!
//! - Multi-statement scripts and parameterized single statements over HTTP
//! - Paginated, sorted and filtered table browsing with allow-listed identifiers
//! - Table, column and key metadata introspection
//! - Transparent forwarding of REST requests to a REST-over-SQL upstream
//! - Support for SQLite and PostgreSQL
//!
//! ## Security Warning
//!
//! - No authentication/authorization built-in
//! - Raw query execution allows full database access (INSERT/UPDATE/DELETE/DDL)
//! - Only mount behind an access-controlled admin surface
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use sql_gateway::{GatewayConfig, GatewayLayer};
//! use sqlx::SqlitePool;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = SqlitePool::connect("sqlite::memory:").await?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(GatewayLayer::sqlite(pool, GatewayConfig::default())?.into_router());
//!
//!     // Serve the application...
//!     Ok(())
//! }
//! ```

// Public modules
pub mod api;
pub mod config;
pub mod database;
pub mod layer;
pub mod metadata;
pub mod proxy;
pub mod query;
pub mod schema;

#[cfg(test)]
mod testing;

// Public exports
pub use config::{GatewayConfig, PoolSettings, RestSettings};
pub use layer::GatewayLayer;
pub use proxy::RestProxy;
pub use schema::{
    ColumnMetadata, QueryRequest, QueryResult, TableDataResult, TableDescriptor, TableMetadata,
};

// Re-export database providers
pub use database::traits::DatabaseProvider;

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteProvider;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresProvider;

use database::traits::DatabaseError;
use thiserror::Error;

/// Error kinds produced by the gateway components
///
/// The HTTP status for each kind is decided in one place, see
/// [`api`](crate::api).
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any I/O
    #[error("{0}")]
    Validation(String),

    /// The database reported an error while executing a statement
    #[error("{0}")]
    Execution(String),

    /// An identifier is not a column of the target table
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Catalog introspection found no columns for the table
    #[error("Table not found: {schema}.{table}")]
    TableNotFound { schema: String, table: String },

    /// HTTP method not accepted by the REST proxy
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Forwarding to the REST upstream failed
    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl Error {
    /// Stable name of the error kind, used in response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Execution(_) => "ExecutionError",
            Error::InvalidIdentifier(_) => "InvalidIdentifier",
            Error::TableNotFound { .. } => "NotFound",
            Error::MethodNotAllowed(_) => "MethodNotAllowed",
            Error::Proxy(_) => "ProxyError",
        }
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Self {
        Error::Execution(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
