//! GatewayLayer - Main Axum integration layer
//!
//! This module provides the main entry point for mounting the gateway
//! endpoints into an Axum application.

use crate::config::GatewayConfig;
use crate::database::traits::DatabaseProvider;
use crate::proxy::{RestProxy, REST_PREFIX};
use crate::schema::ProjectDescriptor;
use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[cfg(feature = "sqlite")]
use crate::database::sqlite::SqliteProvider;

#[cfg(feature = "postgres")]
use crate::database::postgres::PostgresProvider;

use crate::api::{
    execute_parameterized_handler, execute_query_handler, list_tables_handler,
    project_handler, proxy_handler, table_metadata_handler, table_rows_handler,
};

/// Main layer for mounting the gateway into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use sql_gateway::{GatewayConfig, GatewayLayer};
/// use sqlx::SqlitePool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite::memory:").await?;
/// let gateway = GatewayLayer::sqlite(pool, GatewayConfig::default())?;
/// let app = Router::new().merge(gateway.into_router());
/// # Ok(())
/// # }
/// ```
pub struct GatewayLayer<DB: DatabaseProvider> {
    database: Arc<DB>,
    rest_proxy: Option<Arc<RestProxy>>,
    project: ProjectDescriptor,
}

impl<DB: DatabaseProvider> GatewayLayer<DB> {
    /// Create a gateway over a database provider
    ///
    /// # Arguments
    ///
    /// * `database` - The database provider owning the connection pool
    /// * `config` - Gateway configuration; the REST proxy is only mounted
    ///   when `config.rest` is set
    pub fn new(database: DB, config: GatewayConfig) -> crate::Result<Self> {
        let rest_proxy = config
            .rest
            .as_ref()
            .map(RestProxy::new)
            .transpose()?
            .map(Arc::new);

        Ok(Self::with_parts(
            Arc::new(database),
            rest_proxy,
            config.project_name,
        ))
    }

    /// Create a gateway from an already shared provider and proxy
    pub fn with_parts(
        database: Arc<DB>,
        rest_proxy: Option<Arc<RestProxy>>,
        project_name: impl Into<String>,
    ) -> Self {
        let project = ProjectDescriptor {
            name: project_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.dialect(),
            rest_enabled: rest_proxy.is_some(),
        };

        Self {
            database,
            rest_proxy,
            project,
        }
    }

    /// Shared handle to the database provider, e.g. for closing the pool on shutdown
    pub fn database(&self) -> Arc<DB> {
        self.database.clone()
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router includes:
    /// - Query endpoints at `/meta/query` and `/meta/query/parameterized`
    /// - Table endpoints at `/meta/tables/*`
    /// - The project descriptor at `/meta/project`
    /// - The REST proxy at `/rest/*` (when configured)
    /// - Request tracing and permissive CORS
    pub fn into_router(self) -> Router {
        // Note: Axum 0.8 uses {param} syntax instead of :param
        let meta_router = Router::new()
            .route("/meta/query", post(execute_query_handler::<DB>))
            .route(
                "/meta/query/parameterized",
                post(execute_parameterized_handler::<DB>),
            )
            .route("/meta/tables", get(list_tables_handler::<DB>))
            .route(
                "/meta/tables/{schema}/{table}",
                get(table_metadata_handler::<DB>),
            )
            .route(
                "/meta/tables/{schema}/{table}/rows",
                post(table_rows_handler::<DB>),
            )
            .with_state(self.database);

        let project_router = Router::new()
            .route("/meta/project", get(project_handler))
            .with_state(Arc::new(self.project));

        let mut router = meta_router.merge(project_router);

        if let Some(rest_proxy) = self.rest_proxy {
            let proxy_router = Router::new()
                .route(REST_PREFIX, any(proxy_handler))
                .route(&format!("{}/{{*path}}", REST_PREFIX), any(proxy_handler))
                .with_state(rest_proxy);
            router = router.merge(proxy_router);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
    }
}

#[cfg(feature = "sqlite")]
impl GatewayLayer<SqliteProvider> {
    /// Create a gateway for SQLite
    ///
    /// # Arguments
    ///
    /// * `pool` - The SQLite connection pool
    /// * `config` - Gateway configuration
    pub fn sqlite(pool: sqlx::SqlitePool, config: GatewayConfig) -> crate::Result<Self> {
        Self::new(SqliteProvider::new(pool), config)
    }
}

#[cfg(feature = "postgres")]
impl GatewayLayer<PostgresProvider> {
    /// Create a gateway for PostgreSQL
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    /// * `config` - Gateway configuration
    pub fn postgres(pool: sqlx::PgPool, config: GatewayConfig) -> crate::Result<Self> {
        Self::new(PostgresProvider::new(pool), config)
    }
}
