use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use clap::Parser;
use sql_gateway::schema::{ExecutionMode, Statement};
use sql_gateway::{
    DatabaseProvider, GatewayConfig, GatewayLayer, PoolSettings, PostgresProvider, RestSettings,
    SqliteProvider,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// HTTP server hosting the sql-gateway endpoints
#[derive(Debug, Parser)]
#[command(name = "gateway-server", version, about)]
struct Args {
    /// Database connection URL (`postgres://...` or `sqlite:...`)
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:gateway.db?mode=rwc")]
    database_url: String,

    /// Address to listen on
    #[arg(long, env = "GATEWAY_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Base URL of the REST-over-SQL upstream; `/rest` is disabled when unset
    #[arg(long, env = "REST_UPSTREAM_URL")]
    rest_upstream_url: Option<String>,

    /// Outbound timeout for proxied REST requests
    #[arg(long = "rest-timeout-ms", env = "REST_TIMEOUT_MS")]
    rest_timeout_milliseconds: Option<u64>,

    #[arg(long, env = "GATEWAY_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    #[arg(long = "acquire-timeout-ms", env = "GATEWAY_ACQUIRE_TIMEOUT_MS", default_value_t = 2_000)]
    acquire_timeout_milliseconds: u64,

    /// Close pooled connections idle for longer than this
    #[arg(long = "idle-timeout-ms", env = "GATEWAY_IDLE_TIMEOUT_MS", default_value_t = 30_000)]
    idle_timeout_milliseconds: u64,

    /// Recycle pooled connections after this lifetime
    #[arg(long = "max-lifetime-ms", env = "GATEWAY_MAX_LIFETIME_MS", default_value_t = 600_000)]
    max_lifetime_milliseconds: u64,

    #[arg(long, env = "GATEWAY_PROJECT_NAME", default_value = "sql-gateway")]
    project_name: String,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            pool: PoolSettings {
                max_connections: self.max_connections,
                acquire_timeout_milliseconds: self.acquire_timeout_milliseconds,
                idle_timeout_milliseconds: self.idle_timeout_milliseconds,
                max_lifetime_milliseconds: self.max_lifetime_milliseconds,
            },
            rest: self.rest_upstream_url.as_ref().map(|url| RestSettings {
                upstream_base_url: url.clone(),
                timeout_milliseconds: self.rest_timeout_milliseconds,
            }),
            project_name: self.project_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn")),
        )
        .init();

    let args = Args::parse();
    let config = args.gateway_config();

    if args.database_url.starts_with("postgres://") || args.database_url.starts_with("postgresql://")
    {
        let database = PostgresProvider::connect(&args.database_url, &config.pool)
            .await
            .context("Failed to connect to PostgreSQL")?;
        serve(database, config, args.bind).await
    } else if args.database_url.starts_with("sqlite:") {
        let database = SqliteProvider::connect(&args.database_url, &config.pool)
            .await
            .context("Failed to connect to SQLite database")?;
        serve(database, config, args.bind).await
    } else {
        anyhow::bail!("Unsupported database URL scheme: {}", args.database_url)
    }
}

async fn serve<DB: DatabaseProvider>(
    database: DB,
    config: GatewayConfig,
    bind: SocketAddr,
) -> anyhow::Result<()> {
    let rest_enabled = config.rest.is_some();
    let gateway = GatewayLayer::new(database, config).context("Failed to build REST proxy")?;
    let database = gateway.database();

    let app = Router::new()
        .route("/health", get(health_handler::<DB>))
        .with_state(database.clone())
        .merge(gateway.into_router());

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    tracing::info!(
        address = %bind,
        dialect = ?database.dialect(),
        rest_enabled,
        "Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    database.close().await;
    tracing::info!("Connection pool closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler<DB: DatabaseProvider>(
    State(database): State<Arc<DB>>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    // Verify database connectivity
    database
        .execute(&Statement::new("SELECT 1"), ExecutionMode::Autocommit)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}
