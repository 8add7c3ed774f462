//! Gateway configuration
//!
//! Connection pool sizing, the REST upstream and the project descriptor are
//! supplied by the hosting binary; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded connection pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolSettings {
    /// Maximum concurrent connections
    pub max_connections: u32,

    /// How long to wait for a free connection before failing
    pub acquire_timeout_milliseconds: u64,

    /// Idle time after which a connection is closed
    pub idle_timeout_milliseconds: u64,

    /// Maximum lifetime of a single connection
    pub max_lifetime_milliseconds: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_milliseconds: 2_000,
            idle_timeout_milliseconds: 30_000,
            max_lifetime_milliseconds: 600_000,
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_milliseconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_milliseconds)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_lifetime_milliseconds)
    }
}

/// Upstream REST-over-SQL service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestSettings {
    /// Base URL requests are forwarded to (e.g. `http://localhost:3001`)
    pub upstream_base_url: String,

    /// Optional outbound request timeout; reqwest's defaults apply otherwise
    #[serde(default)]
    pub timeout_milliseconds: Option<u64>,
}

impl RestSettings {
    pub fn new(upstream_base_url: impl Into<String>) -> Self {
        Self {
            upstream_base_url: upstream_base_url.into(),
            timeout_milliseconds: None,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub pool: PoolSettings,

    /// REST proxy upstream; the `/rest` routes are only mounted when set
    #[serde(default)]
    pub rest: Option<RestSettings>,

    /// Project name reported by `GET /meta/project`
    #[serde(default = "default_project_name")]
    pub project_name: String,
}

fn default_project_name() -> String {
    "sql-gateway".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            rest: None,
            project_name: default_project_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_defaults_match_documented_values() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.acquire_timeout(), Duration::from_secs(2));
        assert_eq!(settings.idle_timeout(), Duration::from_secs(30));
        assert_eq!(settings.max_lifetime(), Duration::from_secs(600));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{"pool": {"maxConnections": 4}, "rest": {"upstreamBaseUrl": "http://localhost:3001"}}"#,
        )
        .unwrap();

        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.pool.acquire_timeout_milliseconds, 2_000);
        assert_eq!(
            config.rest,
            Some(RestSettings::new("http://localhost:3001"))
        );
        assert_eq!(config.project_name, "sql-gateway");
    }
}
