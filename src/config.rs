//! Registry configuration from flags and environment variables.

use crate::registry::{domain::SelectionPolicy, services::HealthSettings};
use clap::{ArgAction, Parser};
use std::time::Duration;

/// Command-line and environment configuration of the registry server.
#[derive(Debug, Clone, Parser)]
#[command(name = "registry", version, about = "MCP mesh registry", long_about = None)]
pub struct RegistryConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "localhost")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Postgres connection URL; the in-memory store is used when absent.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long = "db-max-connections", env = "DB_MAX_OPEN_CONNECTIONS", default_value_t = 25)]
    pub db_max_connections: u32,

    /// Seconds without a heartbeat before an agent is marked unhealthy.
    #[arg(long, env = "DEFAULT_TIMEOUT_THRESHOLD", default_value_t = 60)]
    pub default_timeout_threshold: u64,

    /// Seconds an agent may stay unhealthy before eviction; `0` disables.
    #[arg(long, env = "DEFAULT_EVICTION_THRESHOLD", default_value_t = 120)]
    pub default_eviction_threshold: u64,

    /// Seconds between health sweeps.
    #[arg(long, env = "HEALTH_CHECK_INTERVAL", default_value_t = 30)]
    pub health_check_interval: u64,

    /// Agents silent for this many seconds are marked unhealthy at startup.
    #[arg(long, env = "STARTUP_CLEANUP_THRESHOLD", default_value_t = 30)]
    pub startup_cleanup_threshold: u64,

    /// Tie-break between equally scored providers.
    #[arg(long, env = "SELECTION_POLICY", default_value = "most_recent_heartbeat")]
    pub selection_policy: SelectionPolicy,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "MCP_MESH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Allow cross-origin requests from any origin.
    #[arg(long, env = "ENABLE_CORS", default_value_t = true, action = ArgAction::Set)]
    pub enable_cors: bool,
}

impl RegistryConfig {
    /// Returns the `host:port` pair to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the health monitor thresholds.
    #[must_use]
    pub const fn health_settings(&self) -> HealthSettings {
        HealthSettings::new(
            Duration::from_secs(self.default_timeout_threshold),
            Duration::from_secs(self.default_eviction_threshold),
            Duration::from_secs(self.startup_cleanup_threshold),
        )
    }

    /// Returns the sweep interval, never shorter than one second.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval.max(1))
    }
}
