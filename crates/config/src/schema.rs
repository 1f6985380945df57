//! Config schema types.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronkeeperConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub metrics: MetricsConfig,
}

/// Where job and run records are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL. The file is created if it does not exist.
    pub url: String,
    /// Pool size shared by all scheduler loops.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cronkeeper.db".into(),
            max_connections: 5,
        }
    }
}

/// Built-in jobs the binary registers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub heartbeat: HeartbeatJobConfig,
}

/// A trivial job that records a run on a fixed interval, useful to confirm a
/// deployment is alive from the run history alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatJobConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for HeartbeatJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address for the Prometheus `/metrics` listener, e.g. `127.0.0.1:9464`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}
