//! Configuration loading and env substitution.
//!
//! Config files: `cronkeeper.toml`, `cronkeeper.yaml`, or `cronkeeper.json`
//! Searched in `./` then `~/.config/cronkeeper/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{CronkeeperConfig, DatabaseConfig, HeartbeatJobConfig, MetricsConfig, SchedulerConfig},
};
