use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::CronkeeperConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "cronkeeper.toml",
    "cronkeeper.yaml",
    "cronkeeper.yml",
    "cronkeeper.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CronkeeperConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./cronkeeper.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/cronkeeper/cronkeeper.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CronkeeperConfig::default()` if no config file is found or the
/// file cannot be parsed.
pub fn discover_and_load() -> CronkeeperConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return CronkeeperConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        CronkeeperConfig::default()
    })
}

/// Returns the user-global config directory (`~/.config/cronkeeper/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cronkeeper").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));

    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CronkeeperConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
