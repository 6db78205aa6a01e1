use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::AppConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "actiongraph.toml",
    "actiongraph.yaml",
    "actiongraph.yml",
    "actiongraph.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./actiongraph.{toml,yaml,yml,json}`
/// 2. `~/.config/actiongraph/actiongraph.{toml,yaml,yml,json}`
///
/// Returns `AppConfig::default()` if no config file is found. A file that
/// exists but fails to parse is an error: serving with silently different
/// options is worse than not starting.
pub fn discover_and_load() -> anyhow::Result<AppConfig> {
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(AppConfig::default())
        },
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/actiongraph/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "actiongraph").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let config: AppConfig = match ext {
        "toml" => toml::from_str(raw)?,
        "yaml" | "yml" => serde_yaml::from_str(raw)?,
        "json" => serde_json::from_str(raw)?,
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    };

    let diagnostics = crate::validate::validate(&config);
    for d in &diagnostics {
        warn!(path = %d.path, "{}", d.message);
    }
    if let Some(first) = diagnostics.iter().find(|d| d.is_error()) {
        anyhow::bail!("{}: {}: {}", path.display(), first.path, first.message);
    }
    Ok(config)
}
