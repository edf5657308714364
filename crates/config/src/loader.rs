use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::{substitute_env, substitute_env_with},
    schema::SimarglConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "simargl.toml",
    "simargl.yaml",
    "simargl.yml",
    "simargl.json",
];

pub const ENV_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_TTL_HOURS: &str = "CHANNEL_METADATA_TTL_HOURS";
pub const ENV_REGISTRY_PATH: &str = "CHANNEL_REGISTRY_PATH";
pub const ENV_DATA_DIR: &str = "SIMARGL_DATA_DIR";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SimarglConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Same as [`load_config`] with a custom variable lookup.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<SimarglConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env_with(&raw, lookup);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply
/// environment overrides.
///
/// Search order:
/// 1. `./simargl.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/simargl/simargl.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `SimarglConfig::default()` when no file is found or the
/// file fails to parse.
pub fn discover_and_load() -> SimarglConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                SimarglConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            SimarglConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Overlay environment variables on a loaded config.
///
/// Blank values are ignored; an unparsable TTL is logged and ignored.
pub fn apply_env_overrides(config: &mut SimarglConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = lookup(ENV_API_KEY) {
        config.youtube.api_key = Some(Secret::new(key.trim().to_string()));
    }
    if let Some(raw) = lookup(ENV_TTL_HOURS) {
        match raw.trim().parse::<f64>() {
            Ok(hours) => config.registry.ttl_hours = hours,
            Err(e) => warn!(var = ENV_TTL_HOURS, value = %raw, error = %e, "ignoring invalid TTL override"),
        }
    }
    if let Some(path) = lookup(ENV_REGISTRY_PATH) {
        config.registry.path = Some(PathBuf::from(path.trim()));
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/simargl/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "simargl").map(|d| d.config_dir().to_path_buf())
}

/// Directory for the registry store and memory log.
///
/// `SIMARGL_DATA_DIR` wins, then the platform data dir, then `./.simargl`.
pub fn data_dir() -> PathBuf {
    data_dir_with(|name| std::env::var(name).ok())
}

pub fn data_dir_with(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
        return PathBuf::from(dir.trim());
    }
    directories::ProjectDirs::from("", "", "simargl")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".simargl"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SimarglConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
