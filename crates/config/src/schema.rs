/// Config schema types (registry, youtube, memory).
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_REGISTRY_FILE: &str = "channel_registry.json";
pub const DEFAULT_MEMORY_FILE: &str = "channel_memory.jsonl";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimarglConfig {
    pub registry: RegistryConfig,
    pub youtube: YoutubeConfig,
    pub memory: MemoryConfig,
}

impl SimarglConfig {
    /// Registry store path, defaulting to a file under `data_dir`.
    pub fn registry_path(&self, data_dir: &Path) -> PathBuf {
        self.registry
            .path
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_REGISTRY_FILE))
    }

    /// Channel memory log path, defaulting to a file under `data_dir`.
    pub fn memory_path(&self, data_dir: &Path) -> PathBuf {
        self.memory
            .path
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_MEMORY_FILE))
    }
}

/// Channel registry store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Store file. Defaults to `<data_dir>/channel_registry.json`.
    pub path: Option<PathBuf>,
    /// Hours before cached channel metadata is refetched.
    pub ttl_hours: f64,
}

impl RegistryConfig {
    /// TTL as a duration. NaN and non-positive values collapse to zero,
    /// which makes every record stale; `inf` and values too large for a
    /// `Duration` saturate to `Duration::MAX` (never expire).
    pub fn ttl(&self) -> Duration {
        let secs = self.ttl_hours * 3600.0;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_hours: 6.0,
        }
    }
}

/// YouTube Data API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// API key (overrides `YOUTUBE_API_KEY` env var when set in the file).
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    /// Per-request HTTP timeout; also bounds a whole refresh fetch.
    pub timeout_seconds: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Linear backoff step between retries.
    pub retry_backoff_ms: u64,
}

impl YoutubeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl std::fmt::Debug for YoutubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoutubeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".into(),
            timeout_seconds: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Channel fact memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Fact log. Defaults to `<data_dir>/channel_memory.jsonl`.
    pub path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
