//! Configuration loading and env substitution.
//!
//! Config files: `simargl.toml`, `simargl.yaml`, or `simargl.json`
//! Searched in `./` then `~/.config/simargl/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, plus
//! `YOUTUBE_API_KEY`, `CHANNEL_METADATA_TTL_HOURS` and
//! `CHANNEL_REGISTRY_PATH` overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config,
    },
    schema::{MemoryConfig, RegistryConfig, SimarglConfig, YoutubeConfig},
};
