//! Subcommand implementations.

pub mod batch;
pub mod cache;
pub mod config;
pub mod extract;

use std::path::{Path, PathBuf};

use fidex_core::FidexConfig;

const APP_DIR: &str = "fidex";

/// Default location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Defaults with cache and model directories under the user's data dirs.
pub fn default_config() -> FidexConfig {
    let mut config = FidexConfig::default();
    if let Some(cache_dir) = dirs::cache_dir() {
        config.cache.root_path = cache_dir.join(APP_DIR);
    }
    if let Some(data_dir) = dirs::data_dir() {
        config.ocr.model_dir = data_dir.join(APP_DIR).join("models");
    }
    config
}

/// Resolve the active configuration: explicit `--config`, then the user
/// config file, then [`default_config`].
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FidexConfig> {
    if let Some(path) = config_path {
        return Ok(FidexConfig::from_file(Path::new(path))?);
    }

    let user_config = default_config_path();
    if user_config.exists() {
        Ok(FidexConfig::from_file(&user_config)?)
    } else {
        Ok(default_config())
    }
}
