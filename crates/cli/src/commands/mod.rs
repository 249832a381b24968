pub mod chat;
pub mod reset;
pub mod serve;
pub mod tools;

use recruitr_config::AppConfig;
use std::path::Path;

/// Load the config file (default location unless `path` is given), apply
/// environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}
