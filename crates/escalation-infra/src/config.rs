//! Configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.escalation/` in
//! production) and deserializes it into [`AppConfig`]. Falls back to
//! defaults when the file is missing or malformed, or when the calendar
//! settings do not parse.

use std::path::Path;

use escalation_core::calendar::validate_config;
use escalation_types::config::AppConfig;

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    let mut config = match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            return AppConfig::default();
        }
    };

    if let Err(err) = validate_config(&config.calendar) {
        tracing::warn!("Invalid [calendar] in {}: {err}, using calendar defaults", config_path.display());
        config.calendar = Default::default();
    }
    config
}
