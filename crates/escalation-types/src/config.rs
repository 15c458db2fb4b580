//! Application configuration types.
//!
//! `AppConfig` represents the top-level `config.toml` that controls the API
//! server, the league calendar and the response cache.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.escalation/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// League week boundaries.
///
/// A league week ends at every `cutoff_weekday` at `cutoff_time` in
/// `timezone`. Card adds and removals are locked for `lock_hours` after each
/// cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Weekday name or abbreviation ("thursday", "thu").
    #[serde(default = "default_cutoff_weekday")]
    pub cutoff_weekday: String,

    /// Local time of day, `HH:MM`.
    #[serde(default = "default_cutoff_time")]
    pub cutoff_time: String,

    #[serde(default = "default_lock_hours")]
    pub lock_hours: u32,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_cutoff_weekday() -> String {
    "thursday".to_string()
}

fn default_cutoff_time() -> String {
    "18:00".to_string()
}

fn default_lock_hours() -> u32 {
    6
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            cutoff_weekday: default_cutoff_weekday(),
            cutoff_time: default_cutoff_time(),
            lock_hours: default_lock_hours(),
        }
    }
}

/// GET response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// How often expired entries are swept, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.calendar.timezone, "America/New_York");
        assert_eq!(config.calendar.cutoff_time, "18:00");
        assert_eq!(config.calendar.lock_hours, 6);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_app_config_deserialize_with_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.calendar.cutoff_weekday, "thursday");
    }

    #[test]
    fn test_app_config_deserialize_partial_sections() {
        let toml_str = r#"
[server]
port = 8080

[calendar]
timezone = "America/Chicago"
lock_hours = 12

[cache]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.calendar.timezone, "America/Chicago");
        assert_eq!(config.calendar.cutoff_time, "18:00");
        assert_eq!(config.calendar.lock_hours, 12);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.sweep_interval_secs, 60);
    }
}
