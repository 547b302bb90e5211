//! Host configuration
//!
//! How the `autoclick` process itself runs: which store backend to open,
//! the periodic rescan interval and the log level. This is separate from
//! the automation [`Settings`](crate::Settings), which live in the store.
//!
//! Settings are read with the following priority:
//! 1. Environment variables
//! 2. `autoclick.toml`
//! 3. Defaults
//!
//! `${VAR_NAME}` inside the TOML file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

pub const DEFAULT_CONFIG_FILE: &str = "autoclick.toml";
pub const MIN_TICK_INTERVAL_MS: u64 = 250;
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

/// Store backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file
    #[default]
    Sqlite,
    /// Process memory (lost on exit)
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" => Self::Memory,
            _ => Self::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Storage area the automation settings live in
    #[serde(default = "default_area")]
    pub area: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: default_db_path(),
            area: default_area(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Periodic rescan interval for active pages
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Default `tracing` filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration for the autoclick host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_db_path() -> String {
    "data/autoclick.db".to_string()
}

fn default_area() -> String {
    crate::store::DEFAULT_AREA.to_string()
}

fn default_tick_interval_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HostConfig {
    /// Replace `${VAR_NAME}` with the variable's value (empty when unset).
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    if !name.is_empty() {
                        if let Ok(env_value) = std::env::var(name) {
                            result.push_str(&env_value);
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Unterminated reference is kept verbatim.
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Parse a TOML document (after env expansion) into a normalized config.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let mut config: HostConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `./autoclick.toml` when present, otherwise defaults + environment.
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }
        Ok(Self::from_env())
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("AUTOCLICK_STORE") {
            if !backend.is_empty() {
                self.store.backend = StoreBackend::parse(&backend);
            }
        }
        if let Ok(path) = std::env::var("AUTOCLICK_DB_PATH") {
            if !path.is_empty() {
                self.store.db_path = path;
            }
        }
        if let Ok(tick) = std::env::var("AUTOCLICK_TICK_MS") {
            if let Ok(ms) = tick.trim().parse() {
                self.engine.tick_interval_ms = ms;
            }
        }
        if let Ok(level) = std::env::var("AUTOCLICK_LOG") {
            if !level.is_empty() {
                self.log.level = level;
            }
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.engine.tick_interval_ms = self
            .engine
            .tick_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        if self.store.area.trim().is_empty() {
            self.store.area = default_area();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_default() {
        let config = HostConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.db_path, "data/autoclick.db");
        assert_eq!(config.store.area, "local");
        assert_eq!(config.engine.tick_interval_ms, 2000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[store]
backend = "memory"
db_path = "/tmp/ac.db"

[engine]
tick_interval_ms = 10

[log]
level = "debug"
"#;
        let config = HostConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.db_path, "/tmp/ac.db");
        assert_eq!(config.store.area, "local");
        assert_eq!(config.engine.tick_interval_ms, MIN_TICK_INTERVAL_MS);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = HostConfig::from_toml_str("[log]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(config.engine.tick_interval_ms, 2000);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = HostConfig::from_toml_str("[store\nbackend=").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("AUTOCLICK_TEST_EXPAND_VAR", "value");
        }

        let result = HostConfig::expand_env_vars("a_${AUTOCLICK_TEST_EXPAND_VAR}_b");
        assert_eq!(result, "a_value_b");

        let result = HostConfig::expand_env_vars("a_${AUTOCLICK_TEST_NONEXISTENT}_b");
        assert_eq!(result, "a__b");

        unsafe {
            std::env::remove_var("AUTOCLICK_TEST_EXPAND_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_edge_cases() {
        assert_eq!(HostConfig::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(HostConfig::expand_env_vars("${}_content"), "_content");
        assert_eq!(HostConfig::expand_env_vars("tail ${OPEN"), "tail ${OPEN");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(StoreBackend::parse("MEMORY"), StoreBackend::Memory);
        assert_eq!(StoreBackend::parse("sqlite"), StoreBackend::Sqlite);
        assert_eq!(StoreBackend::parse("other"), StoreBackend::Sqlite);
    }
}
