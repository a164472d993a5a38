//! Configuration management for the warden CLI.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults. This follows the 12-factor app pattern.
//!
//! # Example
//!
//! ```ignore
//! use crate::config::WardenConfig;
//!
//! // Load from file with env overrides
//! let config = WardenConfig::load("warden.yaml")?;
//!
//! // Or load from environment only
//! let config = WardenConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct WardenConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Decision cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Engine settings
    #[serde(default)]
    pub rbac: RbacSettings,
}

/// Storage backend settings.
///
/// These settings can be overridden via environment variables with the
/// `WARDEN_` prefix and `__` as the nested key separator:
///
/// - `WARDEN_STORAGE__BACKEND=postgres`
/// - `WARDEN_STORAGE__DATABASE_URL=postgres://localhost/warden`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type: "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database connection URL (required if backend is "postgres")
    pub database_url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: None,
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Decision cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Enable the decision cache
    #[serde(default)]
    pub enabled: bool,

    /// Entry TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

/// Engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RbacSettings {
    /// Guard used when none is given on the command line
    #[serde(default = "default_guard")]
    pub default_guard: String,

    /// Role name that authorize treats as an unconditional allow
    pub super_admin_role: Option<String>,
}

impl Default for RbacSettings {
    fn default() -> Self {
        Self {
            default_guard: default_guard(),
            super_admin_role: None,
        }
    }
}

fn default_guard() -> String {
    warden_domain::DEFAULT_GUARD.to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl WardenConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `WARDEN_` and use `__` as
    /// separator. For example:
    /// - `WARDEN_LOGGING__LEVEL=debug` overrides `logging.level`
    /// - `WARDEN_STORAGE__DATABASE_URL=...` overrides `storage.database_url`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&WardenConfig::default())?)
            // Add config file
            .add_source(File::from(path).format(FileFormat::Yaml))
            // Add environment variables with WARDEN_ prefix
            // Use __ as separator for nested keys: WARDEN_CACHE__TTL_SECS -> cache.ttl_secs
            .add_source(
                Environment::with_prefix("WARDEN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let warden_config: WardenConfig = config.try_deserialize()?;
        warden_config.validate()?;

        Ok(warden_config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via WARDEN_ prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&WardenConfig::default())?)
            .add_source(
                Environment::with_prefix("WARDEN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let warden_config: WardenConfig = config.try_deserialize()?;
        warden_config.validate()?;

        Ok(warden_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["memory", "postgres"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        if self.storage.backend == "postgres"
            && self
                .storage
                .database_url
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid {
                message: "storage.database_url is required when backend is 'postgres'".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "cache.ttl_secs must be greater than 0 when the cache is enabled"
                    .to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test: Can load config from YAML file
    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
storage:
  backend: memory
  pool_size: 20

logging:
  level: debug
  json: true

cache:
  enabled: true
  ttl_secs: 60

rbac:
  default_guard: api
  super_admin_role: root
"#
        )
        .unwrap();

        let config = WardenConfig::load(file.path()).unwrap();

        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.pool_size, 20);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.rbac.default_guard, "api");
        assert_eq!(config.rbac.super_admin_role.as_deref(), Some("root"));
    }

    /// Test: Can override config with env vars
    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
storage:
  backend: memory

logging:
  level: info
"#
        )
        .unwrap();

        std::env::set_var("WARDEN_LOGGING__LEVEL", "warn");
        std::env::set_var("WARDEN_CACHE__TTL_SECS", "120");

        let config = WardenConfig::load(file.path()).unwrap();

        std::env::remove_var("WARDEN_LOGGING__LEVEL");
        std::env::remove_var("WARDEN_CACHE__TTL_SECS");

        assert_eq!(config.logging.level, "warn"); // Overridden by env
        assert_eq!(config.cache.ttl_secs, 120); // Overridden by env
        assert_eq!(config.storage.backend, "memory"); // From file
    }

    /// Test: Config validation catches errors
    #[test]
    fn test_config_validation_catches_errors() {
        // Invalid storage backend
        let mut config = WardenConfig::default();
        config.storage.backend = "invalid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.backend"));

        // Postgres without database_url
        let mut config = WardenConfig::default();
        config.storage.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database_url"));

        // Postgres with whitespace-only database_url
        let mut config = WardenConfig::default();
        config.storage.backend = "postgres".to_string();
        config.storage.database_url = Some("   ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database_url"));

        // Invalid log level
        let mut config = WardenConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));

        // Zero TTL with the cache enabled
        let mut config = WardenConfig::default();
        config.cache.enabled = true;
        config.cache.ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ttl_secs"));
    }

    /// Test: Invalid config returns clear error
    #[test]
    fn test_invalid_config_returns_clear_error() {
        let result = WardenConfig::load("/nonexistent/path/warden.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();

        let result = WardenConfig::load(file.path());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    /// Test: Default config is valid
    #[test]
    fn test_default_config_is_valid() {
        let config = WardenConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.rbac.default_guard, "web");
        assert!(config.rbac.super_admin_role.is_none());
    }

    /// Test: from_env loads defaults with env overrides
    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("WARDEN_RBAC__DEFAULT_GUARD", "api");

        let config = WardenConfig::from_env().unwrap();

        std::env::remove_var("WARDEN_RBAC__DEFAULT_GUARD");

        assert_eq!(config.rbac.default_guard, "api");
        assert_eq!(config.storage.backend, "memory"); // default
    }
}
