//! Configuration management for ChatVault
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatVaultError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for ChatVault
///
/// This structure holds all configuration needed for the client,
/// including the remote backend settings and the storage tier tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote chat backend configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Storage tier configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote chat backend configuration
///
/// The backend is an opaque request/response collaborator: it receives a
/// prompt plus a conversation id and returns generated text (optionally
/// with embedded image markers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chat backend
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model selector forwarded with each generation request
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Optional bearer token handed off to the backend
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            timeout_seconds: default_request_timeout(),
            auth_token: None,
        }
    }
}

/// Storage tier configuration
///
/// Controls where the two tiers live on disk and when the usage monitor
/// starts reclaiming image space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory override (defaults to the platform data dir)
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Usage threshold that triggers an eviction pass (bytes)
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark_bytes: u64,

    /// Usage target an eviction pass drives down to (bytes)
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark_bytes: u64,

    /// Interval between automatic cleanup passes (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_high_water_mark() -> u64 {
    500 * 1024 * 1024
}

fn default_low_water_mark() -> u64 {
    400 * 1024 * 1024
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            high_water_mark_bytes: default_high_water_mark(),
            low_water_mark_bytes: default_low_water_mark(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl StorageConfig {
    /// Cleanup interval as a [`Duration`]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatVaultError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatVaultError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("CHATVAULT_API_BASE") {
            self.provider.api_base = api_base;
        }

        if let Ok(model) = std::env::var("CHATVAULT_MODEL") {
            self.provider.model = model;
        }

        if let Ok(token) = std::env::var("CHATVAULT_AUTH_TOKEN") {
            self.provider.auth_token = Some(token);
        }

        if let Ok(data_dir) = std::env::var("CHATVAULT_DATA_DIR") {
            self.storage.data_dir = Some(data_dir);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.storage_path {
            self.storage.data_dir = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Returns
    ///
    /// Returns Ok if configuration is valid
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.api_base.is_empty() {
            return Err(ChatVaultError::Config("api_base cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.provider.api_base)
            .map_err(|e| ChatVaultError::Config(format!("Invalid api_base URL: {}", e)))?;

        if self.provider.timeout_seconds == 0 {
            return Err(
                ChatVaultError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.storage.high_water_mark_bytes == 0 {
            return Err(ChatVaultError::Config(
                "high_water_mark_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.low_water_mark_bytes >= self.storage.high_water_mark_bytes {
            return Err(ChatVaultError::Config(
                "low_water_mark_bytes must be below high_water_mark_bytes".to_string(),
            )
            .into());
        }

        if self.storage.cleanup_interval_seconds == 0 {
            return Err(ChatVaultError::Config(
                "cleanup_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_water_marks() {
        let config = Config::default();
        assert_eq!(config.storage.high_water_mark_bytes, 500 * 1024 * 1024);
        assert_eq!(config.storage.low_water_mark_bytes, 400 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_empty_api_base() {
        let mut config = Config::default();
        config.provider.api_base = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_api_base() {
        let mut config = Config::default();
        config.provider.api_base = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_water_marks() {
        let mut config = Config::default();
        config.storage.high_water_mark_bytes = 100;
        config.storage.low_water_mark_bytes = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cleanup_interval() {
        let mut config = Config::default();
        config.storage.cleanup_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let yaml = r#"
provider:
  api_base: "http://localhost:9000"
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse failed");
        assert_eq!(config.provider.api_base, "http://localhost:9000");
        assert_eq!(config.provider.model, "default");
        assert_eq!(config.storage.high_water_mark_bytes, 500 * 1024 * 1024);
    }

    #[test]
    fn test_cli_storage_path_overrides_data_dir() {
        let mut config = Config::default();
        let cli = Cli {
            storage_path: Some("/tmp/chatvault-test".to_string()),
            ..Cli::default()
        };
        config.apply_cli_overrides(&cli);
        assert_eq!(config.storage.data_dir.as_deref(), Some("/tmp/chatvault-test"));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let cli = Cli::default();
        let config = Config::load("/nonexistent/config.yaml", &cli).expect("load failed");
        assert_eq!(config.provider.model, "default");
    }
}
