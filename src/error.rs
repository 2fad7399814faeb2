//! Error types for ChatVault
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for ChatVault operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, remote backend interactions, and storage
/// tier operations.
#[derive(Error, Debug)]
pub enum ChatVaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote chat backend errors (API calls, timeouts, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Storage tier errors (database operations in either tier)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image codec errors (marker extraction or restoration)
    #[error("Codec error: {0}")]
    Codec(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for ChatVault operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
