//! Error types for Sentra Drift

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while ingesting signals or computing scores.
///
/// Insufficient data is never an error: the engine falls back instead.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Malformed signal record: {0}")]
    MalformedRecord(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
