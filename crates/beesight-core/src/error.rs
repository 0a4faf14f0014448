//! Core error types for beesight-core.
//!
//! Fatal errors (configuration, authentication, fetch failures) flow into
//! [`CoreError`]. Data-quality problems are [`FormatError`]s that the
//! reconciliation engine absorbs, and per-datapoint submission failures are
//! [`PostError`]s that the driver records without aborting the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for beesight-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session source login failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Fetching remote data failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Unknown dotted key passed to get/set
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Session source login errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The login endpoint (or the first authenticated request) refused us
    #[error("Login rejected by {service} (HTTP {status})")]
    Rejected { service: String, status: u16 },

    /// The login request never completed
    #[error("Login request to {service} failed: {message}")]
    Transport { service: String, message: String },
}

/// Malformed duration or timestamp data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Duration is neither the unset sentinel nor `M:S`
    #[error("Malformed duration '{0}': expected M:S or '-'")]
    Duration(String),

    /// Timestamp did not match the feed's layout
    #[error("Malformed timestamp '{raw}': {message}")]
    Timestamp { raw: String, message: String },

    /// Shifted local time does not exist in the host zone (DST gap)
    #[error("Local time '{0}' does not exist in the host time zone")]
    NonexistentLocalTime(String),
}

/// Errors fetching data from a remote service.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Non-success HTTP status
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or body read failure
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },

    /// Response body could not be decoded
    #[error("Unexpected response from {service}: {message}")]
    Decode { service: String, message: String },
}

/// Per-datapoint submission errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostError {
    /// Remote side rejected the datapoint
    #[error("Goal service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or body read failure
    #[error("Post request failed: {0}")]
    Transport(String),

    /// The datapoint carries no value (session had no duration)
    #[error("Datapoint at {timestamp} has no value")]
    MissingValue { timestamp: f64 },
}

impl GatewayError {
    pub(crate) fn transport(service: &str, err: impl std::fmt::Display) -> Self {
        GatewayError::Transport {
            service: service.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(service: &str, err: impl std::fmt::Display) -> Self {
        GatewayError::Decode {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PostError {
    fn from(err: reqwest::Error) -> Self {
        PostError::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
