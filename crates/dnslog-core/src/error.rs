//! Error types for the DNSLog client
//!
//! This module defines the library-level error type. Failures of individual
//! backend calls are not represented here: they are classified into
//! [`ApiError`](crate::classify::ApiError) by the request gateway.

use thiserror::Error;

/// Result type alias for DNSLog client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNSLog client
#[derive(Error, Debug)]
pub enum Error {
    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Why a persisted session could not be restored
///
/// Restoring is never fatal: callers receive this error and decide to fall
/// back to the default session explicitly.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// The durable store could not be read
    #[error("failed to read persisted session: {0}")]
    Storage(#[source] Error),

    /// The persisted blob is not valid JSON
    #[error("persisted session is not valid JSON: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// The merged tree does not match the session shape
    #[error("persisted session does not match the session shape: {0}")]
    Shape(#[source] serde_json::Error),
}
