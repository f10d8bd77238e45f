//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Redline.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `ConfigError`: No usable configuration (unsupported OS, bad table name, missing TLS files)
//! - `LookupFailed`: A named thing does not exist (unknown column, host with no saved credential)
//! - `ValidationFailed`: A stored or supplied value does not fit its field
//! - `ConnectionFailed`: No credential matches the filters, or the server is unreachable
//! - `StoreError`: The local credential store could not be read or written
//! - `CommandFailed`: Redis rejected a command
//! - `InvalidInput`: Malformed CLI input

use thiserror::Error;

/// Main error type for Redline operations
#[derive(Error, Debug)]
pub enum RedlineError {
    /// Configuration error (unsupported OS, invalid store settings, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A requested key, column, or host could not be found
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// A value is not valid for the field it is assigned to
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No connection could be made or selected
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Credential store (SQLite) failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Redis command failure
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RedlineError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::LookupFailed(_) => "LOOKUP_FAILED",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::StoreError(_) => "STORE_ERROR",
            Self::CommandFailed(_) => "COMMAND_FAILED",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Get human-readable error message
    ///
    /// Credentials are only ever referenced through their masked URI, so the
    /// message is safe to print.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a lookup error
    pub fn lookup_failed(message: impl Into<String>) -> Self {
        Self::LookupFailed(message.into())
    }

    /// Create a validation error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a credential store error
    pub fn store_error(message: impl Into<String>) -> Self {
        Self::StoreError(message.into())
    }

    /// Create a command failed error
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::CommandFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<rusqlite::Error> for RedlineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreError(err.to_string())
    }
}

/// Result type alias for Redline operations
pub type Result<T> = std::result::Result<T, RedlineError>;
