//! JSON Output Envelope Types
//!
//! Every CLI invocation prints exactly one envelope on stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "target": "...", "command": "...", "data": ..., "meta": {...}}`
//! - Error: `{"ok": false, "target": "...", "command": "...", "error": {"code": "...", "message": "..."}}`
//!
//! `target` is the masked connection URI (empty when no connection was resolved).

use serde::{Deserialize, Serialize};

use crate::error::RedlineError;

/// Success envelope for operation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Masked URI of the connection used
    pub target: String,

    /// Command that was executed (ping, get, set, register, list)
    pub command: String,

    pub data: T,

    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        target: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self {
            ok: true,
            target: target.into(),
            command: command.into(),
            data,
            meta,
        }
    }
}

/// Error envelope for operation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub target: String,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(target: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            target: target.into(),
            command: command.into(),
            error,
        }
    }

    /// Create error envelope from `RedlineError`
    pub fn from_error(
        target: impl Into<String>,
        command: impl Into<String>,
        err: &RedlineError,
    ) -> Self {
        Self::new(
            target,
            command,
            ErrorInfo {
                code: err.error_code().to_string(),
                message: err.message(),
            },
        )
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "LOOKUP_FAILED", "CONNECTION_FAILED")
    pub code: String,

    /// Human-readable error message (passwords are always masked)
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of stored credentials listed (only for `list`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<usize>,
}

impl Metadata {
    pub fn new(execution_ms: u64) -> Self {
        Self {
            execution_ms,
            credentials: None,
        }
    }

    pub fn with_credentials(execution_ms: u64, credentials: usize) -> Self {
        Self {
            execution_ms,
            credentials: Some(credentials),
        }
    }
}
