//! Domain-specific error types for reason-bench

use thiserror::Error;

/// Main error type for the evaluation harness
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Structure validation error: {message}")]
    Structure { message: String },

    #[error("Metric computation error: {message}")]
    Metric { message: String },

    #[error("Embedding provider error: {message}")]
    Embedding { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BenchError {
    /// True for the error classes the gateway is allowed to retry.
    /// Configuration and serialization failures are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BenchError::Transport { .. }
                | BenchError::Structure { .. }
                | BenchError::Timeout { .. }
        )
    }
}

impl From<anyhow::Error> for BenchError {
    fn from(err: anyhow::Error) -> Self {
        BenchError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BenchError::Timeout {
                operation: "completion request".to_string(),
                timeout_ms: 0,
            }
        } else {
            BenchError::Transport {
                message: format!("HTTP request failed: {}", err),
            }
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

/// Result type alias for reason-bench operations
pub type Result<T> = std::result::Result<T, BenchError>;
