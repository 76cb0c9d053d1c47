//! Error types shared across Reelsmith crates.

use std::path::PathBuf;

/// Top-level error type for Reelsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Duration probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("Resource transaction failed: {message}")]
    Transaction { message: String },

    #[error("Could not load document {path}: {message}")]
    StructuralLoad { path: PathBuf, message: String },

    #[error("Resource identifier space exhausted")]
    IdentifierExhausted,

    #[error("Invalid time value '{value}': {message}")]
    InvalidTime { value: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ForgeError.
pub type ForgeResult<T> = Result<T, ForgeError>;

impl ForgeError {
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction {
            message: msg.into(),
        }
    }

    pub fn structural_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::StructuralLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_time(value: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidTime {
            value: value.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the failed operation can be retried without touching the document.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InputNotFound { .. } | Self::Probe { .. })
    }
}
