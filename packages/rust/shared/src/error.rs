//! Error types for Starbrief.
//!
//! Library crates use [`StarbriefError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Starbrief operations.
#[derive(Debug, thiserror::Error)]
pub enum StarbriefError {
    /// Configuration loading or validation error. Fatal for a run.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a source or calling a service.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or text extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Summarizer failure (API error or unusable response).
    #[error("summarize error: {0}")]
    Summarize(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad date, empty id, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StarbriefError>;

impl StarbriefError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort a run before any task is scheduled.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Io { .. })
    }
}
