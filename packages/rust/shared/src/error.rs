//! Error types for StudyAid.
//!
//! Library crates use [`StudyAidError`] via `thiserror`.
//! The server maps it onto HTTP responses; `main` wraps it with `color-eyre`.

use std::path::PathBuf;

/// Top-level error type for all StudyAid operations.
#[derive(Debug, thiserror::Error)]
pub enum StudyAidError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external capability.
    #[error("network error: {0}")]
    Network(String),

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text generation error (API, response shape, or validation).
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller input failed validation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An external capability is not configured.
    #[error("{0} is not configured")]
    Unavailable(String),

    /// The requested record does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credentials or session token rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StudyAidError>;

impl StudyAidError {
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
}
