//! Error types for hubpress.
//!
//! Library crates use [`HubError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all hubpress operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Malformed source document (missing metadata delimiters, bad YAML).
    #[error("format error: {message}")]
    Format { message: String },

    /// A table row is missing a required field or carries an unusable value.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Remote fetch, listing, or download failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration loading or missing credential.
    #[error("config error: {message}")]
    Config { message: String },

    /// External renderer failed or produced no output.
    #[error("render error: {0}")]
    Render(String),

    /// Attachment archive could not be read or extracted.
    #[error("archive error: {0}")]
    Archive(String),

    /// Data validation error (unexpected payload shape, invalid value).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    /// Create a format error from any displayable message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            message: msg.into(),
        }
    }

    /// Create a schema error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
