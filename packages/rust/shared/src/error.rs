//! Error types for contentmcp.
//!
//! Library crates use [`ContentMcpError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Boxed cause carried by [`ContentMcpError::Upstream`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all contentmcp operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentMcpError {
    /// A required input field is missing or empty. Raised before any downstream call.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The content server or a scraped page failed (transport, status, decoding).
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A selector, node id, or content node did not match anything.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// An event could not be written to a streaming client.
    #[error("delivery to client {client_id} failed: {reason}")]
    Delivery { client_id: String, reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentMcpError>;

impl ContentMcpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Upstream failure without an underlying error value (e.g. a bad HTTP status).
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
            source: None,
        }
    }

    /// Upstream failure wrapping its cause.
    pub fn upstream_with(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn delivery(client_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            client_id: client_id.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// True for "no matching content" as opposed to "backend unreachable".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
