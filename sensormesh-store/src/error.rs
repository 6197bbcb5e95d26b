//! Error types for sensormesh-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from log store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (append path).
    #[error("log record JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A complete line in the log file could not be decoded.
    #[error("corrupt log record at {path}:{line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid store address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("no log store found for address {address}")]
    NotFound { address: String },

    /// The backend cannot serve requests right now.
    #[error("log store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
