use std::path::PathBuf;

use thiserror::Error;

use sensormesh_core::ConfigError;
use sensormesh_store::StoreError;

/// Error surface for daemon setup and the two loops.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("log store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to put in log store: {0}")]
    Append(#[source] StoreError),

    #[error("failed to get list from log store: {0}")]
    Fetch(#[source] StoreError),

    #[error("failed to write local sink {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("interrupt handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn sink_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Sink {
        path: path.into(),
        source,
    }
}
