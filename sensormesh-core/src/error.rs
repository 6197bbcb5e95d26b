//! Error types for sensormesh-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, read-only filesystem, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No configuration file yet.
    #[error("configuration not found at {path}; run `sensormesh init` first")]
    NotFound { path: PathBuf },

    /// Node names end up in log payloads and must be printable.
    #[error("invalid node name '{0}': must be non-empty and contain no control characters")]
    InvalidName(String),

    /// Intervals must be positive and the consumer must poll faster than the producer.
    #[error("invalid intervals: produce={produce_ms}ms consume={consume_ms}ms (need 0 < consume < produce)")]
    InvalidIntervals { produce_ms: u64, consume_ms: u64 },
}
