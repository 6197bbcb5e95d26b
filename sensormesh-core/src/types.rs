//! Domain types for a sensormesh node.
//!
//! All path fields use `PathBuf`; all types round-trip through serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Display name of this node, stamped into every reading it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.trim().is_empty() || self.0.chars().any(char::is_control) {
            return Err(ConfigError::InvalidName(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for NodeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the consumer decides which log entries to mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumeMode {
    /// Mirror only the newest entry of each poll, if it differs from the last one mirrored.
    #[default]
    Newest,
    /// Mirror every entry newer than the last one seen, oldest first.
    CatchUp,
}

impl fmt::Display for ConsumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeMode::Newest => write!(f, "newest"),
            ConsumeMode::CatchUp => write!(f, "catch-up"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration structs
// ---------------------------------------------------------------------------

/// Loop cadence, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    pub produce_ms: u64,
    pub consume_ms: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            produce_ms: 30_000,
            consume_ms: 500,
        }
    }
}

impl Intervals {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consume_ms == 0 || self.consume_ms >= self.produce_ms {
            return Err(ConfigError::InvalidIntervals {
                produce_ms: self.produce_ms,
                consume_ms: self.consume_ms,
            });
        }
        Ok(())
    }

    pub fn produce(&self) -> Duration {
        Duration::from_millis(self.produce_ms)
    }

    pub fn consume(&self) -> Duration {
        Duration::from_millis(self.consume_ms)
    }
}

/// Where the shared log lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Resolved address from the last run, or a store name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Root directory holding store files; defaults to `~/.sensormesh/stores`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Newest entry id the consumer handled at `address`; the next run
    /// resumes after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl StoreConfig {
    /// Saved cursor, if it belongs to the store at `address`.
    pub fn cursor_for(&self, address: &str) -> Option<&str> {
        if self.address.as_deref() == Some(address) {
            self.cursor.as_deref()
        } else {
            None
        }
    }
}

/// Root of `~/.sensormesh/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub name: NodeName,
    /// Local sink file the consumer mirrors entries into.
    pub logfile: PathBuf,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub intervals: Intervals,
    #[serde(default)]
    pub consume_mode: ConsumeMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.name.validate()?;
        self.intervals.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
