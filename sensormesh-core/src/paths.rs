//! Filesystem layout under `<home>/.sensormesh/`.
//!
//! ```text
//! ~/.sensormesh/
//!   config.yaml          (mode 0600)
//!   sensormesh.log       (default local sink)
//!   stores/<id>/<name>.jsonl
//! ```

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_SINK_FILE: &str = "sensormesh.log";
pub const DEFAULT_STORE_NAME: &str = "event";

pub fn sensormesh_root(home: &Path) -> PathBuf {
    home.join(".sensormesh")
}

pub fn config_path(home: &Path) -> PathBuf {
    sensormesh_root(home).join(CONFIG_FILE)
}

pub fn default_sink_path(home: &Path) -> PathBuf {
    sensormesh_root(home).join(DEFAULT_SINK_FILE)
}

pub fn default_stores_root(home: &Path) -> PathBuf {
    sensormesh_root(home).join("stores")
}
