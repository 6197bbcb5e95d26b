//! Node configuration store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.sensormesh/
//!   config.yaml   (mode 0600, directory 0700)
//! ```
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; the daemon and tests pass one
//! - `load()`: derives home from `dirs::home_dir()`, delegates to `load_at`

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ConfigError;
use crate::paths::{config_path, default_sink_path, sensormesh_root};
use crate::types::{Config, ConsumeMode, Intervals, NodeName, StoreConfig};

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.sensormesh/config.yaml`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path)
/// if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path(home);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 2. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the configuration, bumping `updated_at`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &mut Config) -> Result<(), ConfigError> {
    let root = sensormesh_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }

    config.updated_at = Utc::now();
    let path = config_path(home);
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

/// Create the configuration for node `name`.
///
/// Idempotent: if a configuration already exists it is returned unchanged,
/// unless `force` is set, in which case it is replaced.
pub fn init_at(
    home: &Path,
    name: NodeName,
    logfile: Option<PathBuf>,
    force: bool,
) -> Result<Config, ConfigError> {
    name.validate()?;

    if config_path(home).exists() && !force {
        return load_at(home);
    }

    let now = Utc::now();
    let mut config = Config {
        name,
        logfile: logfile.unwrap_or_else(|| default_sink_path(home)),
        store: StoreConfig::default(),
        intervals: Intervals::default(),
        consume_mode: ConsumeMode::default(),
        created_at: now,
        updated_at: now,
    };
    save_at(home, &mut config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
