//! sensormesh core library: domain types, node configuration, filesystem layout.
//!
//! - [`types`]: newtypes, intervals, consume mode, [`Config`]
//! - [`config`]: load / save / init of `~/.sensormesh/config.yaml`
//! - [`paths`]: where everything lives under the sensormesh root
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::ConfigError;
pub use types::{Config, ConsumeMode, Intervals, NodeName, StoreConfig};
