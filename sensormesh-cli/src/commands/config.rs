//! `sensormesh config`: print the loaded configuration.

use anyhow::{Context, Result};
use clap::Args;

use sensormesh_core::config;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let cfg = config::load().context("failed to load configuration")?;
        print!(
            "{}",
            serde_yaml::to_string(&cfg).context("failed to render configuration")?
        );
        Ok(())
    }
}
