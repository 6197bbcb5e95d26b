//! `sensormesh init --name <node> [--logfile <path>] [--force]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sensormesh_core::{config, paths, NodeName};

/// Write the node configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Display name of this node, stamped into every reading.
    #[arg(long, short = 'n')]
    pub name: String,

    /// Local file the daemon mirrors log entries into
    /// (default: ~/.sensormesh/sensormesh.log).
    #[arg(long, value_name = "PATH")]
    pub logfile: Option<PathBuf>,

    /// Replace an existing configuration.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let requested = self.name.clone();
        let existed = paths::config_path(&home).exists();

        let cfg = config::init_at(&home, NodeName::from(self.name), self.logfile, self.force)
            .with_context(|| format!("failed to initialize node '{requested}'"))?;

        if existed && !self.force {
            println!(
                "{} configuration already exists for node '{}'; use --force to replace it",
                "[!]".yellow(),
                cfg.name
            );
        } else {
            println!("{} Initialized node '{}'", "[+]".green(), cfg.name);
        }
        println!("    Config:   {}", paths::config_path(&home).display());
        println!("    Log file: {}", cfg.logfile.display());
        Ok(())
    }
}
