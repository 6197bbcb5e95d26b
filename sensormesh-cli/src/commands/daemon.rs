//! `sensormesh daemon`: run the producer and consumer loops in the foreground.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sensormesh_core::{paths, ConsumeMode};
use sensormesh_daemon::{start_blocking, CancelReason, DaemonOptions};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Address of the log store, or a name to open or create
    /// (default: the address saved by the last run, else 'event').
    #[arg(long = "storeaddress", value_name = "ADDRESS")]
    pub store_address: Option<String>,

    /// Milliseconds between appends to the shared log.
    #[arg(long, value_name = "MS")]
    pub produce_interval: Option<u64>,

    /// Milliseconds between polls of the shared log.
    #[arg(long, value_name = "MS")]
    pub consume_interval: Option<u64>,

    /// Mirror every new entry since the last poll, not only the newest.
    #[arg(long)]
    pub catch_up: bool,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let options = DaemonOptions {
            store_address: self.store_address,
            produce_ms: self.produce_interval,
            consume_ms: self.consume_interval,
            consume_mode: self.catch_up.then_some(ConsumeMode::CatchUp),
        };

        println!(
            "{} Starting daemon with configuration {}",
            "[+]".green(),
            paths::config_path(&home).display()
        );
        println!("{} Press Ctrl+C to stop daemon", "[+]".green());

        let report = start_blocking(&home, options).context("daemon exited with error")?;

        if report.reason == CancelReason::Interrupt {
            println!("\n{} Interrupt signal received, terminating...", "[!]".yellow());
        }
        println!(
            "{} Store {}: appended {} entries, mirrored {} lines",
            "[+]".green(),
            report.store_address,
            report.appended,
            report.mirrored
        );
        Ok(())
    }
}
