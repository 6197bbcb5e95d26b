//! sensormesh: replicate sensor readings through a shared append-only log.
//!
//! # Usage
//!
//! ```text
//! sensormesh init --name <node> [--logfile <path>] [--force]
//! sensormesh daemon [--storeaddress <address|name>] [--produce-interval <ms>]
//!                   [--consume-interval <ms>] [--catch-up]
//! sensormesh config
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, daemon::DaemonArgs, init::InitArgs};

#[derive(Parser, Debug)]
#[command(
    name = "sensormesh",
    version,
    about = "Log sensor readings to a log shared between peer nodes",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the node configuration file.
    Init(InitArgs),

    /// Run the producer and consumer loops in the foreground until Ctrl-C.
    Daemon(DaemonArgs),

    /// Print the current node configuration.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Daemon(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
