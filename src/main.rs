//! Entry point of the `falcon` command-line client.
//!
//! # Startup sequence
//!
//! 1. Parse arguments with clap.
//! 2. Initialise logging (`RUST_LOG` wins over `--verbose`).
//! 3. Load [`AppConfig`](falcon_client::config::AppConfig) and apply flag
//!    overrides.
//! 4. Dispatch the subcommand; any error exits non-zero.

mod cli;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();
    log::debug!("falcon client starting up");

    cli.run().await
}
