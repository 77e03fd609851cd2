//! trade-dedupe CLI
//!
//! Entry point for the `trade-dedupe` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trade_dedupe_sdk::cli::{Cli, Commands, commands};

fn main() -> Result<()> {
    // Logs go to stderr so they do not interleave with the stage table
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.client_config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Run(args) => commands::run::execute(args, config).await,
            Commands::Status(args) => commands::status::execute(args),
        }
    })
}
