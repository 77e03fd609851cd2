//! CLI module for the trade-dedupe binary
//!
//! ## Commands
//!
//! - `trade-dedupe run` - Walk the three clustering stages interactively
//! - `trade-dedupe status` - Show a saved registry snapshot
//!
//! ## Configuration
//!
//! Settings come from `--config <file.toml>`, otherwise from the environment:
//!
//! - `TRADE_DEDUPE_API_URL` - API endpoint (default: `http://localhost:5000`)
//! - `TRADE_DEDUPE_API_TOKEN` - Bearer token
//! - `TRADE_DEDUPE_TIMEOUT` - Request timeout in seconds

pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pipeline::ClientConfig;

/// Sequential fuzzy deduplication of trade data
#[derive(Debug, Parser)]
#[command(name = "trade-dedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file; environment variables are used when absent
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API server URL, overrides the config
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve the effective client configuration
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        let config = match &self.config {
            Some(path) => ClientConfig::from_toml_file(path)
                .map_err(|e| CliError::ConfigError(path.clone(), e.to_string()))?,
            None => ClientConfig::from_env()?,
        };
        match &self.api_url {
            Some(url) => {
                let config = config.with_base_url(url.clone());
                config.validate()?;
                Ok(config)
            }
            None => Ok(config),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the clustering stages interactively
    Run(commands::run::RunArgs),
    /// Show the handles stored in a state file
    Status(commands::status::StatusArgs),
}
