//! CLI error types

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load config {0}: {1}")]
    ConfigError(PathBuf, String),

    #[error("State file not found: {0}")]
    StateNotFound(PathBuf),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
