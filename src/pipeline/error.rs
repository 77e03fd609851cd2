//! Error types for the deduplication pipeline
//!
//! Errors fall into three groups: fatal start-up problems (`MissingInput`),
//! recoverable operator-facing failures (threshold, clustering, apply), and
//! internal invariant violations (`InvalidTransition`).

use thiserror::Error;

use crate::models::StageColumn;

/// Errors that can occur while driving the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No cleaned dataset to start from
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Threshold outside the closed range [0, 1]
    #[error("Invalid threshold {0}: must be a number between 0 and 1")]
    InvalidThreshold(f64),

    /// Clustering request failed (network, server or malformed response)
    #[error("Clustering failed for column '{column}': {message}")]
    ClusteringFailed { column: StageColumn, message: String },

    /// Applying a suggestion failed; the suggestion is kept for retry
    #[error("Failed to apply suggestion for row {row}: {message}")]
    SuggestionApply { row: usize, message: String },

    /// Operation invoked in a state that does not allow it
    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    /// Empty or otherwise unusable dataset handle
    #[error("Invalid dataset handle: {0}")]
    InvalidHandle(String),

    /// Suggestion violating its invariants, or an unknown suggestion position
    #[error("Invalid suggestion: {0}")]
    InvalidSuggestion(String),

    /// Saved registry whose positions contradict the stage order
    #[error("Inconsistent pipeline state: {0}")]
    CorruptState(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create an invalid transition error
    pub fn invalid_transition(from: impl ToString, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }

    /// Create a clustering failure for a column
    pub fn clustering_failed(column: StageColumn, message: impl Into<String>) -> Self {
        Self::ClusteringFailed {
            column,
            message: message.into(),
        }
    }

    /// Create a suggestion apply failure for a row
    pub fn apply_failed(row: usize, message: impl Into<String>) -> Self {
        Self::SuggestionApply {
            row,
            message: message.into(),
        }
    }

    /// Check if the operator can recover from this error by retrying or correcting input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidThreshold(_)
                | PipelineError::ClusteringFailed { .. }
                | PipelineError::SuggestionApply { .. }
        )
    }

    /// Check if this error is a programming defect rather than a user-facing condition
    pub fn is_defect(&self) -> bool {
        matches!(self, PipelineError::InvalidTransition { .. })
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::MissingInput(input) => {
                format!(
                    "Missing required input: {input}\n\nHint: Upload and clean a file first."
                )
            }
            PipelineError::InvalidThreshold(value) => {
                format!("Threshold {value} is out of range.\n\nHint: Use a value between 0 and 1.")
            }
            PipelineError::ClusteringFailed { column, message } => {
                format!(
                    "Clustering '{column}' failed: {message}\n\nHint: The previous results are still shown; run again to retry."
                )
            }
            PipelineError::SuggestionApply { row, message } => {
                format!(
                    "Could not apply the suggestion for row {row}: {message}\n\nHint: The suggestion is still listed; accept it again to retry."
                )
            }
            PipelineError::CorruptState(msg) => {
                format!(
                    "Saved pipeline state is inconsistent: {msg}\n\nHint: Delete the state file and start again from the cleaned dataset."
                )
            }
            PipelineError::ConfigError(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check the API URL and timeout settings."
                )
            }
            _ => self.to_string(),
        }
    }
}
