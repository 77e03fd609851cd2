//! Clustering results: runs, suggestions and preview rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::column::StageColumn;
use super::handle::DatasetHandle;
use crate::pipeline::{PipelineError, PipelineResult};

/// Threshold used when the operator has not chosen one
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// One record of the preview table, column name to cell value, in server order
pub type PreviewRow = serde_json::Map<String, serde_json::Value>;

/// Render a preview cell or suggestion value as text; null becomes empty
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check that a similarity threshold lies in [0, 1]
///
/// NaN is rejected.
pub fn validate_threshold(threshold: f64) -> PipelineResult<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(PipelineError::InvalidThreshold(threshold))
    }
}

/// A proposed merge of two near-duplicate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Row whose value would be replaced
    pub target_row: usize,
    /// Current value of the target row
    pub original_value: String,
    /// Value taken from the reference row
    pub suggested_value: String,
    /// Row the suggested value comes from
    pub reference_row: usize,
    /// Similarity score in [0, 1]
    pub similarity: f64,
}

impl Suggestion {
    /// Create a suggestion, enforcing `similarity ∈ [0, 1]` and `target_row ≠ reference_row`
    pub fn new(
        target_row: usize,
        original_value: impl Into<String>,
        suggested_value: impl Into<String>,
        reference_row: usize,
        similarity: f64,
    ) -> PipelineResult<Self> {
        if !(0.0..=1.0).contains(&similarity) {
            return Err(PipelineError::InvalidSuggestion(format!(
                "similarity {} for row {} is outside [0, 1]",
                similarity, target_row
            )));
        }
        if target_row == reference_row {
            return Err(PipelineError::InvalidSuggestion(format!(
                "row {} cannot reference itself",
                target_row
            )));
        }
        Ok(Self {
            target_row,
            original_value: original_value.into(),
            suggested_value: suggested_value.into(),
            reference_row,
            similarity,
        })
    }

    /// Similarity as a percentage with one decimal, e.g. `"93.0%"`
    pub fn similarity_percent(&self) -> String {
        format!("{:.1}%", self.similarity * 100.0)
    }
}

/// Downloadable export produced alongside a clustering or apply response
///
/// The URL is surfaced to the operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadArtifact {
    pub label: String,
    pub url: String,
}

impl DownloadArtifact {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Result of one clustering invocation for a stage
///
/// A run is a snapshot. It is superseded, never merged, by the next run of
/// the same stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRun {
    /// Unique run ID
    pub id: Uuid,
    /// Column that was clustered
    pub column: StageColumn,
    /// Threshold the run used
    pub threshold: f64,
    /// First page of the clustered dataset
    pub preview_rows: Vec<PreviewRow>,
    /// Dataset the run produced
    pub output_handle: DatasetHandle,
    /// Merge suggestions, in server order
    pub suggestions: Vec<Suggestion>,
    /// Export links for the operator
    pub artifacts: Vec<DownloadArtifact>,
    /// Row count of the whole dataset, when reported
    pub total_rows: Option<usize>,
    /// When the run completed
    pub created_at: DateTime<Utc>,
}

impl ClusterRun {
    /// Create a run with no preview rows or artifacts
    pub fn new(
        column: StageColumn,
        threshold: f64,
        output_handle: DatasetHandle,
        suggestions: Vec<Suggestion>,
    ) -> PipelineResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            column,
            threshold: validate_threshold(threshold)?,
            preview_rows: Vec::new(),
            output_handle,
            suggestions,
            artifacts: Vec::new(),
            total_rows: None,
            created_at: Utc::now(),
        })
    }

    /// Set preview rows
    pub fn with_preview(mut self, rows: Vec<PreviewRow>) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Add a download artifact
    pub fn with_artifact(mut self, artifact: DownloadArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Set the total row count
    pub fn with_total_rows(mut self, total: usize) -> Self {
        self.total_rows = Some(total);
        self
    }

    /// Column headers of the preview table, taken from the first row
    pub fn preview_headers(&self) -> Vec<String> {
        self.preview_rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_suggestions(&self) -> bool {
        !self.suggestions.is_empty()
    }
}
