//! Similarity clustering client
//!
//! Defines the `ClusteringService` trait, the seam between the pipeline and the
//! external service that does the TF-IDF/cosine work, and the HTTP
//! implementation used in production.

use async_trait::async_trait;

use crate::models::{ClusterRun, DatasetHandle, DownloadArtifact, StageColumn, Suggestion};
use crate::pipeline::PipelineResult;

#[cfg(feature = "api-backend")]
pub mod api;
#[cfg(feature = "api-backend")]
pub mod wire;

#[cfg(feature = "api-backend")]
pub use api::ApiClusteringClient;

/// Result of applying one suggestion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// New handle, when the service wrote the change to a new dataset
    pub handle: Option<DatasetHandle>,
    /// Confirmation text from the service
    pub message: Option<String>,
    /// Export links returned with the response
    pub artifacts: Vec<DownloadArtifact>,
}

impl ApplyOutcome {
    /// Outcome for a dataset mutated in place
    pub fn in_place() -> Self {
        Self::default()
    }

    /// Outcome for a change written to a new dataset
    pub fn with_handle(handle: DatasetHandle) -> Self {
        Self {
            handle: Some(handle),
            ..Self::default()
        }
    }

    /// The working handle after the apply: the returned one, else the previous one
    pub fn resolve_handle(&self, previous: &DatasetHandle) -> DatasetHandle {
        self.handle.clone().unwrap_or_else(|| previous.clone())
    }
}

/// Trait for clustering service implementations
///
/// Implementations must reject thresholds outside [0, 1] with
/// `PipelineError::InvalidThreshold` before doing any I/O.
#[async_trait]
pub trait ClusteringService: Send + Sync {
    /// Cluster one column of a dataset and return the preview and suggestions
    async fn run_clustering(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        threshold: f64,
    ) -> PipelineResult<ClusterRun>;

    /// Replace the target row's value with the suggested value
    async fn apply_suggestion(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        suggestion: &Suggestion,
    ) -> PipelineResult<ApplyOutcome>;

    /// Turn the final handle into the identifier downstream analyses consume
    ///
    /// Services that address datasets by file name use the handle itself.
    async fn finalize_dataset(&self, handle: &DatasetHandle) -> PipelineResult<String> {
        Ok(handle.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_handle() {
        let previous = DatasetHandle::new("clean_1.csv").unwrap();

        let outcome = ApplyOutcome::in_place();
        assert_eq!(outcome.resolve_handle(&previous), previous);

        let next = DatasetHandle::new("clean_1_v2.csv").unwrap();
        let outcome = ApplyOutcome::with_handle(next.clone());
        assert_eq!(outcome.resolve_handle(&previous), next);
    }
}
