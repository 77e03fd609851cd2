//! HTTP clustering client
//!
//! Implements `ClusteringService` against the dashboard's Flask service
//! (`/api/cosine_cluster`, `/api/apply_replacement`).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::wire::{
    ApplyRequest, ApplyResponse, ClusterRequest, ClusterResponse, server_error_message,
};
use super::{ApplyOutcome, ClusteringService};
use crate::models::{ClusterRun, DatasetHandle, StageColumn, Suggestion, validate_threshold};
use crate::pipeline::{ClientConfig, PipelineError, PipelineResult};

const CLUSTER_PATH: &str = "/api/cosine_cluster";
const APPLY_PATH: &str = "/api/apply_replacement";

/// Clustering client that communicates with the HTTP service
pub struct ApiClusteringClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl ApiClusteringClient {
    /// Create a new API clustering client
    ///
    /// # Example
    ///
    /// ```rust
    /// use trade_dedupe_sdk::client::ApiClusteringClient;
    /// use trade_dedupe_sdk::pipeline::ClientConfig;
    ///
    /// let client = ApiClusteringClient::new(
    ///     ClientConfig::new().with_base_url("http://localhost:5000"),
    /// ).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:5000");
    /// ```
    pub fn new(config: ClientConfig) -> PipelineResult<Self> {
        config.validate()?;

        // The service keeps session state in a cookie
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.config.normalized_base_url()
    }

    /// Build a request with authentication headers
    fn build_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url(), path);
        let mut request = self.client.request(method, &url);

        if let Some(ref token) = self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request
    }

    /// Describe a transport-level failure for the operator
    fn transport_message(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!(
                "Request timed out after {} seconds",
                self.config.timeout_seconds
            )
        } else if error.is_connect() {
            format!(
                "Network error: Unable to reach server at {}",
                self.base_url()
            )
        } else {
            format!("Network error: {}", error)
        }
    }

    /// Send a JSON body and return the response text, mapping failures with `fail`
    async fn post_json<B, F>(&self, path: &str, body: &B, fail: F) -> PipelineResult<String>
    where
        B: serde::Serialize + ?Sized,
        F: Fn(String) -> PipelineError,
    {
        let response = self
            .build_request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let message = self.transport_message(&e);
                warn!(path, error = %e, "Request failed");
                fail(message)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fail(self.transport_message(&e)))?;

        if !status.is_success() {
            let message = server_error_message(status.as_u16(), &text);
            warn!(path, status = status.as_u16(), error = %message, "Service returned an error");
            return Err(fail(message));
        }

        Ok(text)
    }
}

#[async_trait]
impl ClusteringService for ApiClusteringClient {
    async fn run_clustering(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        threshold: f64,
    ) -> PipelineResult<ClusterRun> {
        let threshold = validate_threshold(threshold)?;

        let request = ClusterRequest {
            filename: handle.as_str(),
            column: column.wire_name(),
            threshold,
        };
        debug!(handle = %handle, column = %column, threshold, "Sending clustering request");

        let fail = |message: String| PipelineError::clustering_failed(column, message);
        let text = self.post_json(CLUSTER_PATH, &request, fail).await?;

        let response: ClusterResponse = serde_json::from_str(&text)
            .map_err(|e| fail(format!("Failed to parse clustering response: {}", e)))?;
        let run = response.into_cluster_run(handle, column, threshold, self.base_url())?;

        info!(
            column = %column,
            output = %run.output_handle,
            suggestions = run.suggestions.len(),
            preview_rows = run.preview_rows.len(),
            "Clustering completed"
        );
        Ok(run)
    }

    async fn apply_suggestion(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        suggestion: &Suggestion,
    ) -> PipelineResult<ApplyOutcome> {
        let request = ApplyRequest {
            filename: handle.as_str(),
            column: column.wire_name(),
            target_row: suggestion.target_row,
            new_value: &suggestion.suggested_value,
        };
        debug!(
            handle = %handle,
            column = %column,
            row = suggestion.target_row,
            "Applying suggestion"
        );

        let row = suggestion.target_row;
        let fail = |message: String| PipelineError::apply_failed(row, message);
        let text = self.post_json(APPLY_PATH, &request, fail).await?;

        let outcome = ApplyResponse::from_body(&text).into_outcome(self.base_url());

        info!(
            column = %column,
            row,
            new_handle = outcome.handle.as_ref().map(|h| h.as_str()).unwrap_or("<in place>"),
            "Suggestion applied"
        );
        Ok(outcome)
    }
}
