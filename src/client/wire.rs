//! Request and response bodies of the clustering service, and their
//! normalisation into `ClusterRun`s

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    ClusterRun, DatasetHandle, DownloadArtifact, PreviewRow, StageColumn, Suggestion, cell_text,
    validate_threshold,
};
use crate::pipeline::{PipelineError, PipelineResult};

use super::ApplyOutcome;

/// Request body for `POST /api/cosine_cluster`
#[derive(Debug, Serialize)]
pub struct ClusterRequest<'a> {
    pub filename: &'a str,
    pub column: &'a str,
    pub threshold: f64,
}

/// Request body for `POST /api/apply_replacement`
#[derive(Debug, Serialize)]
pub struct ApplyRequest<'a> {
    pub filename: &'a str,
    pub column: &'a str,
    #[serde(rename = "targetRow")]
    pub target_row: usize,
    #[serde(rename = "newValue")]
    pub new_value: &'a str,
}

/// Response body of `POST /api/cosine_cluster`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClusterResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub output_file: Option<String>,
    pub progressive_file: Option<String>,
    pub final_filename: Option<String>,
    pub replacement_suggestions: Vec<SuggestionEnvelope>,
    pub clustered_preview: Vec<PreviewRow>,
    pub column_clustered: Option<String>,
    pub threshold_used: Option<f64>,
    pub total_rows: Option<usize>,
    pub excel_file: Option<String>,
}

/// Suggestions arrive wrapped as `{"replace": {...}}`
#[derive(Debug, Deserialize)]
pub struct SuggestionEnvelope {
    #[serde(default)]
    pub replace: Option<WireSuggestion>,
}

#[derive(Debug, Deserialize)]
pub struct WireSuggestion {
    pub row: usize,
    #[serde(default)]
    pub original: Value,
    #[serde(default)]
    pub suggested_value: Value,
    pub suggested_with_row: usize,
    pub similarity: f64,
}

/// Response body of `POST /api/apply_replacement`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplyResponse {
    pub message: Option<String>,
    #[serde(alias = "final_filename", alias = "dataset")]
    pub filename: Option<String>,
    pub output_file: Option<String>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Pick the most useful error text from a failed response
pub fn server_error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if status == 408 {
                "Request timeout - processing taking too long".to_string()
            } else {
                format!("Server Error ({})", status)
            }
        })
}

/// Link to a file served by the service's download endpoint
pub fn download_url(base_url: &str, file: &str) -> String {
    format!(
        "{}/api/download/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(file)
    )
}

impl WireSuggestion {
    fn into_suggestion(self) -> PipelineResult<Suggestion> {
        Suggestion::new(
            self.row,
            cell_text(&self.original),
            cell_text(&self.suggested_value),
            self.suggested_with_row,
            self.similarity,
        )
    }
}

impl ClusterResponse {
    /// Normalise the response into a `ClusterRun`
    ///
    /// The output handle is `final_filename`, then `progressive_file`, then the
    /// request handle. Any malformed part fails the whole run.
    pub fn into_cluster_run(
        self,
        request_handle: &DatasetHandle,
        column: StageColumn,
        threshold: f64,
        base_url: &str,
    ) -> PipelineResult<ClusterRun> {
        let fail = |message: String| PipelineError::clustering_failed(column, message);

        if self.success == Some(false) {
            return Err(fail(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "Clustering failed".to_string()),
            ));
        }

        if let Some(clustered) = &self.column_clustered {
            if clustered != column.wire_name() {
                return Err(fail(format!(
                    "service clustered column '{}' instead of '{}'",
                    clustered,
                    column.wire_name()
                )));
            }
        }

        let threshold = validate_threshold(self.threshold_used.unwrap_or(threshold))
            .map_err(|e| fail(e.to_string()))?;

        let output_handle = match self.final_filename.or(self.progressive_file) {
            Some(name) => DatasetHandle::new(name).map_err(|e| fail(e.to_string()))?,
            None => request_handle.clone(),
        };

        let suggestions = self
            .replacement_suggestions
            .into_iter()
            .filter_map(|envelope| envelope.replace)
            .map(WireSuggestion::into_suggestion)
            .collect::<PipelineResult<Vec<_>>>()
            .map_err(|e| fail(e.to_string()))?;

        let mut run = ClusterRun::new(column, threshold, output_handle, suggestions)?
            .with_preview(self.clustered_preview);

        if let Some(total) = self.total_rows {
            run = run.with_total_rows(total);
        }
        if let Some(file) = &self.output_file {
            run = run.with_artifact(DownloadArtifact::new(
                "Clustered CSV",
                download_url(base_url, file),
            ));
        }
        if let Some(file) = &self.excel_file {
            run = run.with_artifact(DownloadArtifact::new(
                "Highlighted Excel",
                download_url(base_url, file),
            ));
        }

        Ok(run)
    }
}

impl ApplyResponse {
    /// Normalise the response into an `ApplyOutcome`
    /// Parse an apply success body
    ///
    /// An empty or unreadable body still means the write happened; the
    /// caller then keeps its current handle.
    pub fn from_body(text: &str) -> Self {
        if text.trim().is_empty() {
            debug!("Empty apply response body");
            return Self::default();
        }
        serde_json::from_str(text).unwrap_or_else(|e| {
            warn!(
                error = %e,
                body = %text.chars().take(200).collect::<String>(),
                "Unreadable apply response, keeping the current dataset handle"
            );
            Self::default()
        })
    }

    pub fn into_outcome(self, base_url: &str) -> ApplyOutcome {
        let handle = self
            .filename
            .and_then(|name| DatasetHandle::new(name).ok());
        let artifacts = self
            .output_file
            .iter()
            .map(|file| DownloadArtifact::new("Updated CSV", download_url(base_url, file)))
            .collect();

        ApplyOutcome {
            handle,
            message: self.message,
            artifacts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_body_parsing() {
        assert!(ApplyResponse::from_body("").filename.is_none());
        assert!(ApplyResponse::from_body("<html>Saved</html>").filename.is_none());

        let response = ApplyResponse::from_body(r#"{"message": "ok", "final_filename": "v2.csv"}"#);
        assert_eq!(response.filename.as_deref(), Some("v2.csv"));
        assert_eq!(response.message.as_deref(), Some("ok"));
    }

    const BASE: &str = "http://localhost:5000";

    fn handle() -> DatasetHandle {
        DatasetHandle::new("clean_1.csv").unwrap()
    }

    const CLUSTER_BODY: &str = r#"{
        "success": true,
        "message": "Data clustered successfully",
        "output_file": "cosine_clustered_item_description.csv",
        "progressive_file": "progressive_clustered_clean_1.csv",
        "final_filename": "progressive_clustered_clean_1.csv",
        "replacement_suggestions": [
            {"replace": {"row": 5, "original": "STEEL PIPE 2IN", "suggested_with_row": 1,
                         "suggested_value": "STEEL PIPE 2 IN", "similarity": 0.91}},
            {"replace": {"row": 8, "original": "COPPER WIRE", "suggested_with_row": 3,
                         "suggested_value": "COPPER WIRES", "similarity": 0.84}}
        ],
        "clustered_preview": [
            {"Item_Description": "STEEL PIPE 2 IN", "Importer_Name": "ACME", "Quantity": 10},
            {"Item_Description": "COPPER WIRE", "Importer_Name": null, "Quantity": 3}
        ],
        "column_clustered": "Item_Description",
        "threshold_used": 0.8,
        "total_rows": 120,
        "excel_file": "cosine_clustered_item_description.xlsx"
    }"#;

    #[test]
    fn test_cluster_response_normalisation() {
        let response: ClusterResponse = serde_json::from_str(CLUSTER_BODY).unwrap();
        let run = response
            .into_cluster_run(&handle(), StageColumn::ItemDescription, 0.8, BASE)
            .unwrap();

        assert_eq!(run.output_handle.as_str(), "progressive_clustered_clean_1.csv");
        assert_eq!(run.suggestions.len(), 2);
        assert_eq!(run.suggestions[0].target_row, 5);
        assert_eq!(run.suggestions[0].reference_row, 1);
        assert_eq!(run.suggestions[0].suggested_value, "STEEL PIPE 2 IN");
        assert_eq!(run.suggestions[1].target_row, 8);
        assert_eq!(run.preview_rows.len(), 2);
        assert_eq!(
            run.preview_headers(),
            vec!["Item_Description", "Importer_Name", "Quantity"]
        );
        assert_eq!(run.total_rows, Some(120));
        assert_eq!(run.artifacts.len(), 2);
        assert_eq!(
            run.artifacts[0].url,
            "http://localhost:5000/api/download/cosine_clustered_item_description.csv"
        );
    }

    #[test]
    fn test_output_handle_falls_back_to_request() {
        let response: ClusterResponse =
            serde_json::from_str(r#"{"success": true, "replacement_suggestions": []}"#).unwrap();
        let run = response
            .into_cluster_run(&handle(), StageColumn::SupplierName, 0.7, BASE)
            .unwrap();
        assert_eq!(run.output_handle, handle());
        assert_eq!(run.threshold, 0.7);
        assert!(run.artifacts.is_empty());
    }

    #[test]
    fn test_envelope_without_replace_is_skipped() {
        let response: ClusterResponse = serde_json::from_str(
            r#"{"replacement_suggestions": [{}, {"replace": {"row": 2, "original": 7,
                "suggested_with_row": 0, "suggested_value": "7.0", "similarity": 0.9}}]}"#,
        )
        .unwrap();
        let run = response
            .into_cluster_run(&handle(), StageColumn::ImporterName, 0.8, BASE)
            .unwrap();
        assert_eq!(run.suggestions.len(), 1);
        assert_eq!(run.suggestions[0].original_value, "7");
    }

    #[test]
    fn test_unsuccessful_response_fails() {
        let response: ClusterResponse =
            serde_json::from_str(r#"{"success": false, "message": "Column not found"}"#).unwrap();
        let err = response
            .into_cluster_run(&handle(), StageColumn::ImporterName, 0.8, BASE)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ClusteringFailed { .. }));
        assert!(err.to_string().contains("Column not found"));
    }

    #[test]
    fn test_invalid_suggestion_fails_whole_run() {
        let response: ClusterResponse = serde_json::from_str(
            r#"{"replacement_suggestions": [{"replace": {"row": 4, "original": "a",
                "suggested_with_row": 4, "suggested_value": "b", "similarity": 0.9}}]}"#,
        )
        .unwrap();
        let err = response
            .into_cluster_run(&handle(), StageColumn::ItemDescription, 0.8, BASE)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ClusteringFailed { .. }));
    }

    #[test]
    fn test_mismatched_column_fails() {
        let response: ClusterResponse =
            serde_json::from_str(r#"{"column_clustered": "Supplier_Name"}"#).unwrap();
        assert!(
            response
                .into_cluster_run(&handle(), StageColumn::ImporterName, 0.8, BASE)
                .is_err()
        );
    }

    #[test]
    fn test_server_error_message() {
        assert_eq!(
            server_error_message(404, r#"{"error": "Cleaned file not found: x.csv"}"#),
            "Cleaned file not found: x.csv"
        );
        assert_eq!(
            server_error_message(400, r#"{"message": "Invalid input"}"#),
            "Invalid input"
        );
        assert_eq!(server_error_message(502, "<html>"), "Server Error (502)");
        assert_eq!(
            server_error_message(408, ""),
            "Request timeout - processing taking too long"
        );
    }

    #[test]
    fn test_apply_request_shape() {
        let body = serde_json::to_value(ApplyRequest {
            filename: "clean_1.csv",
            column: "Item_Description",
            target_row: 5,
            new_value: "STEEL PIPE 2 IN",
        })
        .unwrap();
        assert_eq!(body["targetRow"], 5);
        assert_eq!(body["newValue"], "STEEL PIPE 2 IN");
    }

    #[test]
    fn test_apply_response_outcome() {
        let response: ApplyResponse =
            serde_json::from_str(r#"{"message": "Replacement applied successfully"}"#).unwrap();
        let outcome = response.into_outcome(BASE);
        assert!(outcome.handle.is_none());
        assert_eq!(
            outcome.message.as_deref(),
            Some("Replacement applied successfully")
        );

        let response: ApplyResponse =
            serde_json::from_str(r#"{"filename": "clean_1_v2.csv", "output_file": "clean_1_v2.csv"}"#)
                .unwrap();
        let outcome = response.into_outcome(BASE);
        assert_eq!(outcome.handle.unwrap().as_str(), "clean_1_v2.csv");
        assert_eq!(outcome.artifacts.len(), 1);
    }

    #[test]
    fn test_download_url_is_encoded() {
        assert_eq!(
            download_url("http://h:5000/", "my file.csv"),
            "http://h:5000/api/download/my%20file.csv"
        );
    }
}
