//! Shared test fixtures

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use trade_dedupe_sdk::models::validate_threshold;
use trade_dedupe_sdk::{
    ApplyOutcome, ClusterRun, ClusteringService, DatasetHandle, PipelineResult, PreviewRow,
    StageColumn, Suggestion,
};

pub fn handle(name: &str) -> DatasetHandle {
    DatasetHandle::new(name).unwrap()
}

pub fn preview_row(row: usize, value: &str) -> PreviewRow {
    let value = json!({ "Row": row, "Value": value, "Cluster": 1 });
    value.as_object().unwrap().clone()
}

/// A run producing `output` with the given suggestions and a small preview
pub fn cluster_run(column: StageColumn, output: &str, suggestions: Vec<Suggestion>) -> ClusterRun {
    ClusterRun::new(column, 0.8, handle(output), suggestions)
        .unwrap()
        .with_preview(vec![preview_row(1, "ACME LTD"), preview_row(2, "ACME LIMITED")])
        .with_total_rows(2)
}

pub fn suggestion(row: usize, original: &str, suggested: &str, reference: usize) -> Suggestion {
    Suggestion::new(row, original, suggested, reference, 0.9).unwrap()
}

/// One recorded `run_clustering` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCall {
    pub handle: DatasetHandle,
    pub column: StageColumn,
    pub threshold: f64,
}

/// One recorded `apply_suggestion` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyCall {
    pub handle: DatasetHandle,
    pub column: StageColumn,
    pub suggestion: Suggestion,
}

/// Clustering service answering from queued results
///
/// With an empty queue, clustering echoes the input handle with no suggestions
/// and applies mutate in place.
#[derive(Default)]
pub struct ScriptedService {
    cluster_results: Mutex<VecDeque<PipelineResult<ClusterRun>>>,
    apply_results: Mutex<VecDeque<PipelineResult<ApplyOutcome>>>,
    cluster_calls: Mutex<Vec<ClusterCall>>,
    apply_calls: Mutex<Vec<ApplyCall>>,
    finalize_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_run(&self, result: PipelineResult<ClusterRun>) -> &Self {
        self.cluster_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_apply(&self, result: PipelineResult<ApplyOutcome>) -> &Self {
        self.apply_results.lock().unwrap().push_back(result);
        self
    }

    pub fn cluster_calls(&self) -> Vec<ClusterCall> {
        self.cluster_calls.lock().unwrap().clone()
    }

    pub fn apply_calls(&self) -> Vec<ApplyCall> {
        self.apply_calls.lock().unwrap().clone()
    }

    pub fn finalize_count(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusteringService for ScriptedService {
    async fn run_clustering(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        threshold: f64,
    ) -> PipelineResult<ClusterRun> {
        self.cluster_calls.lock().unwrap().push(ClusterCall {
            handle: handle.clone(),
            column,
            threshold,
        });
        validate_threshold(threshold)?;

        let queued = self.cluster_results.lock().unwrap().pop_front();
        match queued {
            Some(result) => result,
            None => ClusterRun::new(column, threshold, handle.clone(), Vec::new()),
        }
    }

    async fn apply_suggestion(
        &self,
        handle: &DatasetHandle,
        column: StageColumn,
        suggestion: &Suggestion,
    ) -> PipelineResult<ApplyOutcome> {
        self.apply_calls.lock().unwrap().push(ApplyCall {
            handle: handle.clone(),
            column,
            suggestion: suggestion.clone(),
        });

        let queued = self.apply_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(ApplyOutcome::in_place()))
    }

    async fn finalize_dataset(&self, handle: &DatasetHandle) -> PipelineResult<String> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("analysis:{}", handle))
    }
}
