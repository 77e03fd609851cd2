//! Stage view: presentation binding between one stage and its review loop

use serde::Serialize;

use super::{StageDefinition, definition};
use crate::client::ClusteringService;
use crate::models::{DatasetHandle, DownloadArtifact, StageColumn, cell_text};
use crate::pipeline::PipelineResult;
use crate::review::{ReviewLoop, ReviewState};

/// View of one stage, owning that stage's review loop
#[derive(Debug)]
pub struct StageView {
    definition: &'static StageDefinition,
    review: ReviewLoop,
}

/// Preview table rendered as text cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One line of the suggestion table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRow {
    /// Position to pass to `accept`
    pub index: usize,
    pub row: usize,
    pub current_value: String,
    pub suggested_value: String,
    pub reference_row: usize,
    pub similarity: String,
    pub accept_enabled: bool,
}

/// Everything a front end needs to draw a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub title: String,
    pub column: String,
    pub working_handle: String,
    pub threshold: f64,
    pub state: ReviewState,
    pub busy: bool,
    pub run_enabled: bool,
    pub preview: PreviewTable,
    pub total_rows: Option<usize>,
    pub suggestions: Vec<SuggestionRow>,
    pub error: Option<String>,
    pub downloads: Vec<DownloadArtifact>,
    pub can_proceed: bool,
    pub next_enabled: bool,
    pub next_route: String,
    pub next_label: String,
}

impl StageView {
    /// Create the view for `column`, reading from `input`
    pub fn new(column: StageColumn, input: DatasetHandle, threshold: f64) -> PipelineResult<Self> {
        Ok(Self {
            definition: definition(column),
            review: ReviewLoop::new(column, input, threshold)?,
        })
    }

    pub fn column(&self) -> StageColumn {
        self.definition.column
    }

    pub fn definition(&self) -> &'static StageDefinition {
        self.definition
    }

    /// Read access to the loop; all mutation goes through the view
    pub fn review(&self) -> &ReviewLoop {
        &self.review
    }

    /// Stage activation: the first clustering run, if none has happened yet
    pub async fn activate<S>(&mut self, service: &S) -> PipelineResult<()>
    where
        S: ClusteringService + ?Sized,
    {
        if self.review.state() == ReviewState::Idle && self.review.runs_completed() == 0 {
            self.review.run(service).await
        } else {
            Ok(())
        }
    }

    pub fn set_threshold(&mut self, threshold: f64) -> PipelineResult<()> {
        self.review.set_threshold(threshold)
    }

    /// Run trigger
    pub async fn run<S>(&mut self, service: &S) -> PipelineResult<()>
    where
        S: ClusteringService + ?Sized,
    {
        self.review.run(service).await
    }

    /// Per-row accept action
    pub async fn accept<S>(&mut self, index: usize, service: &S) -> PipelineResult<()>
    where
        S: ClusteringService + ?Sized,
    {
        self.review.accept(index, service).await
    }

    /// Declare the stage done
    pub fn proceed(&mut self) -> PipelineResult<DatasetHandle> {
        self.review.proceed().cloned()
    }

    /// Build the view model for the current state
    pub fn snapshot(&self) -> StageSnapshot {
        let review = &self.review;
        let state = review.state();
        let busy = state.is_busy();
        let reviewing = state == ReviewState::Reviewing;

        let (preview, total_rows) = match review.current_run() {
            Some(run) => {
                let headers = run.preview_headers();
                let rows = run
                    .preview_rows
                    .iter()
                    .map(|row| {
                        headers
                            .iter()
                            .map(|h| row.get(h).map(cell_text).unwrap_or_default())
                            .collect()
                    })
                    .collect();
                (PreviewTable { headers, rows }, run.total_rows)
            }
            None => (PreviewTable::default(), None),
        };

        let suggestions = review
            .suggestions()
            .iter()
            .enumerate()
            .map(|(index, s)| SuggestionRow {
                index,
                row: s.target_row,
                current_value: s.original_value.clone(),
                suggested_value: s.suggested_value.clone(),
                reference_row: s.reference_row,
                similarity: s.similarity_percent(),
                accept_enabled: reviewing,
            })
            .collect();

        StageSnapshot {
            title: self.definition.title.to_string(),
            column: self.definition.column.wire_name().to_string(),
            working_handle: review.working_handle().to_string(),
            threshold: review.threshold(),
            state,
            busy,
            run_enabled: matches!(state, ReviewState::Idle | ReviewState::Reviewing),
            preview,
            total_rows,
            suggestions,
            error: review.last_error().map(str::to_string),
            downloads: review.artifacts().to_vec(),
            can_proceed: matches!(state, ReviewState::Idle | ReviewState::Reviewing),
            next_enabled: review.is_satisfied(),
            next_route: self.definition.next_route.to_string(),
            next_label: self.definition.next_label.to_string(),
        }
    }
}
