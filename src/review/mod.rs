//! Suggestion review loop
//!
//! Per-stage state machine driving cluster → review → apply → re-cluster:
//!
//! ```text
//! Idle → Running → Reviewing → (Applying → Running)* → Reviewing → Satisfied
//! ```
//!
//! Each network step is split into a `begin_*` call that validates and moves
//! into the in-flight state, and a `complete_*` call that consumes the result.
//! A presentation layer can therefore render `Running`/`Applying` while the
//! request is outstanding. `run` and `accept` chain both halves around a
//! `ClusteringService`.
//!
//! Only one request is ever in flight per stage. Accepting a suggestion hides
//! every other suggestion of that run, since the mutation invalidates their row
//! indices, and a successful apply is always followed by exactly one fresh
//! clustering request.

use tracing::{debug, info, warn};

use crate::client::{ApplyOutcome, ClusteringService};
use crate::models::{
    ClusterRun, DatasetHandle, DownloadArtifact, StageColumn, Suggestion, validate_threshold,
};
use crate::pipeline::{PipelineError, PipelineResult};

/// States of the review loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    /// No clustering result yet
    Idle,
    /// Clustering request in flight
    Running,
    /// Operator is looking at the current run
    Reviewing,
    /// Apply request in flight for one accepted suggestion
    Applying,
    /// Operator declared the stage done
    Satisfied,
}

impl ReviewState {
    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Running | Self::Applying)
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Reviewing => write!(f, "reviewing"),
            Self::Applying => write!(f, "applying"),
            Self::Satisfied => write!(f, "satisfied"),
        }
    }
}

/// Parameters of a clustering request issued by the loop
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub handle: DatasetHandle,
    pub column: StageColumn,
    pub threshold: f64,
}

/// Parameters of an apply request issued by the loop
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub handle: DatasetHandle,
    pub column: StageColumn,
    pub suggestion: Suggestion,
}

/// Review loop for one stage column
#[derive(Debug)]
pub struct ReviewLoop {
    column: StageColumn,
    input_handle: DatasetHandle,
    /// Dataset the next request targets
    working_handle: DatasetHandle,
    threshold: f64,
    state: ReviewState,
    current_run: Option<ClusterRun>,
    /// Run whose suggestion is being applied, kept to restore on failure
    superseded: Option<ClusterRun>,
    accepted: Option<Suggestion>,
    last_error: Option<String>,
    artifacts: Vec<DownloadArtifact>,
    output_handle: Option<DatasetHandle>,
    runs_completed: usize,
}

impl ReviewLoop {
    /// Create a loop for `column` starting from `input_handle`
    pub fn new(column: StageColumn, input_handle: DatasetHandle, threshold: f64) -> PipelineResult<Self> {
        let threshold = validate_threshold(threshold)?;
        Ok(Self {
            column,
            working_handle: input_handle.clone(),
            input_handle,
            threshold,
            state: ReviewState::Idle,
            current_run: None,
            superseded: None,
            accepted: None,
            last_error: None,
            artifacts: Vec::new(),
            output_handle: None,
            runs_completed: 0,
        })
    }

    pub fn column(&self) -> StageColumn {
        self.column
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn is_satisfied(&self) -> bool {
        self.state == ReviewState::Satisfied
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Handle the stage started from
    pub fn input_handle(&self) -> &DatasetHandle {
        &self.input_handle
    }

    /// Handle the next request targets
    pub fn working_handle(&self) -> &DatasetHandle {
        &self.working_handle
    }

    /// Output committed when the stage was declared satisfied
    pub fn output_handle(&self) -> Option<&DatasetHandle> {
        self.output_handle.as_ref()
    }

    /// The live run; `None` while applying or before the first success
    pub fn current_run(&self) -> Option<&ClusterRun> {
        self.current_run.as_ref()
    }

    /// Pending suggestions in server order
    pub fn suggestions(&self) -> &[Suggestion] {
        self.current_run
            .as_ref()
            .map(|run| run.suggestions.as_slice())
            .unwrap_or(&[])
    }

    /// Suggestion currently being applied
    pub fn accepted(&self) -> Option<&Suggestion> {
        self.accepted.as_ref()
    }

    /// Error from the most recent failed request, shown alongside the last good state
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Latest download links
    pub fn artifacts(&self) -> &[DownloadArtifact] {
        &self.artifacts
    }

    /// Number of successful clustering runs
    pub fn runs_completed(&self) -> usize {
        self.runs_completed
    }

    fn ensure(&self, allowed: &[ReviewState], action: &str) -> PipelineResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(PipelineError::invalid_transition(self.state, action))
        }
    }

    /// Change the threshold used by the next run
    pub fn set_threshold(&mut self, threshold: f64) -> PipelineResult<()> {
        self.ensure(&[ReviewState::Idle, ReviewState::Reviewing], "change threshold")?;
        self.threshold = validate_threshold(threshold)?;
        debug!(column = %self.column, threshold, "Threshold changed");
        Ok(())
    }

    /// Enter `Running` and return the request to send
    pub fn begin_run(&mut self) -> PipelineResult<RunRequest> {
        self.ensure(&[ReviewState::Idle, ReviewState::Reviewing], "run clustering")?;
        validate_threshold(self.threshold)?;
        self.enter_running()
    }

    fn enter_running(&mut self) -> PipelineResult<RunRequest> {
        self.state = ReviewState::Running;
        self.last_error = None;
        debug!(
            column = %self.column,
            handle = %self.working_handle,
            threshold = self.threshold,
            "Clustering started"
        );
        Ok(RunRequest {
            handle: self.working_handle.clone(),
            column: self.column,
            threshold: self.threshold,
        })
    }

    /// Consume the result of the request issued by `begin_run`
    ///
    /// On failure the previous run (if any) stays visible with the error
    /// attached, and the error is returned to the caller.
    pub fn complete_run(&mut self, result: PipelineResult<ClusterRun>) -> PipelineResult<()> {
        self.ensure(&[ReviewState::Running], "complete clustering")?;

        match result {
            Ok(run) => {
                info!(
                    column = %self.column,
                    output = %run.output_handle,
                    suggestions = run.suggestions.len(),
                    "Clustering result ready for review"
                );
                self.working_handle = run.output_handle.clone();
                if !run.artifacts.is_empty() {
                    self.artifacts = run.artifacts.clone();
                }
                self.current_run = Some(run);
                self.runs_completed += 1;
                self.state = ReviewState::Reviewing;
                Ok(())
            }
            Err(e) => {
                warn!(column = %self.column, error = %e, "Clustering failed");
                self.last_error = Some(e.to_string());
                self.state = if self.current_run.is_some() {
                    ReviewState::Reviewing
                } else {
                    ReviewState::Idle
                };
                Err(e)
            }
        }
    }

    /// Accept the suggestion at `index` and enter `Applying`
    ///
    /// The run's other suggestions are withdrawn from review immediately.
    pub fn begin_apply(&mut self, index: usize) -> PipelineResult<ApplyRequest> {
        self.ensure(&[ReviewState::Reviewing], "accept a suggestion")?;

        let suggestion = self
            .suggestions()
            .get(index)
            .cloned()
            .ok_or_else(|| {
                PipelineError::InvalidSuggestion(format!(
                    "no suggestion at position {} (run has {})",
                    index,
                    self.suggestions().len()
                ))
            })?;

        self.superseded = self.current_run.take();
        self.accepted = Some(suggestion.clone());
        self.last_error = None;
        self.state = ReviewState::Applying;
        debug!(
            column = %self.column,
            row = suggestion.target_row,
            reference_row = suggestion.reference_row,
            "Applying accepted suggestion"
        );

        Ok(ApplyRequest {
            handle: self.working_handle.clone(),
            column: self.column,
            suggestion,
        })
    }

    /// Consume the result of the request issued by `begin_apply`
    ///
    /// On success the loop re-enters `Running` and returns the follow-up
    /// clustering request. The superseded run stays as the fallback view,
    /// without its now-stale suggestions. On failure the run and its
    /// suggestions are restored unchanged and the error is returned.
    pub fn complete_apply(&mut self, result: PipelineResult<ApplyOutcome>) -> PipelineResult<RunRequest> {
        self.ensure(&[ReviewState::Applying], "complete suggestion apply")?;
        let accepted = self.accepted.take();

        match result {
            Ok(outcome) => {
                self.working_handle = outcome.resolve_handle(&self.working_handle);
                if !outcome.artifacts.is_empty() {
                    self.artifacts = outcome.artifacts;
                }
                self.current_run = self.superseded.take().map(|mut run| {
                    run.suggestions.clear();
                    run
                });
                info!(
                    column = %self.column,
                    row = ?accepted.as_ref().map(|s| s.target_row),
                    handle = %self.working_handle,
                    "Suggestion applied, re-clustering"
                );
                self.enter_running()
            }
            Err(e) => {
                warn!(column = %self.column, error = %e, "Applying suggestion failed");
                self.current_run = self.superseded.take();
                self.last_error = Some(e.to_string());
                self.state = ReviewState::Reviewing;
                Err(e)
            }
        }
    }

    /// Declare the stage satisfied and fix its output handle
    ///
    /// Allowed before any clustering ran, in which case the input passes
    /// through unchanged.
    pub fn proceed(&mut self) -> PipelineResult<&DatasetHandle> {
        self.ensure(&[ReviewState::Idle, ReviewState::Reviewing], "proceed")?;
        self.state = ReviewState::Satisfied;
        info!(
            column = %self.column,
            output = %self.working_handle,
            runs = self.runs_completed,
            "Stage satisfied"
        );
        Ok(self.output_handle.insert(self.working_handle.clone()))
    }

    /// Run clustering with the current threshold
    pub async fn run<S>(&mut self, service: &S) -> PipelineResult<()>
    where
        S: ClusteringService + ?Sized,
    {
        let request = self.begin_run()?;
        let result = service
            .run_clustering(&request.handle, request.column, request.threshold)
            .await;
        self.complete_run(result)
    }

    /// Accept one suggestion, apply it, then re-cluster the mutated dataset
    pub async fn accept<S>(&mut self, index: usize, service: &S) -> PipelineResult<()>
    where
        S: ClusteringService + ?Sized,
    {
        let request = self.begin_apply(index)?;
        let result = service
            .apply_suggestion(&request.handle, request.column, &request.suggestion)
            .await;
        let rerun = self.complete_apply(result)?;
        let result = service
            .run_clustering(&rerun.handle, rerun.column, rerun.threshold)
            .await;
        self.complete_run(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> DatasetHandle {
        DatasetHandle::new(name).unwrap()
    }

    fn review() -> ReviewLoop {
        ReviewLoop::new(StageColumn::ItemDescription, handle("clean_1.csv"), 0.8).unwrap()
    }

    fn run_with(output: &str, suggestions: Vec<Suggestion>) -> ClusterRun {
        ClusterRun::new(StageColumn::ItemDescription, 0.8, handle(output), suggestions).unwrap()
    }

    fn two_suggestions() -> Vec<Suggestion> {
        vec![
            Suggestion::new(5, "STEEL PIPE 2IN", "STEEL PIPE 2 IN", 1, 0.91).unwrap(),
            Suggestion::new(8, "COPPER WIRE", "COPPER WIRES", 3, 0.84).unwrap(),
        ]
    }

    #[test]
    fn test_initial_state() {
        let review = review();
        assert_eq!(review.state(), ReviewState::Idle);
        assert_eq!(review.working_handle(), review.input_handle());
        assert!(review.suggestions().is_empty());
        assert!(review.output_handle().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut review = review();
        let request = review.begin_run().unwrap();
        assert_eq!(request.handle, handle("clean_1.csv"));
        assert_eq!(review.state(), ReviewState::Running);
        assert!(review.is_busy());

        review
            .complete_run(Ok(run_with("progressive_clean_1.csv", two_suggestions())))
            .unwrap();
        assert_eq!(review.state(), ReviewState::Reviewing);
        assert_eq!(review.working_handle(), &handle("progressive_clean_1.csv"));
        assert_eq!(review.suggestions().len(), 2);
        assert_eq!(review.runs_completed(), 1);
    }

    #[test]
    fn test_busy_rejects_reentry() {
        let mut review = review();
        review.begin_run().unwrap();
        assert!(matches!(
            review.begin_run(),
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert!(review.set_threshold(0.5).is_err());
        assert!(review.proceed().is_err());
        assert!(review.begin_apply(0).is_err());
    }

    #[test]
    fn test_failed_first_run_returns_to_idle() {
        let mut review = review();
        review.begin_run().unwrap();
        let err = review
            .complete_run(Err(PipelineError::clustering_failed(
                StageColumn::ItemDescription,
                "Network error",
            )))
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(review.state(), ReviewState::Idle);
        assert!(review.last_error().unwrap().contains("Network error"));
    }

    #[test]
    fn test_failed_rerun_keeps_previous_run() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", two_suggestions()))).unwrap();

        review.begin_run().unwrap();
        assert!(
            review
                .complete_run(Err(PipelineError::clustering_failed(
                    StageColumn::ItemDescription,
                    "Server Error (500)",
                )))
                .is_err()
        );
        assert_eq!(review.state(), ReviewState::Reviewing);
        assert_eq!(review.suggestions(), two_suggestions().as_slice());
        assert!(review.last_error().is_some());

        // A new attempt clears the banner
        review.begin_run().unwrap();
        assert!(review.last_error().is_none());
    }

    #[test]
    fn test_accept_hides_other_suggestions() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", two_suggestions()))).unwrap();

        let request = review.begin_apply(0).unwrap();
        assert_eq!(request.suggestion.target_row, 5);
        assert_eq!(request.handle, handle("p.csv"));
        assert_eq!(review.state(), ReviewState::Applying);
        assert!(review.suggestions().is_empty());
        assert!(review.begin_apply(1).is_err());
    }

    #[test]
    fn test_apply_success_reenters_running() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", two_suggestions()))).unwrap();
        review.begin_apply(1).unwrap();

        let rerun = review
            .complete_apply(Ok(ApplyOutcome::with_handle(handle("p_v2.csv"))))
            .unwrap();
        assert_eq!(review.state(), ReviewState::Running);
        assert_eq!(rerun.handle, handle("p_v2.csv"));
        // Stale suggestions are gone but the preview stays as fallback
        assert!(review.current_run().is_some());
        assert!(review.suggestions().is_empty());
    }

    #[test]
    fn test_apply_failure_restores_suggestions() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", two_suggestions()))).unwrap();
        review.begin_apply(0).unwrap();

        let err = review
            .complete_apply(Err(PipelineError::apply_failed(5, "Invalid input")))
            .unwrap_err();
        assert!(matches!(err, PipelineError::SuggestionApply { row: 5, .. }));
        assert_eq!(review.state(), ReviewState::Reviewing);
        assert_eq!(review.suggestions(), two_suggestions().as_slice());
        assert_eq!(review.working_handle(), &handle("p.csv"));
        assert!(review.accepted().is_none());
    }

    #[test]
    fn test_unknown_suggestion_index() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", two_suggestions()))).unwrap();
        assert!(matches!(
            review.begin_apply(7),
            Err(PipelineError::InvalidSuggestion(_))
        ));
        assert_eq!(review.state(), ReviewState::Reviewing);
    }

    #[test]
    fn test_proceed_without_running_passes_input_through() {
        let mut review = review();
        let output = review.proceed().unwrap().clone();
        assert_eq!(output, handle("clean_1.csv"));
        assert!(review.is_satisfied());
        assert!(review.begin_run().is_err());
    }

    #[test]
    fn test_empty_suggestions_do_not_auto_satisfy() {
        let mut review = review();
        review.begin_run().unwrap();
        review.complete_run(Ok(run_with("p.csv", Vec::new()))).unwrap();
        assert_eq!(review.state(), ReviewState::Reviewing);
        assert!(review.set_threshold(0.6).is_ok());
    }

    #[test]
    fn test_threshold_validation() {
        let mut review = review();
        assert!(matches!(
            review.set_threshold(1.2),
            Err(PipelineError::InvalidThreshold(_))
        ));
        assert_eq!(review.threshold(), 0.8);
        assert!(ReviewLoop::new(StageColumn::ImporterName, handle("x.csv"), -1.0).is_err());
    }
}
