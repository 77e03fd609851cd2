//! Stage sequencer: walks the fixed column order and threads handles through the registry

use std::sync::Arc;

use tracing::{debug, info, info_span};

use super::error::{PipelineError, PipelineResult};
use super::registry::HandleRegistry;
use crate::client::ClusteringService;
use crate::models::{DEFAULT_THRESHOLD, DatasetHandle, HandlePosition, StageColumn, validate_threshold};
use crate::stage::StageView;

/// Result of a successful `advance`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next stage is now active
    Stage(StageColumn),
    /// All stages are complete; carries the published final handle
    Done(DatasetHandle),
}

/// Drives the three stages in order
///
/// The sequencer is the only writer of `stage[*]` and `final` in the registry.
pub struct StageSequencer {
    registry: Arc<HandleRegistry>,
    active: Option<StageView>,
    threshold: f64,
    finalized: Option<String>,
}

impl StageSequencer {
    /// Start the pipeline with the default threshold
    ///
    /// Fails with `MissingInput` when no cleaned dataset is registered.
    pub fn start(registry: Arc<HandleRegistry>) -> PipelineResult<Self> {
        Self::start_with_threshold(registry, DEFAULT_THRESHOLD)
    }

    /// Start the pipeline; each stage's view begins with `threshold`
    ///
    /// Stages already committed in the registry are skipped, so a registry
    /// loaded from a saved snapshot resumes at its first incomplete stage.
    pub fn start_with_threshold(registry: Arc<HandleRegistry>, threshold: f64) -> PipelineResult<Self> {
        let threshold = validate_threshold(threshold)?;
        let snapshot = registry.snapshot();
        snapshot.validate()?;

        let cleaned = snapshot.cleaned.clone().ok_or_else(|| {
            PipelineError::MissingInput("cleaned dataset (no cleaned file found)".to_string())
        })?;

        let mut input = cleaned;
        let mut pending = Some(StageColumn::first());
        while let Some(column) = pending {
            match snapshot.stages.get(&column) {
                Some(output) => {
                    debug!(stage = %column, output = %output, "Stage already completed, skipping");
                    input = output.clone();
                    pending = column.next();
                }
                None => break,
            }
        }

        let active = match pending {
            Some(column) => {
                info!(stage = %column, input = %input, threshold, "Starting stage");
                Some(StageView::new(column, input, threshold)?)
            }
            None => {
                if snapshot.final_handle.is_none() {
                    registry.publish_final()?;
                }
                info!("All stages already completed");
                None
            }
        };

        Ok(Self {
            registry,
            active,
            threshold,
            finalized: None,
        })
    }

    /// Column of the active stage; `None` once all stages are done
    pub fn current_stage(&self) -> Option<StageColumn> {
        self.active.as_ref().map(StageView::column)
    }

    pub fn active_view(&self) -> Option<&StageView> {
        self.active.as_ref()
    }

    pub fn active_view_mut(&mut self) -> Option<&mut StageView> {
        self.active.as_mut()
    }

    pub fn is_done(&self) -> bool {
        self.active.is_none()
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Published final handle, if the pipeline is done
    pub fn final_handle(&self) -> Option<DatasetHandle> {
        self.registry.get_handle(HandlePosition::Final)
    }

    /// Commit the satisfied stage and move to the next one
    ///
    /// Calling this before the active stage is satisfied is a programming
    /// error: it returns `InvalidTransition` and leaves the registry untouched.
    /// The same holds when the registry no longer carries the handle this
    /// stage started from, e.g. after a `reset`.
    pub fn advance(&mut self) -> PipelineResult<Advance> {
        let view = self
            .active
            .as_ref()
            .ok_or_else(|| PipelineError::invalid_transition("all stages are done", "advance"))?;
        let column = view.column();
        let review = view.review();

        if !review.is_satisfied() {
            return Err(PipelineError::invalid_transition(
                format!("stage {} is {}", column, review.state()),
                "advance",
            ));
        }
        let output = review.output_handle().cloned().ok_or_else(|| {
            PipelineError::invalid_transition(
                format!("stage {} has no output", column),
                "advance",
            )
        })?;

        let _span = info_span!("stage_advance", stage = %column).entered();
        self.registry
            .commit_stage(column, review.input_handle(), output.clone())?;

        match column.next() {
            Some(next) => {
                info!(from = %column, to = %next, input = %output, "Advancing to next stage");
                self.active = Some(StageView::new(next, output, self.threshold)?);
                Ok(Advance::Stage(next))
            }
            None => {
                self.active = None;
                info!(final_handle = %output, "Pipeline completed");
                Ok(Advance::Done(output))
            }
        }
    }

    /// Hand the final dataset to downstream analyses
    ///
    /// Only valid once every stage is done. The identifier is cached, so the
    /// service is asked at most once.
    pub async fn finalize<S>(&mut self, service: &S) -> PipelineResult<String>
    where
        S: ClusteringService + ?Sized,
    {
        if let Some(id) = &self.finalized {
            return Ok(id.clone());
        }
        let handle = self.final_handle().ok_or_else(|| {
            PipelineError::invalid_transition(
                format!(
                    "stage {} is still active",
                    self.current_stage()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "?".to_string())
                ),
                "finalize",
            )
        })?;

        let id = service.finalize_dataset(&handle).await?;
        info!(final_handle = %handle, dataset = %id, "Final dataset published for analysis");
        self.finalized = Some(id.clone());
        Ok(id)
    }
}
