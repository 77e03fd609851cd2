//! Dataset handle registry
//!
//! Holds the working dataset handle for every pipeline position and outlives
//! any single stage view. The registry is shared behind an `Arc`; readers are
//! unrestricted, but `stage[*]` and `final` can only be written through the
//! crate-private methods used by the stage sequencer.
//!
//! Positions always form a chain: stage outputs are a prefix of the column
//! order, each stage was committed against its predecessor's handle, and
//! `final` exists only as a copy of the last stage output. `raw` and `cleaned`
//! are frozen once anything downstream is committed; `reset` starts over.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{PipelineError, PipelineResult};
use crate::models::{DatasetHandle, HandlePosition, StageColumn};

/// Serializable contents of the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Uploaded dataset
    pub raw: Option<DatasetHandle>,
    /// Standardized dataset
    pub cleaned: Option<DatasetHandle>,
    /// Outputs of completed stages
    #[serde(default)]
    pub stages: BTreeMap<StageColumn, DatasetHandle>,
    /// Published result
    #[serde(rename = "final")]
    pub final_handle: Option<DatasetHandle>,
    /// When any position last changed
    pub updated_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    /// Look up a position
    pub fn get(&self, position: HandlePosition) -> Option<&DatasetHandle> {
        match position {
            HandlePosition::Raw => self.raw.as_ref(),
            HandlePosition::Cleaned => self.cleaned.as_ref(),
            HandlePosition::Stage(column) => self.stages.get(&column),
            HandlePosition::Final => self.final_handle.as_ref(),
        }
    }

    /// Columns whose stage output has been committed, in processing order
    pub fn completed_stages(&self) -> Vec<StageColumn> {
        self.stages.keys().copied().collect()
    }

    /// Handle a stage reads: `cleaned` for the first stage, else the previous output
    pub fn stage_input(&self, column: StageColumn) -> Option<&DatasetHandle> {
        match column.previous() {
            Some(previous) => self.stages.get(&previous),
            None => self.cleaned.as_ref(),
        }
    }

    fn has_derived(&self) -> bool {
        !self.stages.is_empty() || self.final_handle.is_some()
    }

    /// Check that the positions form a valid chain
    pub fn validate(&self) -> PipelineResult<()> {
        if self.has_derived() && self.cleaned.is_none() {
            return Err(PipelineError::CorruptState(
                "stage outputs recorded without a cleaned dataset".to_string(),
            ));
        }

        let mut missing: Option<StageColumn> = None;
        for column in StageColumn::all() {
            match (self.stages.contains_key(&column), missing) {
                (true, Some(gap)) => {
                    return Err(PipelineError::CorruptState(format!(
                        "stage {} committed before stage {}",
                        column, gap
                    )));
                }
                (false, None) => missing = Some(column),
                _ => {}
            }
        }

        if let Some(final_handle) = &self.final_handle {
            if let Some(gap) = missing {
                return Err(PipelineError::CorruptState(format!(
                    "final '{}' published before stage {}",
                    final_handle, gap
                )));
            }
            if self.stages.get(&StageColumn::SupplierName) != Some(final_handle) {
                return Err(PipelineError::CorruptState(format!(
                    "final '{}' differs from the last stage output",
                    final_handle
                )));
            }
        }
        Ok(())
    }
}

/// Process-wide registry of dataset handles
#[derive(Debug, Default)]
pub struct HandleRegistry {
    inner: RwLock<RegistrySnapshot>,
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry ready to be shared between components
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a registry from a snapshot, rejecting inconsistent ones
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> PipelineResult<Self> {
        snapshot.validate()?;
        Ok(Self {
            inner: RwLock::new(snapshot),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistrySnapshot> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistrySnapshot> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the handle stored at a position
    pub fn get_handle(&self, position: HandlePosition) -> Option<DatasetHandle> {
        self.read().get(position).cloned()
    }

    /// Overwrite the `raw` or `cleaned` handle
    ///
    /// Stage outputs and the final handle belong to the sequencer; writing them
    /// here is an `InvalidTransition`. Replacing `raw` or `cleaned` with a
    /// different handle is refused once a stage output is committed. A new
    /// `raw` before that point drops the stale `cleaned`.
    pub fn set_handle(&self, position: HandlePosition, handle: DatasetHandle) -> PipelineResult<()> {
        let mut inner = self.write();
        let current = match position {
            HandlePosition::Raw => inner.raw.as_ref(),
            HandlePosition::Cleaned => inner.cleaned.as_ref(),
            HandlePosition::Stage(_) | HandlePosition::Final => {
                return Err(PipelineError::invalid_transition(
                    "outside the stage sequencer",
                    format!("write {}", position),
                ));
            }
        };
        if current == Some(&handle) {
            return Ok(());
        }
        if inner.has_derived() {
            return Err(PipelineError::invalid_transition(
                "stage outputs are committed (reset the registry first)",
                format!("replace {}", position),
            ));
        }

        if position == HandlePosition::Raw {
            if let Some(cleaned) = inner.cleaned.take() {
                debug!(raw = %handle, stale = %cleaned, "New raw dataset, dropping cleaned handle");
            }
            inner.raw = Some(handle);
        } else {
            inner.cleaned = Some(handle);
        }
        inner.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Clear every position, e.g. before processing a new upload
    ///
    /// A sequencer still running on this registry can no longer commit.
    pub fn reset(&self) {
        let mut inner = self.write();
        info!("Resetting dataset handle registry");
        *inner = RegistrySnapshot {
            updated_at: Some(Utc::now()),
            ..RegistrySnapshot::default()
        };
    }

    /// Record the output of a completed stage
    ///
    /// `input` must still be the registry's handle for the stage's predecessor,
    /// and neither this stage nor a later one may be committed yet. The last
    /// stage also publishes `final`. Every check runs before anything is
    /// written.
    pub(crate) fn commit_stage(
        &self,
        column: StageColumn,
        input: &DatasetHandle,
        output: DatasetHandle,
    ) -> PipelineResult<()> {
        let mut inner = self.write();
        let action = format!("commit stage {}", column);

        if inner.stage_input(column) != Some(input) {
            return Err(PipelineError::invalid_transition(
                format!("stage input '{}' no longer matches the registry", input),
                action,
            ));
        }
        if let Some(committed) = StageColumn::all()
            .into_iter()
            .find(|c| *c >= column && inner.stages.contains_key(c))
        {
            return Err(PipelineError::invalid_transition(
                format!("stage {} is already committed", committed),
                action,
            ));
        }
        if column.is_last() {
            if let Some(existing) = &inner.final_handle {
                return Err(PipelineError::invalid_transition(
                    format!("final already published as '{}'", existing),
                    action,
                ));
            }
        }

        info!(stage = %column, handle = %output, "Committing stage output");
        inner.stages.insert(column, output.clone());
        if column.is_last() {
            info!(handle = %output, "Publishing final dataset handle");
            inner.final_handle = Some(output);
        }
        inner.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Publish `final` from a fully committed registry that lacks it
    pub(crate) fn publish_final(&self) -> PipelineResult<DatasetHandle> {
        let mut inner = self.write();
        if let Some(existing) = &inner.final_handle {
            return Err(PipelineError::invalid_transition(
                format!("final already published as '{}'", existing),
                "publish final handle",
            ));
        }
        let last = inner
            .stages
            .get(&StageColumn::SupplierName)
            .cloned()
            .filter(|_| inner.stages.len() == StageColumn::all().len())
            .ok_or_else(|| {
                PipelineError::invalid_transition(
                    "not every stage is committed",
                    "publish final handle",
                )
            })?;

        info!(handle = %last, "Publishing final dataset handle");
        inner.final_handle = Some(last.clone());
        inner.updated_at = Some(Utc::now());
        Ok(last)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.read().clone()
    }

    /// Save the registry to a JSON file
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(&*self.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a registry from a JSON file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!(
                "registry state file {}",
                path.display()
            )));
        }
        let json = std::fs::read_to_string(path)?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&json)?;
        Self::from_snapshot(snapshot)
    }
}
