//! Dataset handles and pipeline positions

use serde::{Deserialize, Serialize};

use super::column::StageColumn;
use crate::pipeline::{PipelineError, PipelineResult};

/// Opaque reference to a stored dataset version, issued by the clustering service
///
/// Handles are immutable; a mutated dataset gets a new handle (or the service
/// reports that the existing one was updated in place).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetHandle(String);

impl DatasetHandle {
    /// Create a handle, rejecting empty or blank identifiers
    pub fn new(value: impl Into<String>) -> PipelineResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PipelineError::InvalidHandle(
                "dataset handle cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatasetHandle {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetHandle> for String {
    fn from(handle: DatasetHandle) -> Self {
        handle.0
    }
}

impl AsRef<str> for DatasetHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A slot in the handle registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlePosition {
    /// Uploaded, unprocessed dataset
    Raw,
    /// Standardized dataset; the pipeline's starting point
    Cleaned,
    /// Output of a completed column stage
    Stage(StageColumn),
    /// Published result for downstream analyses
    Final,
}

impl std::fmt::Display for HandlePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Cleaned => write!(f, "cleaned"),
            Self::Stage(column) => write!(f, "stage[{}]", column),
            Self::Final => write!(f, "final"),
        }
    }
}
