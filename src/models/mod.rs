//! Models for the deduplication pipeline
//!
//! Defines the stage columns, dataset handles and clustering results shared by
//! the client, the review loop and the sequencer.

pub mod cluster;
pub mod column;
pub mod handle;

pub use cluster::{
    ClusterRun, DEFAULT_THRESHOLD, DownloadArtifact, PreviewRow, Suggestion, cell_text,
    validate_threshold,
};
pub use column::StageColumn;
pub use handle::{DatasetHandle, HandlePosition};
