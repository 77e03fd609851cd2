//! Trade Dedupe SDK - Sequential fuzzy deduplication for cleaned trade data
//!
//! Provides unified interfaces for:
//! - Dataset handle registry (raw, cleaned, per-stage and final versions)
//! - Similarity clustering client (HTTP backend behind `api-backend`)
//! - Suggestion review loop (cluster → review → apply → re-cluster)
//! - Stage sequencing over item description, importer name and supplier name
//! - Stage view models for front ends

pub mod client;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod stage;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use client::{ApplyOutcome, ClusteringService};
#[cfg(feature = "api-backend")]
pub use client::ApiClusteringClient;

pub use models::{
    ClusterRun, DEFAULT_THRESHOLD, DatasetHandle, DownloadArtifact, HandlePosition, PreviewRow,
    StageColumn, Suggestion,
};

pub use pipeline::{
    Advance, ClientConfig, HandleRegistry, PipelineError, PipelineResult, RegistrySnapshot,
    StageSequencer,
};

pub use review::{ReviewLoop, ReviewState};
pub use stage::{StageDefinition, StageSnapshot, StageView, STAGES};
