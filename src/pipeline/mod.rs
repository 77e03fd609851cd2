//! Sequential deduplication pipeline
//!
//! This module ties the stages together:
//! - Dataset handle registry shared across the whole workflow
//! - Stage sequencer walking item description → importer name → supplier name
//! - Client configuration and the pipeline error taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use trade_dedupe_sdk::pipeline::{Advance, HandleRegistry, StageSequencer};
//! use trade_dedupe_sdk::models::{DatasetHandle, HandlePosition};
//!
//! let registry = HandleRegistry::shared();
//! registry.set_handle(HandlePosition::Cleaned, DatasetHandle::new("clean_1.csv")?)?;
//!
//! let mut sequencer = StageSequencer::start(registry.clone())?;
//! while let Some(view) = sequencer.active_view_mut() {
//!     view.activate(&client).await?;
//!     // ... operator reviews, accepts suggestions, adjusts threshold ...
//!     view.proceed()?;
//!     if let Advance::Done(final_handle) = sequencer.advance()? {
//!         println!("Final dataset: {}", final_handle);
//!     }
//! }
//! let dataset_id = sequencer.finalize(&client).await?;
//! ```
//!
//! # Resume
//!
//! The registry can be saved after every advance and loaded later; a
//! sequencer started on a loaded registry continues at the first stage that
//! has no committed output.

mod config;
mod error;
mod registry;
mod sequencer;

pub use config::{ClientConfig, ENV_API_TOKEN, ENV_API_URL, ENV_TIMEOUT};
pub use error::{PipelineError, PipelineResult};
pub use registry::{HandleRegistry, RegistrySnapshot};
pub use sequencer::{Advance, StageSequencer};
