//! Variation pipeline.
//!
//! This crate provides:
//! - [`VariationPipeline`]: clip generation, narration, stitching and upload for one job
//! - [`LocalMixer`]: the same stitching over caller-supplied local files
//! - Ad-copy drafting with locally mixed captions
//! - Image uploads for reference images
//! - Progress broadcast with per-job monotonic reporters
//! - Per-job temp workspace with guaranteed purge

pub mod captions;
pub mod clip_worker;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod mixer;
pub mod narration;
pub mod orchestrator;
pub mod progress;
pub mod uploads;
pub mod workspace;

pub use captions::{generate_ad_copy, mix_captions};
pub use config::WorkerConfig;
pub use error::{ErrorKind, JobFailure, PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use mixer::{LocalMixer, MixResult, MIN_MIX_CLIPS};
pub use orchestrator::{PipelineDeps, VariationPipeline};
pub use progress::{ProgressChannel, ProgressReporter};
pub use uploads::{upload_images, ImageFile, ImageUploadResult, MAX_IMAGE_FILES};
pub use workspace::{sweep_stale, Workspace};
