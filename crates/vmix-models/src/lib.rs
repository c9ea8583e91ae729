//! Shared data models for the variation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle states and the fixed variation table
//! - Clip generation tasks and their outcomes
//! - Request/response payloads of the orchestrator and ad-copy entry points
//! - Progress events streamed to observers

pub mod clip;
pub mod job;
pub mod progress;
pub mod request;

// Re-export common types
pub use clip::{ClipOutcome, ClipTask};
pub use job::{
    caption_target, variation_target, Job, JobId, JobState, MAX_CLIPS, MAX_VARIATIONS, MIN_CLIPS,
};
pub use progress::ProgressEvent;
pub use request::{AdCopy, GenerateAdCopyRequest, GenerateVariationsRequest, VariationsResult};
