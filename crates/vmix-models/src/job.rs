//! Job definitions for the variation pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Smallest supported number of clips (prompts) per job.
pub const MIN_CLIPS: usize = 4;

/// Largest supported number of clips (prompts) per job.
pub const MAX_CLIPS: usize = 6;

/// Variations requested per clip count, indexed from `MIN_CLIPS`.
const VARIATION_TABLE: [usize; MAX_CLIPS - MIN_CLIPS + 1] = [20, 50, 100];

/// Captions produced per clip count, indexed from `MIN_CLIPS`.
const CAPTION_TABLE: [usize; MAX_CLIPS - MIN_CLIPS + 1] = [5, 10, 15];

/// Largest variation count any request can ask for.
pub const MAX_VARIATIONS: usize = VARIATION_TABLE[MAX_CLIPS - MIN_CLIPS];

fn table_lookup(table: &[usize], clip_count: usize) -> Option<usize> {
    clip_count
        .checked_sub(MIN_CLIPS)
        .and_then(|offset| table.get(offset))
        .copied()
}

/// Number of variations requested for a given clip count.
///
/// The table is fixed: 4 clips → 20, 5 clips → 50, 6 clips → 100.
/// Any other clip count is unsupported.
pub fn variation_target(clip_count: usize) -> Option<usize> {
    table_lookup(&VARIATION_TABLE, clip_count)
}

/// Number of captions mixed for a given clip count: 4 → 5, 5 → 10, 6 → 15.
pub fn caption_target(clip_count: usize) -> Option<usize> {
    table_lookup(&CAPTION_TABLE, clip_count)
}

/// Unique identifier for a job.
///
/// Job ids are supplied by the caller so that a progress subscription can
/// be opened before the job starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Generate a short random id (first UUID segment).
    pub fn short() -> Self {
        let full = Uuid::new_v4().to_string();
        Self(full.split('-').next().unwrap_or(&full).to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted, nothing started yet
    #[default]
    Pending,
    /// Clips and narration are being generated
    Generating,
    /// Generated clips are being fetched locally
    Downloading,
    /// Orderings are being concatenated and muxed
    Stitching,
    /// Variations are being pushed to storage
    Uploading,
    /// Job finished with all variations uploaded
    Completed,
    /// Job aborted
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Generating => "generating",
            JobState::Downloading => "downloading",
            JobState::Stitching => "stitching",
            JobState::Uploading => "uploading",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory record of one pipeline run.
///
/// A job lives only for the duration of a single orchestration call and is
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Caller-supplied job ID
    pub id: JobId,

    /// Reference image URLs
    pub images: Vec<String>,

    /// Visual prompts, one clip per prompt
    pub prompts: Vec<String>,

    /// Narration script
    pub script: String,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Public URLs of uploaded variations
    #[serde(default)]
    pub variations: Vec<String>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job.
    pub fn new(
        id: JobId,
        images: Vec<String>,
        prompts: Vec<String>,
        script: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            images,
            prompts,
            script: script.into(),
            state: JobState::Pending,
            progress: 0,
            variations: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of clips this job generates.
    pub fn clip_count(&self) -> usize {
        self.prompts.len()
    }

    /// Move to a new state.
    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Record progress; never moves backwards.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
    }

    /// Mark job as completed.
    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.progress = 100;
        self.updated_at = Utc::now();
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(images: usize, prompts: usize) -> Job {
        Job::new(
            JobId::from_string("job-1"),
            (0..images).map(|i| format!("https://img/{}.png", i)).collect(),
            (0..prompts).map(|i| format!("prompt {}", i)).collect(),
            "script",
        )
    }

    #[test]
    fn test_variation_table() {
        assert_eq!(variation_target(4), Some(20));
        assert_eq!(variation_target(5), Some(50));
        assert_eq!(variation_target(6), Some(100));
        assert_eq!(variation_target(3), None);
        assert_eq!(variation_target(7), None);
        assert_eq!(variation_target(0), None);
        assert_eq!(MAX_VARIATIONS, 100);
    }

    #[test]
    fn test_caption_table() {
        assert_eq!(caption_target(MIN_CLIPS), Some(5));
        assert_eq!(caption_target(5), Some(10));
        assert_eq!(caption_target(MAX_CLIPS), Some(15));
        assert_eq!(caption_target(MIN_CLIPS - 1), None);
        assert_eq!(caption_target(MAX_CLIPS + 1), None);
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = sample_job(1, 4);
        assert_eq!(job.state, JobState::Pending);

        job.transition(JobState::Generating);
        job.set_progress(40);
        job.set_progress(20);
        assert_eq!(job.progress, 40);

        job.complete();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.state.as_str(), "completed");
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_job_failure() {
        let mut job = sample_job(1, 5);
        job.fail("Failed to generate all clips.");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Failed to generate all clips."));
    }

    #[test]
    fn test_short_id() {
        let id = JobId::short();
        assert_eq!(id.as_str().len(), 8);
        assert!(!id.as_str().contains('-'));
    }
}
