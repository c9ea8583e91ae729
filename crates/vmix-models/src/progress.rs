//! Progress events streamed to observers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// One progress notification for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Job the event belongs to
    pub job_id: JobId,
    /// Human-readable status line
    pub message: String,
    /// Percent complete (0-100)
    pub progress: u8,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: JobId, message: impl Into<String>, progress: u8) -> Self {
        Self {
            job_id,
            message: message.into(),
            progress: progress.min(100),
            timestamp: Utc::now(),
        }
    }

    /// Whether this event marks the end of a successful job.
    pub fn is_done(&self) -> bool {
        self.progress >= 100
    }

    /// Payload pushed to subscribers: `{message, progress}`.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "progress": self.progress,
        })
    }
}
