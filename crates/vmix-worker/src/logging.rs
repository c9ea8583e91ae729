//! Structured job logging.

use tracing::{error, info, warn, Span};
use vmix_models::JobId;

use crate::error::ErrorKind;

/// Logger carrying the job id and pipeline operation on every event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    /// Create a logger for `operation` (e.g. "generate_variations", "mix_local").
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, percent: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            progress = percent,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    /// Log a failure with its stage kind.
    pub fn log_error(&self, kind: ErrorKind, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            kind = %kind,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span wrapping the whole job, for `Instrument`.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation
        )
    }
}
