//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that renders them.

use metrics::{counter, histogram};

use crate::error::ErrorKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vmix_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vmix_jobs_failed_total";
    pub const VARIATIONS_UPLOADED_TOTAL: &str = "vmix_variations_uploaded_total";
    pub const CLIPS_GENERATED_TOTAL: &str = "vmix_clips_generated_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "vmix_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vmix_upload_duration_seconds";
}

/// Record a finished job by operation.
pub fn record_job_completed(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a failed job by operation and failure kind.
pub fn record_job_failed(operation: &str, kind: ErrorKind) {
    let labels = [
        ("operation", operation.to_string()),
        ("kind", kind.as_str().to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record settled clip generations.
pub fn record_clips_generated(succeeded: usize, failed: usize) {
    counter!(names::CLIPS_GENERATED_TOTAL, "status" => "success").increment(succeeded as u64);
    counter!(names::CLIPS_GENERATED_TOTAL, "status" => "failed").increment(failed as u64);
}

pub fn record_variation_uploaded() {
    counter!(names::VARIATIONS_UPLOADED_TOTAL).increment(1);
}

pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}
