//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vmix_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vmix_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vmix_http_requests_in_flight";

    // Progress streams
    pub const SSE_STREAMS_TOTAL: &str = "vmix_sse_streams_total";
    pub const SSE_STREAMS_ACTIVE: &str = "vmix_sse_streams_active";

    // Uploads
    pub const IMAGES_UPLOADED_TOTAL: &str = "vmix_images_uploaded_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record uploaded reference images.
pub fn record_images_uploaded(count: usize) {
    counter!(names::IMAGES_UPLOADED_TOTAL).increment(count as u64);
}

/// Tracks one open progress stream; the active gauge drops with it.
pub struct SseGuard(());

impl SseGuard {
    pub fn open() -> Self {
        counter!(names::SSE_STREAMS_TOTAL).increment(1);
        gauge!(names::SSE_STREAMS_ACTIVE).increment(1.0);
        Self(())
    }
}

impl Drop for SseGuard {
    fn drop(&mut self) {
        gauge!(names::SSE_STREAMS_ACTIVE).decrement(1.0);
    }
}

/// Collapse per-job path segments so labels stay bounded.
fn sanitize_path(path: &str) -> String {
    const PROGRESS_PREFIX: &str = "/api/v1/generate/progress/";

    if path.starts_with(PROGRESS_PREFIX) && path.len() > PROGRESS_PREFIX.len() {
        return format!("{}:job_id", PROGRESS_PREFIX);
    }
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/v1/generate/progress/550e8400-e29b"),
            "/api/v1/generate/progress/:job_id"
        );
        assert_eq!(sanitize_path("/api/v1/generate/video"), "/api/v1/generate/video");
        assert_eq!(sanitize_path("/api/v1/generate/progress/"), "/api/v1/generate/progress/");
    }
}
