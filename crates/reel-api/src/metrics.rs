//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "reel_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reel_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "reel_http_requests_in_flight";

    // Job lifecycle metrics
    pub const JOBS_CREATED_TOTAL: &str = "reel_jobs_created_total";
    pub const JOBS_REJECTED_TOTAL: &str = "reel_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const JOBS_TIMED_OUT_TOTAL: &str = "reel_jobs_timed_out_total";

    // Outbound calls
    pub const DISPATCH_DURATION_SECONDS: &str = "reel_dispatch_duration_seconds";
    pub const DISPATCH_FAILURES_TOTAL: &str = "reel_dispatch_failures_total";
    pub const NOTIFY_FAILURES_TOTAL: &str = "reel_notify_failures_total";
}

static JOB_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/jobs/[^/]+").expect("valid job path regex"));

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

/// Record a dispatched job.
pub fn record_job_created() {
    counter!(names::JOBS_CREATED_TOTAL).increment(1);
}

/// Record a creation that was refused before dispatch completed.
pub fn record_job_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record job completed.
pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record job failed.
pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

/// Record a job force-failed by the watchdog.
pub fn record_job_timed_out() {
    counter!(names::JOBS_TIMED_OUT_TOTAL).increment(1);
}

/// Record a work order submission round trip.
pub fn record_dispatch_duration(duration_secs: f64) {
    histogram!(names::DISPATCH_DURATION_SECONDS).record(duration_secs);
}

/// Record a submission refused by remote compute.
pub fn record_dispatch_failure(status: Option<u16>) {
    let labels = [(
        "status",
        status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
    )];
    counter!(names::DISPATCH_FAILURES_TOTAL, &labels).increment(1);
}

/// Record an undelivered caller webhook.
pub fn record_notify_failure() {
    counter!(names::NOTIFY_FAILURES_TOTAL).increment(1);
}

/// Sanitize path for metrics labels (collapse job IDs).
fn sanitize_path(path: &str) -> String {
    JOB_SEGMENT.replace(path, "/jobs/:job_id").to_string()
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
        assert_eq!(sanitize_path("/jobs/job-1712-abcd1234"), "/jobs/:job_id");
        assert_eq!(
            sanitize_path("/jobs/my.custom_id/progress"),
            "/jobs/:job_id/progress"
        );
        assert_eq!(sanitize_path("/jobs"), "/jobs");
        assert_eq!(sanitize_path("/internal/callback"), "/internal/callback");
    }
}
