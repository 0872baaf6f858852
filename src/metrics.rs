//! Prometheus metrics for filegate.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "filegate_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "filegate_http_request_duration_seconds";

/// Files served by `/download` (counter).
pub const DOWNLOADS_SERVED_TOTAL: &str = "filegate_downloads_served_total";

/// Bytes served by `/download` (counter).
pub const BYTES_SENT_TOTAL: &str = "filegate_bytes_sent_total";

/// Files stored by `/upload` (counter).
pub const UPLOADS_TOTAL: &str = "filegate_uploads_total";

/// Download counter increments applied by the background worker (counter).
pub const COUNTER_INCREMENTS_TOTAL: &str = "filegate_counter_increments_total";

/// Download counter increments lost (counter). Labels: reason (dropped, store).
pub const COUNTER_INCREMENT_ERRORS_TOTAL: &str = "filegate_counter_increment_errors_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(DOWNLOADS_SERVED_TOTAL, "Files served");
    describe_counter!(BYTES_SENT_TOTAL, "Bytes served by downloads");
    describe_counter!(UPLOADS_TOTAL, "Files uploaded");
    describe_counter!(
        COUNTER_INCREMENTS_TOTAL,
        "Download counter increments applied"
    );
    describe_counter!(
        COUNTER_INCREMENT_ERRORS_TOTAL,
        "Download counter increments lost"
    );
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Endpoints whose trailing path segment(s) name a file.
const FILE_ROUTES: &[&str] = &["/generate/", "/download/", "/stats/", "/reset-stats/"];

/// Normalize an actual request path to a route template for metric labels.
///
/// This prevents high-cardinality labels from unique filenames.
///
/// Examples:
/// - `/files` -> `/files`
/// - `/download/a/b.pdf` -> `/download/{filename}`
/// - `/no/such/route` -> `other`
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/metrics" | "/openapi.json" | "/upload" | "/files" | "/all-stats"
        | "/debug/kv" => path.to_string(),
        _ => FILE_ROUTES
            .iter()
            .find(|prefix| path.starts_with(**prefix))
            .map(|prefix| format!("{prefix}{{filename}}"))
            .unwrap_or_else(|| "other".to_string()),
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; version=0.0.4")],
            String::new(),
        ),
    }
}

// -- Tests --------------------------------------------------------------------
