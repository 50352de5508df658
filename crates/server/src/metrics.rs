//! Prometheus metrics for the API server.
//!
//! HTTP metrics live here; job, backend and worker metrics are defined in
//! `genjobs_core::metrics` and registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use genjobs_core::{JobFilter, JobStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "genjobs_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "genjobs_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "genjobs_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Job Metrics (collected dynamically)
// =============================================================================

/// Jobs by current status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("genjobs_jobs_by_status", "Current job count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Jobs
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (jobs, backends, connectivity, worker process)
    for metric in genjobs_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges that mirror the job store before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let job_store = state.job_store();
    for status in JobStatus::ALL {
        let filter = JobFilter::new().with_status(status);
        if let Ok(count) = job_store.count(&filter) {
            JOBS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static INTEGRATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/v1/integrations/[^/]+/([^/]+)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Project ids in integration paths are collapsed so label cardinality does
/// not grow with the number of shops.
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = INTEGRATION_RE.replace(&result, "/api/v1/integrations/{project_id}/$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}");
    }

    #[test]
    fn test_normalize_path_uuid_middle() {
        let path = "/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000/cancel";
        assert_eq!(normalize_path(path), "/api/v1/jobs/{id}/cancel");
    }

    #[test]
    fn test_normalize_path_integration_project() {
        let path = "/api/v1/integrations/shop-42/openai/test";
        assert_eq!(
            normalize_path(path),
            "/api/v1/integrations/{project_id}/openai/test"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("genjobs_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        JOBS_BY_STATUS.with_label_values(&["queued"]).set(0);
        genjobs_core::metrics::JOBS_CLAIMED
            .with_label_values(&["text_generation"])
            .inc();
        genjobs_core::metrics::WORKER_RUNNING.set(0);

        let output = encode_metrics();

        assert!(output.contains("genjobs_jobs_by_status"));
        assert!(output.contains("genjobs_jobs_claimed_total"));
        assert!(output.contains("genjobs_worker_running"));
    }
}
