//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job store and orchestrator (enqueues, claims, outcomes, retries)
//! - Provider backends (call duration, fallbacks, tokens)
//! - Integration connectivity tests and the worker supervisor

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs enqueued by kind.
pub static JOBS_ENQUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_jobs_enqueued_total", "Total jobs enqueued"),
        &["kind", "created"], // created: "true", "false" (idempotent hit)
    )
    .unwrap()
});

/// Jobs claimed by workers.
pub static JOBS_CLAIMED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_jobs_claimed_total", "Total job claims"),
        &["kind"],
    )
    .unwrap()
});

/// Jobs reaching a terminal status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_jobs_finished_total", "Total jobs finished"),
        &["kind", "status"], // "succeeded", "failed", "dead", "cancelled"
    )
    .unwrap()
});

/// Jobs requeued after a transient failure.
pub static JOB_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_job_retries_total", "Total jobs requeued for retry"),
        &["kind", "error"],
    )
    .unwrap()
});

/// Leases lost while a job was running.
pub static LEASES_LOST: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "genjobs_leases_lost_total",
        "Total job leases lost to another worker",
    )
    .unwrap()
});

/// Wall time from claim to outcome.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("genjobs_job_duration_seconds", "Duration of one job attempt")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["kind", "outcome"],
    )
    .unwrap()
});

// =============================================================================
// Provider backends
// =============================================================================

/// Backend call duration in seconds.
pub static BACKEND_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "genjobs_backend_call_duration_seconds",
            "Duration of provider backend calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["backend", "outcome"], // outcome: "success" or an error kind
    )
    .unwrap()
});

/// Fallbacks to a lower-priority backend within one attempt.
pub static BACKEND_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_backend_fallbacks_total", "Total backend fallbacks"),
        &["capability"],
    )
    .unwrap()
});

/// Text tokens used.
pub static TEXT_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("genjobs_text_tokens_total", "Total text generation tokens used"),
        &["backend", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Connectivity and supervisor
// =============================================================================

/// Connectivity tests by result.
pub static CONNECTIVITY_TESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "genjobs_connectivity_tests_total",
            "Total integration connectivity tests",
        ),
        &["provider_type", "result"], // "ok", "failed"
    )
    .unwrap()
});

/// Worker processes spawned by the supervisor.
pub static WORKER_SPAWNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("genjobs_worker_spawns_total", "Total worker processes spawned").unwrap()
});

/// 1 while the supervised worker process is alive.
pub static WORKER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("genjobs_worker_running", "Whether the worker process is running").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_ENQUEUED.clone()),
        Box::new(JOBS_CLAIMED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_RETRIES.clone()),
        Box::new(LEASES_LOST.clone()),
        Box::new(JOB_DURATION.clone()),
        // Backends
        Box::new(BACKEND_CALL_DURATION.clone()),
        Box::new(BACKEND_FALLBACKS.clone()),
        Box::new(TEXT_TOKENS.clone()),
        // Connectivity and supervisor
        Box::new(CONNECTIVITY_TESTS.clone()),
        Box::new(WORKER_SPAWNS.clone()),
        Box::new(WORKER_RUNNING.clone()),
    ]
}
