//! Job storage trait and errors.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{EnqueueRequest, Enqueued, Job, JobFailure, JobKind, JobStatus};

/// Error type for job store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStoreError {
    /// Job not found.
    NotFound(String),
    /// Cannot perform operation due to current status.
    InvalidState {
        job_id: String,
        current_status: JobStatus,
        operation: String,
    },
    /// The caller no longer holds the job's lease.
    LeaseLost { job_id: String, worker_id: String },
    /// Database error.
    Database(String),
}

impl fmt::Display for JobStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStoreError::NotFound(id) => write!(f, "Job not found: {}", id),
            JobStoreError::InvalidState {
                job_id,
                current_status,
                operation,
            } => write!(
                f,
                "Cannot {} job {}: current status is {}",
                operation, job_id, current_status
            ),
            JobStoreError::LeaseLost { job_id, worker_id } => {
                write!(f, "Worker {} no longer holds the lease on job {}", worker_id, job_id)
            }
            JobStoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for JobStoreError {}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub project_id: Option<String>,
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            project_id: None,
            status: None,
            kind: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was queued and is now cancelled.
    Cancelled,
    /// The job is running; its worker will cancel it at the next check.
    Requested,
}

/// Durable job storage shared by the API and every worker.
///
/// Every write made on behalf of a worker is guarded by `locked_by = worker_id`
/// and fails with [`JobStoreError::LeaseLost`] when another worker owns the job.
/// Methods take `now` explicitly so lease arithmetic stays testable.
pub trait JobStore: Send + Sync {
    /// Insert a job, or return the existing one with the same
    /// `(project_id, kind, idempotency_key)`.
    fn enqueue(&self, request: EnqueueRequest, now: DateTime<Utc>)
        -> Result<Enqueued, JobStoreError>;

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError>;

    /// The job `enqueue` would return for `request` without inserting, if any.
    fn find_existing(&self, request: &EnqueueRequest) -> Result<Option<Job>, JobStoreError>;

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Atomically lease the oldest eligible job of one of `kinds`.
    ///
    /// Eligible jobs are queued with `run_after <= now`, or running with an
    /// expired lease. Claiming increments `attempt_count`. Expired leases whose
    /// attempts are used up are moved to `dead` first.
    fn claim(
        &self,
        worker_id: &str,
        kinds: &[JobKind],
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, JobStoreError>;

    /// Extend the lease. Returns `false` when the lease is no longer ours.
    fn heartbeat(
        &self,
        id: &str,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, JobStoreError>;

    /// Write the result and mark the job succeeded.
    fn complete(
        &self,
        id: &str,
        worker_id: &str,
        result: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError>;

    /// Release the lease and requeue the job to run no earlier than `run_after`.
    fn retry_later(
        &self,
        id: &str,
        worker_id: &str,
        failure: &JobFailure,
        run_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError>;

    /// Release the lease with a terminal status (`failed`, `dead` or `cancelled`).
    fn finish(
        &self,
        id: &str,
        worker_id: &str,
        status: JobStatus,
        failure: Option<&JobFailure>,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError>;

    /// Cancel a queued job, or flag a running one for its worker.
    fn request_cancel(&self, id: &str, now: DateTime<Utc>) -> Result<CancelOutcome, JobStoreError>;
}
