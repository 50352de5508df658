//! Types for the job orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::job::{JobFailure, JobStoreError};

/// Errors that stop the orchestrator from settling a job.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),

    /// Invalid orchestrator configuration.
    #[error("invalid orchestrator config: {0}")]
    Config(String),
}

/// What happened to a claimed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { job_id: String },
    Retrying { job_id: String, run_after: DateTime<Utc> },
    Failed { job_id: String },
    Dead { job_id: String },
    Cancelled { job_id: String },
    /// Another worker took over; nothing was written.
    LeaseLost { job_id: String },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Succeeded { job_id }
            | JobOutcome::Retrying { job_id, .. }
            | JobOutcome::Failed { job_id }
            | JobOutcome::Dead { job_id }
            | JobOutcome::Cancelled { job_id }
            | JobOutcome::LeaseLost { job_id } => job_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded { .. } => "succeeded",
            JobOutcome::Retrying { .. } => "retrying",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Dead { .. } => "dead",
            JobOutcome::Cancelled { .. } => "cancelled",
            JobOutcome::LeaseLost { .. } => "lease_lost",
        }
    }
}

/// A failed attempt, classified for the retry decision.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttemptFailure {
    pub failure: JobFailure,
    pub retryable: bool,
}

impl AttemptFailure {
    pub fn transient(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: JobFailure::new(kind, message),
            retryable: true,
        }
    }

    pub fn permanent(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: JobFailure::new(kind, message),
            retryable: false,
        }
    }
}
