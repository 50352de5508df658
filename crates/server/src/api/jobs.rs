//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use genjobs_core::{
    validate_payload, CancelOutcome, EnqueueRequest, Identity, Job, JobFailure, JobFilter,
    JobKind, JobStatus, JobStoreError, RegistryError,
};

use super::{api_error, api_error_kind, internal_error, ApiError};
use crate::api::middleware::Caller;
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for enqueueing a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub kind: String,
    pub project_id: String,
    pub payload: serde_json::Value,
    /// Derived from kind and payload when absent.
    pub idempotency_key: Option<String>,
    /// Defaults to the orchestrator's configured attempt limit.
    pub max_attempts: Option<u32>,
}

/// Response for an enqueue call
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    /// False when the idempotency key matched an existing job.
    pub created: bool,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub project_id: Option<String>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Job as returned by the API
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub project_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub cancel_requested: bool,
    pub run_after: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            project_id: job.project_id,
            kind: job.kind,
            status: job.status,
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            result: job.result,
            error: job.last_error,
            cancel_requested: job.cancel_requested,
            run_after: job.run_after.to_rfc3339(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for a cancel request
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub cancel_requested: bool,
}

fn forbidden(project_id: &str) -> ApiError {
    api_error(
        StatusCode::FORBIDDEN,
        format!("Not allowed to access project {}", project_id),
    )
}

/// Load a job the caller may see. Jobs in other projects read as missing.
fn load_job(state: &AppState, identity: &Identity, id: &str) -> Result<Job, ApiError> {
    match state.job_store().get(id) {
        Ok(Some(job)) if identity.can_access(&job.project_id) => Ok(job),
        Ok(_) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Enqueue a job, or return the existing one for a repeated idempotency key.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let kind: JobKind = body
        .kind
        .parse()
        .map_err(|e: String| api_error_kind(StatusCode::UNPROCESSABLE_ENTITY, "invalid_kind", e))?;

    if !identity.can_access(&body.project_id) {
        return Err(forbidden(&body.project_id));
    }

    validate_payload(kind, &body.payload).map_err(|e| {
        api_error_kind(StatusCode::UNPROCESSABLE_ENTITY, "invalid_payload", e.to_string())
    })?;

    let max_attempts = body
        .max_attempts
        .unwrap_or(state.config().orchestrator.max_attempts);
    if max_attempts == 0 {
        return Err(api_error_kind(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_max_attempts",
            "max_attempts must be at least 1",
        ));
    }

    let mut request =
        EnqueueRequest::new(&body.project_id, kind, body.payload).with_max_attempts(max_attempts);
    if let Some(key) = body.idempotency_key {
        request = request.with_idempotency_key(key);
    }

    // Missing configuration is reported now instead of failing in the worker,
    // unless the key already names a job. Unreachable backends may recover
    // before the job runs.
    let existing = state
        .job_store()
        .find_existing(&request)
        .map_err(internal_error)?;
    if existing.is_none() {
        match state.registry().resolve(kind.capability(), &body.project_id) {
            Ok(_) | Err(RegistryError::AllBackendsUnreachable { .. }) => {}
            Err(e @ RegistryError::NoBackendConfigured { .. }) => {
                return Err(api_error_kind(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    e.kind(),
                    e.to_string(),
                ));
            }
            Err(e) => return Err(internal_error(e)),
        }
    }

    let enqueued = state
        .job_store()
        .enqueue(request, Utc::now())
        .map_err(internal_error)?;

    if enqueued.created {
        info!(
            job_id = %enqueued.job.id,
            project_id = %enqueued.job.project_id,
            kind = %kind,
            requested_by = %identity.user_id,
            "Job enqueued"
        );
    }

    // The job is durable at this point; a worker that fails to start is
    // retried by the next enqueue or an explicit start call.
    if !enqueued.job.status.is_terminal() {
        if let Err(e) = state.supervisor().ensure_running().await {
            warn!(job_id = %enqueued.job.id, "Failed to start worker: {}", e);
        }
    }

    let status = if enqueued.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(CreateJobResponse {
            job_id: enqueued.job.id,
            status: enqueued.job.status,
            created: enqueued.created,
        }),
    ))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    load_job(&state, &identity, &id).map(|job| Json(JobResponse::from(job)))
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    match (&params.project_id, &identity.projects) {
        (Some(project_id), _) if !identity.can_access(project_id) => {
            return Err(forbidden(project_id));
        }
        (Some(project_id), _) => filter = filter.with_project(project_id),
        (None, Some(_)) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "project_id is required for project-scoped keys",
            ));
        }
        (None, None) => {}
    }

    if let Some(ref status) = params.status {
        let status: JobStatus = status
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    if let Some(ref kind) = params.kind {
        let kind: JobKind = kind
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_kind(kind);
    }

    let jobs = state.job_store().list(&filter).map_err(internal_error)?;
    let total = state.job_store().count(&filter).map_err(internal_error)?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Cancel a job.
///
/// Queued jobs are cancelled at once (200). Running jobs are flagged and the
/// worker stops them at its next check (202).
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CancelJobResponse>), ApiError> {
    load_job(&state, &identity, &id)?;

    match state.job_store().request_cancel(&id, Utc::now()) {
        Ok(CancelOutcome::Cancelled) => {
            info!(job_id = %id, cancelled_by = %identity.user_id, "Job cancelled");
            Ok((
                StatusCode::OK,
                Json(CancelJobResponse {
                    job_id: id,
                    status: JobStatus::Cancelled,
                    cancel_requested: true,
                }),
            ))
        }
        Ok(CancelOutcome::Requested) => {
            info!(job_id = %id, cancelled_by = %identity.user_id, "Cancellation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(CancelJobResponse {
                    job_id: id,
                    status: JobStatus::Running,
                    cancel_requested: true,
                }),
            ))
        }
        Err(JobStoreError::NotFound(_)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(JobStoreError::InvalidState {
            current_status,
            operation,
            ..
        }) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Cannot {} job: current status is {}", operation, current_status),
        )),
        Err(e) => Err(internal_error(e)),
    }
}
