//! Job orchestrator implementation.
//!
//! One orchestrator runs per worker process. It claims one job at a time,
//! keeps the lease alive while the backend call runs, and settles every
//! claimed job with exactly one guarded status update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::job::{Job, JobKind, JobStatus, JobStore, JobStoreError};
use crate::metrics::{
    BACKEND_CALL_DURATION, BACKEND_FALLBACKS, JOBS_CLAIMED, JOBS_FINISHED, JOB_DURATION,
    JOB_RETRIES, LEASES_LOST,
};
use crate::provider::ProviderError;
use crate::registry::{ProviderRegistry, RegistryError, ResolvedBackend};

use super::call::PreparedCall;
use super::config::OrchestratorConfig;
use super::types::{AttemptFailure, JobOutcome, OrchestratorError};

/// Extends a job's lease on a timer until dropped.
struct LeaseKeeper {
    task: JoinHandle<()>,
    lost: Arc<AtomicBool>,
}

impl LeaseKeeper {
    fn spawn(
        store: Arc<dyn JobStore>,
        job_id: String,
        worker_id: String,
        config: &OrchestratorConfig,
    ) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        let lease = config.lease_duration();
        let every = config.heartbeat_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; the claim just set the lease.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.heartbeat(&job_id, &worker_id, lease, Utc::now()) {
                    Ok(true) => debug!(job_id = %job_id, "Lease extended"),
                    Ok(false) => {
                        warn!(job_id = %job_id, worker_id = %worker_id, "Lease lost during heartbeat");
                        flag.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => warn!(job_id = %job_id, "Heartbeat failed: {}", e),
                }
            }
        });

        Self { task, lost }
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

impl Drop for LeaseKeeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Claims and executes generation jobs.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    worker_id: String,
    kinds: Vec<JobKind>,
    store: Arc<dyn JobStore>,
    registry: Arc<ProviderRegistry>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobOrchestrator {
    /// Create an orchestrator that handles every job kind.
    pub fn new(
        config: OrchestratorConfig,
        worker_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Result<Self, OrchestratorError> {
        config.validate().map_err(OrchestratorError::Config)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            worker_id: worker_id.into(),
            kinds: JobKind::ALL.to_vec(),
            store,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }

    /// Restrict the kinds this worker claims.
    pub fn with_kinds(mut self, kinds: Vec<JobKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Process jobs until [`shutdown`](Self::shutdown) is called.
    ///
    /// Errors are logged and never end the loop. A job in flight at shutdown
    /// is finished first.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(worker_id = %self.worker_id, kinds = ?self.kinds, "Job orchestrator started");

        while self.running.load(Ordering::SeqCst) {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(worker_id = %self.worker_id, "Orchestrator error: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Orchestrator received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(self.config.poll_interval()) => {}
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(worker_id = %self.worker_id, "Job orchestrator stopped");
    }

    /// Ask [`run`](Self::run) to stop after the current job.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Claim and fully process at most one job.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, OrchestratorError> {
        let claimed = self.store.claim(
            &self.worker_id,
            &self.kinds,
            self.config.lease_duration(),
            Utc::now(),
        )?;

        match claimed {
            Some(job) => self.process(job).await.map(Some),
            None => Ok(None),
        }
    }

    async fn process(&self, job: Job) -> Result<JobOutcome, OrchestratorError> {
        let started = Instant::now();
        let kind = job.kind.as_str();
        JOBS_CLAIMED.with_label_values(&[kind]).inc();
        info!(
            job_id = %job.id,
            project_id = %job.project_id,
            kind,
            attempt = job.attempt_count,
            max_attempts = job.max_attempts,
            "Claimed job"
        );

        let outcome = if job.cancel_requested {
            self.settle_terminal(&job, JobStatus::Cancelled, None).await
        } else {
            let keeper = LeaseKeeper::spawn(
                Arc::clone(&self.store),
                job.id.clone(),
                self.worker_id.clone(),
                &self.config,
            );
            let result = self.execute(&job).await;
            let lost = keeper.is_lost();
            drop(keeper);

            if lost {
                LEASES_LOST.inc();
                warn!(job_id = %job.id, "Discarding outcome: lease taken over by another worker");
                Ok(JobOutcome::LeaseLost {
                    job_id: job.id.clone(),
                })
            } else {
                self.settle(&job, result).await
            }
        }?;

        JOB_DURATION
            .with_label_values(&[kind, outcome.label()])
            .observe(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Run one attempt, falling back to lower-priority backends on transient errors.
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, AttemptFailure> {
        let call = PreparedCall::prepare(job.kind, &job.payload)
            .map_err(|e| AttemptFailure::permanent("invalid_payload", e.to_string()))?;
        let capability = job.kind.capability();

        let mut tried: Vec<String> = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        loop {
            let backend = match self
                .registry
                .resolve_next(capability, &job.project_id, &tried)
            {
                Ok(backend) => backend,
                Err(e @ RegistryError::NoBackendConfigured { .. }) => {
                    return Err(AttemptFailure::permanent(e.kind(), e.to_string()));
                }
                Err(e @ RegistryError::AllBackendsUnreachable { .. }) => {
                    return Err(match last_error {
                        Some(provider_error) => AttemptFailure::transient(
                            provider_error.kind(),
                            provider_error.to_string(),
                        ),
                        None => AttemptFailure::transient(e.kind(), e.to_string()),
                    });
                }
                Err(e @ RegistryError::Store(_)) => {
                    return Err(AttemptFailure::transient(e.kind(), e.to_string()));
                }
            };

            if !tried.is_empty() {
                BACKEND_FALLBACKS
                    .with_label_values(&[capability.as_str()])
                    .inc();
                info!(job_id = %job.id, backend = %backend.name, "Falling back to next backend");
            }
            tried.push(backend.name.clone());

            match self.call_backend(&call, &backend).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    warn!(job_id = %job.id, backend = %backend.name, "Transient backend error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(job_id = %job.id, backend = %backend.name, "Permanent backend error: {}", e);
                    return Err(AttemptFailure::permanent(e.kind(), e.to_string()));
                }
            }
        }
    }

    async fn call_backend(
        &self,
        call: &PreparedCall,
        backend: &ResolvedBackend,
    ) -> Result<serde_json::Value, ProviderError> {
        let timeout = self.config.call_timeout();
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, call.invoke(&backend.name, &backend.handle)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        BACKEND_CALL_DURATION
            .with_label_values(&[backend.name.as_str(), outcome])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    /// Persist the attempt's outcome.
    async fn settle(
        &self,
        job: &Job,
        result: Result<serde_json::Value, AttemptFailure>,
    ) -> Result<JobOutcome, OrchestratorError> {
        let attempt = match result {
            Ok(value) => {
                let stored = self
                    .store
                    .complete(&job.id, &self.worker_id, &value, Utc::now());
                return self.after_write(job, stored, JobStatus::Succeeded);
            }
            Err(attempt) => attempt,
        };

        // Cancellation wins over retrying.
        if self.cancel_requested(&job.id)? {
            return self
                .settle_terminal(job, JobStatus::Cancelled, Some(&attempt))
                .await;
        }

        if !attempt.retryable {
            return self.settle_terminal(job, JobStatus::Failed, Some(&attempt)).await;
        }

        if !job.attempts_remaining() {
            return self.settle_terminal(job, JobStatus::Dead, Some(&attempt)).await;
        }

        let now = Utc::now();
        let delay = self.config.backoff(job.attempt_count);
        let run_after = now + chrono::Duration::milliseconds(delay.as_millis() as i64);
        let stored = self
            .store
            .retry_later(&job.id, &self.worker_id, &attempt.failure, run_after, now);

        match stored {
            Ok(_) => {
                JOB_RETRIES
                    .with_label_values(&[job.kind.as_str(), attempt.failure.kind.as_str()])
                    .inc();
                info!(
                    job_id = %job.id,
                    attempt = job.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %attempt.failure.message,
                    "Job requeued for retry"
                );
                Ok(JobOutcome::Retrying {
                    job_id: job.id.clone(),
                    run_after,
                })
            }
            Err(e) => self.lease_lost_or(job, e),
        }
    }

    async fn settle_terminal(
        &self,
        job: &Job,
        status: JobStatus,
        attempt: Option<&AttemptFailure>,
    ) -> Result<JobOutcome, OrchestratorError> {
        let stored = self.store.finish(
            &job.id,
            &self.worker_id,
            status,
            attempt.map(|a| &a.failure),
            Utc::now(),
        );
        if let Some(attempt) = attempt {
            warn!(
                job_id = %job.id,
                status = %status,
                attempt = job.attempt_count,
                error_kind = %attempt.failure.kind,
                "Job ended: {}",
                attempt.failure.message
            );
        }
        self.after_write(job, stored, status)
    }

    fn after_write(
        &self,
        job: &Job,
        stored: Result<Job, JobStoreError>,
        status: JobStatus,
    ) -> Result<JobOutcome, OrchestratorError> {
        if let Err(e) = stored {
            return self.lease_lost_or(job, e);
        }

        JOBS_FINISHED
            .with_label_values(&[job.kind.as_str(), status.as_str()])
            .inc();
        let job_id = job.id.clone();
        Ok(match status {
            JobStatus::Succeeded => {
                info!(job_id = %job_id, attempt = job.attempt_count, "Job succeeded");
                JobOutcome::Succeeded { job_id }
            }
            JobStatus::Cancelled => {
                info!(job_id = %job_id, "Job cancelled");
                JobOutcome::Cancelled { job_id }
            }
            JobStatus::Dead => JobOutcome::Dead { job_id },
            _ => JobOutcome::Failed { job_id },
        })
    }

    fn lease_lost_or(&self, job: &Job, e: JobStoreError) -> Result<JobOutcome, OrchestratorError> {
        match e {
            JobStoreError::LeaseLost { .. } => {
                LEASES_LOST.inc();
                warn!(job_id = %job.id, "Lease lost before the outcome was written");
                Ok(JobOutcome::LeaseLost {
                    job_id: job.id.clone(),
                })
            }
            other => Err(other.into()),
        }
    }

    fn cancel_requested(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        Ok(self
            .store
            .get(job_id)?
            .is_some_and(|job| job.cancel_requested))
    }
}
