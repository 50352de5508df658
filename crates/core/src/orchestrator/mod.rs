//! Job orchestrator: claims queued jobs and drives them to a terminal status.
//!
//! Each worker process runs one [`JobOrchestrator`]:
//! - **Claim**: atomic lease on the oldest eligible job
//! - **Execute**: resolve a backend, call it under a timeout, fall back on transient errors
//! - **Settle**: succeed, requeue with backoff, or end as failed / dead / cancelled

mod call;
mod config;
mod runner;
mod types;

pub use config::{backoff_delay, OrchestratorConfig};
pub use runner::JobOrchestrator;
pub use types::{JobOutcome, OrchestratorError};
