//! Durable generation jobs.

mod payload;
mod sqlite_store;
mod store;
mod types;

pub use payload::{
    validate_payload, ContentScrapePayload, ImageEnhancementPayload, LipSyncPayload, PayloadError,
    ReviewReplyPayload, TextGenerationPayload,
};
pub use sqlite_store::SqliteJobStore;
pub use store::{CancelOutcome, JobFilter, JobStore, JobStoreError};
pub use types::{
    derive_idempotency_key, EnqueueRequest, Enqueued, Job, JobFailure, JobKind, JobStatus,
};
