//! Job records and the status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::provider::Capability;

/// Kind of generation work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TextGeneration,
    ImageEnhancement,
    LipSync,
    ContentScrape,
    ReviewReply,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::TextGeneration,
        JobKind::ImageEnhancement,
        JobKind::LipSync,
        JobKind::ContentScrape,
        JobKind::ReviewReply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TextGeneration => "text_generation",
            JobKind::ImageEnhancement => "image_enhancement",
            JobKind::LipSync => "lip_sync",
            JobKind::ContentScrape => "content_scrape",
            JobKind::ReviewReply => "review_reply",
        }
    }

    /// Capability a backend must provide to run this kind.
    pub fn capability(&self) -> Capability {
        match self {
            JobKind::TextGeneration | JobKind::ReviewReply => Capability::TextGeneration,
            JobKind::ImageEnhancement => Capability::ImageEnhancement,
            JobKind::LipSync => Capability::LipSync,
            JobKind::ContentScrape => Capability::ContentScrape,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown job kind: {}", s))
    }
}

/// Lifecycle status of a job.
///
/// `queued -> running -> succeeded | failed | dead | cancelled`, with
/// `running -> queued` on a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    /// Permanent or configuration error. Not retried.
    Failed,
    /// Retry budget exhausted on transient errors.
    Dead,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::Dead,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Dead => "dead",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Dead | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// Last error recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Short machine-readable kind, e.g. `rate_limited` or `no_backend_configured`.
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A unit of background generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub project_id: String,
    pub kind: JobKind,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Number of times the job has been claimed.
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_error: Option<JobFailure>,
    pub result: Option<serde_json::Value>,
    /// Earliest time the job may be claimed again.
    pub run_after: DateTime<Utc>,
    pub cancel_requested: bool,
    pub locked_by: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn attempts_remaining(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// Request to enqueue a job.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub project_id: String,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    /// Caller-supplied key. Derived from kind and payload when absent.
    pub idempotency_key: Option<String>,
    pub max_attempts: u32,
}

impl EnqueueRequest {
    pub fn new(project_id: impl Into<String>, kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            project_id: project_id.into(),
            kind,
            payload,
            idempotency_key: None,
            max_attempts: 5,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// The key under which the job is deduplicated.
    pub fn effective_key(&self) -> String {
        match &self.idempotency_key {
            Some(key) => key.clone(),
            None => derive_idempotency_key(self.kind, &self.payload),
        }
    }
}

/// SHA-256 hex of the kind and the payload's canonical JSON.
///
/// `serde_json` objects keep keys sorted, so equal payloads serialize identically.
pub fn derive_idempotency_key(kind: JobKind, payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Outcome of an enqueue call.
#[derive(Debug, Clone)]
pub struct Enqueued {
    pub job: Job,
    /// False when an existing job with the same key was returned.
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("video_render".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_review_reply_uses_text_generation() {
        assert_eq!(JobKind::ReviewReply.capability(), Capability::TextGeneration);
        assert_eq!(
            JobKind::ImageEnhancement.capability(),
            Capability::ImageEnhancement
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Dead.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_derived_key_ignores_field_order() {
        let a = json!({"prompt": "hi", "max_tokens": 10});
        let b: serde_json::Value =
            serde_json::from_str(r#"{"max_tokens": 10, "prompt": "hi"}"#).unwrap();
        assert_eq!(
            derive_idempotency_key(JobKind::TextGeneration, &a),
            derive_idempotency_key(JobKind::TextGeneration, &b)
        );
        assert_ne!(
            derive_idempotency_key(JobKind::TextGeneration, &a),
            derive_idempotency_key(JobKind::ReviewReply, &a)
        );
        assert_eq!(derive_idempotency_key(JobKind::LipSync, &a).len(), 64);
    }

    #[test]
    fn test_explicit_key_wins() {
        let req = EnqueueRequest::new("p1", JobKind::ContentScrape, json!({"url": "x"}))
            .with_idempotency_key("product-42");
        assert_eq!(req.effective_key(), "product-42");
    }
}
