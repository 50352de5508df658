//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and retry settings for job workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a claim is valid without a heartbeat (milliseconds).
    #[serde(default = "default_lease_duration")]
    pub lease_duration_ms: u64,

    /// How often a running job's lease is extended (milliseconds).
    /// Must be shorter than the lease.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Upper bound on one backend call (milliseconds).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Delay before the first retry (milliseconds). Doubles per attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Cap on the retry delay (milliseconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Attempts allowed for jobs enqueued without an explicit limit.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How long an idle worker waits before polling again (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_lease_duration() -> u64 {
    60_000
}

fn default_heartbeat_interval() -> u64 {
    20_000
}

fn default_call_timeout() -> u64 {
    30_000
}

fn default_backoff_base() -> u64 {
    1_000
}

fn default_backoff_max() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_interval() -> u64 {
    1_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lease_duration_ms: default_lease_duration(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            call_timeout_ms: default_call_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl OrchestratorConfig {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry delay after the given (1-based) attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        backoff_delay(
            attempt,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lease_duration_ms == 0 {
            return Err("orchestrator.lease_duration_ms must be positive".to_string());
        }
        if self.heartbeat_interval_ms == 0 || self.heartbeat_interval_ms >= self.lease_duration_ms
        {
            return Err(format!(
                "orchestrator.heartbeat_interval_ms ({}) must be positive and shorter than lease_duration_ms ({})",
                self.heartbeat_interval_ms, self.lease_duration_ms
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err("orchestrator.call_timeout_ms must be positive".to_string());
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(format!(
                "orchestrator.backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            ));
        }
        if self.max_attempts == 0 {
            return Err("orchestrator.max_attempts must be at least 1".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("orchestrator.poll_interval_ms must be positive".to_string());
        }
        Ok(())
    }
}

/// `min(base * 2^(attempt - 1), max)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}
