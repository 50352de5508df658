use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent connectivity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Unknown,
    Ok,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Unknown => "unknown",
            TestStatus::Ok => "ok",
            TestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(TestStatus::Unknown),
            "ok" => Ok(TestStatus::Ok),
            "failed" => Ok(TestStatus::Failed),
            other => Err(format!("unknown test status: {}", other)),
        }
    }
}

/// Connection state of one user-managed integration in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub project_id: String,
    pub provider_type: String,
    pub configured: bool,
    pub last_test_status: TestStatus,
    pub last_test_at: Option<DateTime<Utc>>,
    pub last_test_error: Option<String>,
    pub last_latency_ms: Option<u64>,
}

impl ConnectionState {
    /// State reported for an integration that has never been configured.
    pub fn unconfigured(project_id: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            provider_type: provider_type.into(),
            configured: false,
            last_test_status: TestStatus::Unknown,
            last_test_at: None,
            last_test_error: None,
            last_latency_ms: None,
        }
    }
}

/// Result of an explicit connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
