//! Mock text generator for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::script::Script;
use crate::provider::{Provider, ProviderError, TextGenerator, TextOutput, TextRequest, TokenUsage};

/// Mock implementation of [`TextGenerator`].
///
/// Replies with `"<reply prefix>: <prompt>"` unless a failure has been
/// scripted for the call.
///
/// # Example
///
/// ```rust,ignore
/// use genjobs_core::testing::MockTextGenerator;
/// use genjobs_core::ProviderError;
///
/// let backend = MockTextGenerator::new("openai");
/// backend.fail_times(ProviderError::RateLimited("slow down".into()), 3).await;
///
/// // First three calls fail with 429, the fourth succeeds.
/// ```
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    name: String,
    reply_prefix: String,
    script: Script,
    requests: Arc<RwLock<Vec<TextRequest>>>,
}

impl MockTextGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply_prefix: "generated".to_string(),
            script: Script::default(),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_reply_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reply_prefix = prefix.into();
        self
    }

    /// Fail the next call with `error`.
    pub async fn fail_next(&self, error: ProviderError) {
        self.script.push_failure(error).await;
    }

    /// Fail the next `times` calls with `error`.
    pub async fn fail_times(&self, error: ProviderError, times: usize) {
        self.script.push_failures(error, times).await;
    }

    /// Make every probe fail with `error` (or succeed with `None`).
    pub async fn set_probe_error(&self, error: Option<ProviderError>) {
        self.script.set_probe_error(error).await;
    }

    /// Delay every call, for timeout and heartbeat tests.
    pub async fn set_delay(&self, delay: Duration) {
        self.script.set_delay(delay).await;
    }

    pub async fn call_count(&self) -> usize {
        self.script.calls().await
    }

    pub async fn probe_count(&self) -> usize {
        self.script.probes().await
    }

    /// Requests that reached the backend, including failed ones.
    pub async fn recorded_requests(&self) -> Vec<TextRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl Provider for MockTextGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        self.script.next_probe().await
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: TextRequest) -> Result<TextOutput, ProviderError> {
        self.requests.write().await.push(request.clone());
        self.script.next_call().await?;

        Ok(TextOutput {
            text: format!("{}: {}", self.reply_prefix, request.prompt),
            model: format!("{}-mock", self.name),
            usage: TokenUsage {
                input_tokens: request.prompt.split_whitespace().count() as u32,
                output_tokens: 8,
            },
        })
    }
}
