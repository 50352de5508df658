//! Scripted behaviour shared by the mock backends.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::provider::ProviderError;

#[derive(Debug, Default)]
struct ScriptState {
    /// Errors returned by the next calls, in order.
    failures: VecDeque<ProviderError>,
    /// Error returned by every probe, if set.
    probe_error: Option<ProviderError>,
    /// Simulated latency for calls and probes.
    delay: Duration,
    calls: usize,
    probes: usize,
}

/// Controls how a mock backend responds.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    state: Arc<RwLock<ScriptState>>,
}

impl Script {
    pub(crate) async fn push_failure(&self, error: ProviderError) {
        self.state.write().await.failures.push_back(error);
    }

    pub(crate) async fn push_failures(&self, error: ProviderError, times: usize) {
        let mut state = self.state.write().await;
        for _ in 0..times {
            state.failures.push_back(error.clone());
        }
    }

    pub(crate) async fn set_probe_error(&self, error: Option<ProviderError>) {
        self.state.write().await.probe_error = error;
    }

    pub(crate) async fn set_delay(&self, delay: Duration) {
        self.state.write().await.delay = delay;
    }

    pub(crate) async fn calls(&self) -> usize {
        self.state.read().await.calls
    }

    pub(crate) async fn probes(&self) -> usize {
        self.state.read().await.probes
    }

    /// Record a call and return the scripted failure for it, if any.
    pub(crate) async fn next_call(&self) -> Result<(), ProviderError> {
        let (delay, failure) = {
            let mut state = self.state.write().await;
            state.calls += 1;
            (state.delay, state.failures.pop_front())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub(crate) async fn next_probe(&self) -> Result<(), ProviderError> {
        let (delay, probe_error) = {
            let mut state = self.state.write().await;
            state.probes += 1;
            (state.delay, state.probe_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match probe_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
