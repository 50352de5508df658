//! Explicit connectivity tests for user-managed integrations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use super::{
    ConnectionState, ConnectionStore, ConnectionTestResult, ConnectivityError, TestStatus,
};
use crate::metrics::CONNECTIVITY_TESTS;
use crate::provider::{ProviderCatalog, ProviderError, RegisteredBackend};
use crate::registry::{BindingStore, ProviderBinding};

/// Owns per-project connection state for user-managed backends.
///
/// State changes only on [`configure`](Self::configure) and
/// [`test_connection`](Self::test_connection); reads never probe.
pub struct ConnectivityManager {
    catalog: Arc<ProviderCatalog>,
    connections: Arc<dyn ConnectionStore>,
    bindings: Arc<dyn BindingStore>,
    probe_timeout: Duration,
}

impl ConnectivityManager {
    pub fn new(
        catalog: Arc<ProviderCatalog>,
        connections: Arc<dyn ConnectionStore>,
        bindings: Arc<dyn BindingStore>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            connections,
            bindings,
            probe_timeout,
        }
    }

    fn user_managed(&self, provider_type: &str) -> Result<&RegisteredBackend, ConnectivityError> {
        let backend = self
            .catalog
            .get(provider_type)
            .ok_or_else(|| ConnectivityError::UnknownProvider(provider_type.to_string()))?;
        if backend.managed {
            return Err(ConnectivityError::NotUserManaged(provider_type.to_string()));
        }
        Ok(backend)
    }

    /// Probe the backend with the project's credentials and record the outcome.
    ///
    /// A successful test also creates a binding for the capability the
    /// backend serves when the project has none. Existing bindings keep
    /// their configured priority and enablement.
    pub async fn test_connection(
        &self,
        project_id: &str,
        provider_type: &str,
    ) -> Result<ConnectionTestResult, ConnectivityError> {
        let backend = self.user_managed(provider_type)?;

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.probe_timeout, backend.handle.probe()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.probe_timeout)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let now = Utc::now();

        let (status, error) = match outcome {
            Ok(()) => (TestStatus::Ok, None),
            Err(e) => (TestStatus::Failed, Some(e.to_string())),
        };

        self.connections.record_test(
            project_id,
            provider_type,
            status,
            error.as_deref(),
            latency_ms,
            now,
        )?;

        CONNECTIVITY_TESTS
            .with_label_values(&[provider_type, status.as_str()])
            .inc();

        match &error {
            None => {
                let binding = ProviderBinding::new(
                    project_id,
                    backend.handle.capability(),
                    provider_type,
                    backend.default_priority,
                );
                self.bindings.ensure_exists(&binding, now)?;
                info!(project_id, provider_type, latency_ms, "Connectivity test passed");
            }
            Some(reason) => {
                warn!(
                    project_id,
                    provider_type, latency_ms, "Connectivity test failed: {}", reason
                );
            }
        }

        Ok(ConnectionTestResult {
            ok: error.is_none(),
            latency_ms,
            error,
        })
    }

    /// Current state, or an unconfigured `unknown` state when none is stored.
    pub fn get_status(
        &self,
        project_id: &str,
        provider_type: &str,
    ) -> Result<ConnectionState, ConnectivityError> {
        Ok(self
            .connections
            .get(project_id, provider_type)?
            .unwrap_or_else(|| ConnectionState::unconfigured(project_id, provider_type)))
    }

    /// Record a configuration attempt for a user-managed backend.
    ///
    /// Backends are only loaded when their credentials are present, so a
    /// known backend is always marked configured.
    pub fn configure(
        &self,
        project_id: &str,
        provider_type: &str,
    ) -> Result<ConnectionState, ConnectivityError> {
        self.user_managed(provider_type)?;
        self.connections
            .mark_configured(project_id, provider_type, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::SqliteConnectionStore;
    use crate::provider::Capability;
    use crate::registry::SqliteBindingStore;
    use crate::testing::{fixtures, MockImageEnhancer, MockTextGenerator};

    struct Harness {
        manager: ConnectivityManager,
        connections: Arc<SqliteConnectionStore>,
        bindings: Arc<SqliteBindingStore>,
        openai: MockTextGenerator,
    }

    fn harness() -> Harness {
        let openai = MockTextGenerator::new("openai");
        let upscaler = MockImageEnhancer::new("upscaler");
        let catalog = Arc::new(
            ProviderCatalog::new()
                .with_backend(fixtures::text_backend(&openai, false, 15))
                .with_backend(fixtures::image_backend(&upscaler, true, 10)),
        );
        let connections = Arc::new(SqliteConnectionStore::in_memory().unwrap());
        let bindings = Arc::new(SqliteBindingStore::in_memory().unwrap());
        Harness {
            manager: ConnectivityManager::new(
                catalog,
                connections.clone(),
                bindings.clone(),
                Duration::from_millis(200),
            ),
            connections,
            bindings,
            openai,
        }
    }

    #[tokio::test]
    async fn test_successful_test_records_ok_and_binds() {
        let h = harness();
        let result = h.manager.test_connection("shop", "openai").await.unwrap();

        assert!(result.ok);
        assert!(result.error.is_none());
        let state = h.manager.get_status("shop", "openai").unwrap();
        assert_eq!(state.last_test_status, TestStatus::Ok);
        assert!(state.configured);
        assert_eq!(state.last_latency_ms, Some(result.latency_ms));

        let bindings = h.bindings.list("shop", Capability::TextGeneration).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].backend_name, "openai");
        assert_eq!(bindings[0].priority, 15);
    }

    #[tokio::test]
    async fn test_failed_probe_records_error_without_binding() {
        let h = harness();
        h.openai
            .set_probe_error(Some(ProviderError::Rejected {
                status: 401,
                message: "invalid api key".into(),
            }))
            .await;

        let result = h.manager.test_connection("shop", "openai").await.unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("invalid api key"));

        let state = h.manager.get_status("shop", "openai").unwrap();
        assert_eq!(state.last_test_status, TestStatus::Failed);
        assert!(h.bindings.list("shop", Capability::TextGeneration).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let h = harness();
        h.openai.set_delay(Duration::from_secs(1)).await;
        let result = h.manager.test_connection("shop", "openai").await.unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(
            h.manager.get_status("shop", "openai").unwrap().last_test_status,
            TestStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_managed_provider_is_rejected_without_row() {
        let h = harness();
        let err = h.manager.test_connection("shop", "upscaler").await.unwrap_err();
        assert_eq!(err, ConnectivityError::NotUserManaged("upscaler".to_string()));
        assert!(h.connections.get("shop", "upscaler").unwrap().is_none());

        let err = h.manager.configure("shop", "upscaler").unwrap_err();
        assert_eq!(err, ConnectivityError::NotUserManaged("upscaler".to_string()));
        assert!(h.connections.get("shop", "upscaler").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let h = harness();
        assert_eq!(
            h.manager.test_connection("shop", "nope").await.unwrap_err(),
            ConnectivityError::UnknownProvider("nope".to_string())
        );
    }

    #[test]
    fn test_get_status_defaults_to_unknown() {
        let h = harness();
        let state = h.manager.get_status("shop", "openai").unwrap();
        assert_eq!(state, ConnectionState::unconfigured("shop", "openai"));
        assert!(h.connections.get("shop", "openai").unwrap().is_none());
    }

    #[test]
    fn test_configure_marks_configured() {
        let h = harness();
        let state = h.manager.configure("shop", "openai").unwrap();
        assert!(state.configured);
        assert_eq!(state.last_test_status, TestStatus::Unknown);
    }
}
