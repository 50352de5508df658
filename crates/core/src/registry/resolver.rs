//! Capability resolution over bindings and connection state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{BindingStore, ProviderBinding, RegistryError};
use crate::config::BindingConfig;
use crate::connectivity::{ConnectivityError, ConnectivityManager, TestStatus};
use crate::provider::{BackendHandle, Capability, ProviderCatalog};

/// The backend chosen for one call.
#[derive(Debug, Clone)]
pub struct ResolvedBackend {
    pub name: String,
    pub handle: BackendHandle,
    pub priority: i64,
}

/// Read-only lookup from `(capability, project)` to a backend.
///
/// Candidates are enabled bindings whose backend is loaded in the catalog
/// and serves the capability, ordered by priority. The first candidate whose
/// last connectivity test is `ok` or `unknown` wins. Platform-managed
/// backends are never tested and always count as `unknown`.
pub struct ProviderRegistry {
    catalog: Arc<ProviderCatalog>,
    bindings: Arc<dyn BindingStore>,
    connectivity: Arc<ConnectivityManager>,
}

impl ProviderRegistry {
    pub fn new(
        catalog: Arc<ProviderCatalog>,
        bindings: Arc<dyn BindingStore>,
        connectivity: Arc<ConnectivityManager>,
    ) -> Self {
        Self {
            catalog,
            bindings,
            connectivity,
        }
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Pick the preferred backend for `capability` in `project_id`.
    pub fn resolve(
        &self,
        capability: Capability,
        project_id: &str,
    ) -> Result<ResolvedBackend, RegistryError> {
        self.resolve_next(capability, project_id, &[])
    }

    /// Pick the next backend, skipping the ones named in `tried`.
    pub fn resolve_next(
        &self,
        capability: Capability,
        project_id: &str,
        tried: &[String],
    ) -> Result<ResolvedBackend, RegistryError> {
        let candidates = self.candidates(capability, project_id)?;
        if candidates.is_empty() {
            return Err(RegistryError::NoBackendConfigured {
                capability,
                project_id: project_id.to_string(),
            });
        }

        for candidate in candidates {
            if tried.iter().any(|name| name == &candidate.name) {
                continue;
            }
            if self.is_reachable(project_id, &candidate)? {
                return Ok(candidate);
            }
            debug!(
                backend = %candidate.name,
                project_id,
                %capability,
                "Skipping backend whose last connectivity test failed"
            );
        }

        Err(RegistryError::AllBackendsUnreachable {
            capability,
            project_id: project_id.to_string(),
        })
    }

    fn candidates(
        &self,
        capability: Capability,
        project_id: &str,
    ) -> Result<Vec<ResolvedBackend>, RegistryError> {
        let bindings = self.bindings.list(project_id, capability)?;
        Ok(bindings
            .into_iter()
            .filter(|b| b.enabled)
            .filter_map(|b| {
                let backend = self.catalog.get(&b.backend_name)?;
                (backend.handle.capability() == capability).then(|| ResolvedBackend {
                    name: backend.name.clone(),
                    handle: backend.handle.clone(),
                    priority: b.priority,
                })
            })
            .collect())
    }

    fn is_reachable(
        &self,
        project_id: &str,
        candidate: &ResolvedBackend,
    ) -> Result<bool, RegistryError> {
        if self
            .catalog
            .get(&candidate.name)
            .is_some_and(|backend| backend.managed)
        {
            return Ok(true);
        }
        let state = self
            .connectivity
            .get_status(project_id, &candidate.name)
            .map_err(|e| RegistryError::Store(e.to_string()))?;
        Ok(state.last_test_status != TestStatus::Failed)
    }
}

/// Load configured bindings and record a configuration attempt for each
/// user-managed backend they reference.
pub fn seed_bindings(
    configs: &[BindingConfig],
    bindings: &dyn BindingStore,
    connectivity: &ConnectivityManager,
) -> Result<(), RegistryError> {
    let now = Utc::now();
    for config in configs {
        let binding = ProviderBinding {
            project_id: config.project_id.clone(),
            capability: config.capability,
            backend_name: config.backend.clone(),
            priority: config.priority,
            enabled: config.enabled,
        };
        bindings.upsert(&binding, now)?;

        match connectivity.configure(&config.project_id, &config.backend) {
            Ok(_) | Err(ConnectivityError::NotUserManaged(_)) => {}
            Err(ConnectivityError::UnknownProvider(name)) => {
                warn!(
                    backend = %name,
                    project_id = %config.project_id,
                    "Binding references a backend that is not loaded"
                );
            }
            Err(e) => return Err(RegistryError::Store(e.to_string())),
        }
    }
    info!(count = configs.len(), "Loaded provider bindings");
    Ok(())
}
