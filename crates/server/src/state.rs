use std::sync::Arc;

use genjobs_core::{
    Authenticator, Config, ConnectivityManager, JobStore, ProviderRegistry, SanitizedConfig,
    WorkerSupervisor,
};

use crate::services::Services;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    job_store: Arc<dyn JobStore>,
    registry: Arc<ProviderRegistry>,
    connectivity: Arc<ConnectivityManager>,
    supervisor: Arc<WorkerSupervisor>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        services: Services,
        supervisor: Arc<WorkerSupervisor>,
    ) -> Self {
        Self {
            config,
            authenticator,
            job_store: services.job_store,
            registry: services.registry,
            connectivity: services.connectivity,
            supervisor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn connectivity(&self) -> &ConnectivityManager {
        &self.connectivity
    }

    pub fn supervisor(&self) -> &WorkerSupervisor {
        &self.supervisor
    }
}
