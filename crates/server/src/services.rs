//! Stores and provider wiring built from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use genjobs_core::{
    seed_bindings, BindingStore, Config, ConnectionStore, ConnectivityManager, JobStore,
    ProviderCatalog, ProviderRegistry, SqliteBindingStore, SqliteConnectionStore, SqliteJobStore,
};

/// Config file path from `GENJOBS_CONFIG`, defaulting to `config.toml`.
pub fn config_path() -> PathBuf {
    std::env::var("GENJOBS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// The pipeline components both binaries need.
pub struct Services {
    pub job_store: Arc<dyn JobStore>,
    pub bindings: Arc<dyn BindingStore>,
    pub registry: Arc<ProviderRegistry>,
    pub connectivity: Arc<ConnectivityManager>,
}

impl Services {
    /// Open the stores on the configured database and load the backends
    /// whose credentials are present.
    pub fn open(config: &Config) -> Result<Self> {
        let db_path = &config.database.path;

        let job_store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(db_path).context("Failed to create job store")?);
        let bindings: Arc<dyn BindingStore> =
            Arc::new(SqliteBindingStore::new(db_path).context("Failed to create binding store")?);
        let connections: Arc<dyn ConnectionStore> = Arc::new(
            SqliteConnectionStore::new(db_path).context("Failed to create connection store")?,
        );
        info!("Stores initialized at {:?}", db_path);

        let catalog = Arc::new(ProviderCatalog::from_config(
            &config.providers,
            config.orchestrator.call_timeout(),
        ));
        info!(backends = ?catalog.names(), "Provider catalog loaded");

        Ok(Self::from_parts(
            job_store,
            bindings,
            connections,
            catalog,
            config,
        ))
    }

    /// Assemble services from already-built stores and catalog.
    pub fn from_parts(
        job_store: Arc<dyn JobStore>,
        bindings: Arc<dyn BindingStore>,
        connections: Arc<dyn ConnectionStore>,
        catalog: Arc<ProviderCatalog>,
        config: &Config,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityManager::new(
            Arc::clone(&catalog),
            connections,
            Arc::clone(&bindings),
            config.orchestrator.call_timeout(),
        ));
        let registry = Arc::new(ProviderRegistry::new(
            catalog,
            Arc::clone(&bindings),
            Arc::clone(&connectivity),
        ));

        Self {
            job_store,
            bindings,
            registry,
            connectivity,
        }
    }

    /// Write the configured `[[bindings]]` to the binding store.
    pub fn seed_bindings(&self, config: &Config) -> Result<()> {
        seed_bindings(&config.bindings, self.bindings.as_ref(), &self.connectivity)
            .context("Failed to load provider bindings")
    }
}
