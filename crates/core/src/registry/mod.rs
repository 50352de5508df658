//! Provider registry: resolves a capability to a backend for a project.

mod binding;
mod resolver;

use thiserror::Error;

use crate::provider::Capability;

pub use binding::{BindingStore, ProviderBinding, SqliteBindingStore};
pub use resolver::{seed_bindings, ProviderRegistry, ResolvedBackend};

/// Errors from backend resolution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// No enabled binding points at a loaded backend.
    #[error("no {capability} backend configured for project {project_id}")]
    NoBackendConfigured {
        capability: Capability,
        project_id: String,
    },

    /// Every candidate's last connectivity test failed, or all were tried.
    #[error("all {capability} backends unreachable for project {project_id}")]
    AllBackendsUnreachable {
        capability: Capability,
        project_id: String,
    },

    #[error("binding store error: {0}")]
    Store(String),
}

impl RegistryError {
    /// Short machine-readable kind recorded on failed jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NoBackendConfigured { .. } => "no_backend_configured",
            RegistryError::AllBackendsUnreachable { .. } => "all_backends_unreachable",
            RegistryError::Store(_) => "store_error",
        }
    }
}
