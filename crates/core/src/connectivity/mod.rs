//! Integration connectivity: per-project connection state and explicit tests.

mod manager;
mod store;
mod types;

use thiserror::Error;

use crate::registry::RegistryError;

pub use manager::ConnectivityManager;
pub use store::{ConnectionStore, SqliteConnectionStore};
pub use types::{ConnectionState, ConnectionTestResult, TestStatus};

/// Errors from connectivity operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectivityError {
    /// The backend is platform-managed and cannot be configured or tested.
    #[error("provider {0} is platform-managed")]
    NotUserManaged(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("connection store error: {0}")]
    Store(String),
}

impl From<RegistryError> for ConnectivityError {
    fn from(e: RegistryError) -> Self {
        ConnectivityError::Store(e.to_string())
    }
}
