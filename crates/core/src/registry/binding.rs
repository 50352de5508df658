//! Provider bindings: which backend serves a capability for a project.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::RegistryError;
use crate::db;
use crate::provider::Capability;

/// A `(project, capability) -> backend` binding. Lower priority wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBinding {
    pub project_id: String,
    pub capability: Capability,
    pub backend_name: String,
    pub priority: i64,
    pub enabled: bool,
}

impl ProviderBinding {
    pub fn new(
        project_id: impl Into<String>,
        capability: Capability,
        backend_name: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            capability,
            backend_name: backend_name.into(),
            priority,
            enabled: true,
        }
    }
}

/// Storage for provider bindings.
pub trait BindingStore: Send + Sync {
    /// Bindings for one project and capability, enabled or not, by priority.
    fn list(&self, project_id: &str, capability: Capability)
        -> Result<Vec<ProviderBinding>, RegistryError>;

    /// Insert or overwrite a binding.
    fn upsert(&self, binding: &ProviderBinding, now: DateTime<Utc>) -> Result<(), RegistryError>;

    /// Insert a binding if missing. An existing row is left untouched.
    fn ensure_exists(&self, binding: &ProviderBinding, now: DateTime<Utc>)
        -> Result<(), RegistryError>;
}

fn db_err(e: rusqlite::Error) -> RegistryError {
    RegistryError::Store(e.to_string())
}

/// SQLite-backed binding store.
pub struct SqliteBindingStore {
    conn: Mutex<Connection>,
}

impl SqliteBindingStore {
    pub fn new(path: &Path) -> Result<Self, RegistryError> {
        let conn = db::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, RegistryError> {
        let conn = db::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RegistryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS provider_bindings (
                project_id TEXT NOT NULL,
                capability TEXT NOT NULL,
                backend_name TEXT NOT NULL,
                priority INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, capability, backend_name)
            );
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RegistryError> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Store("connection mutex poisoned".to_string()))
    }
}

impl BindingStore for SqliteBindingStore {
    fn list(
        &self,
        project_id: &str,
        capability: Capability,
    ) -> Result<Vec<ProviderBinding>, RegistryError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT backend_name, priority, enabled FROM provider_bindings
                 WHERE project_id = ? AND capability = ?
                 ORDER BY priority ASC, backend_name ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![project_id, capability.as_str()], |row| {
                Ok(ProviderBinding {
                    project_id: project_id.to_string(),
                    capability,
                    backend_name: row.get(0)?,
                    priority: row.get(1)?,
                    enabled: row.get(2)?,
                })
            })
            .map_err(db_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn upsert(&self, binding: &ProviderBinding, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO provider_bindings (project_id, capability, backend_name, priority, enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (project_id, capability, backend_name)
             DO UPDATE SET priority = excluded.priority, enabled = excluded.enabled, updated_at = excluded.updated_at",
            params![
                binding.project_id,
                binding.capability.as_str(),
                binding.backend_name,
                binding.priority,
                binding.enabled,
                db::format_ts(&now),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn ensure_exists(
        &self,
        binding: &ProviderBinding,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO provider_bindings (project_id, capability, backend_name, priority, enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT (project_id, capability, backend_name) DO NOTHING",
            params![
                binding.project_id,
                binding.capability.as_str(),
                binding.backend_name,
                binding.priority,
                db::format_ts(&now),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}
