//! Persistence for integration connection state.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ConnectionState, ConnectivityError, TestStatus};
use crate::db;

/// Storage for per-project connection state.
pub trait ConnectionStore: Send + Sync {
    fn get(
        &self,
        project_id: &str,
        provider_type: &str,
    ) -> Result<Option<ConnectionState>, ConnectivityError>;

    /// Record a configuration attempt, creating the row if needed.
    fn mark_configured(
        &self,
        project_id: &str,
        provider_type: &str,
        configured: bool,
    ) -> Result<ConnectionState, ConnectivityError>;

    /// Record the outcome of a connectivity test.
    fn record_test(
        &self,
        project_id: &str,
        provider_type: &str,
        status: TestStatus,
        error: Option<&str>,
        latency_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<ConnectionState, ConnectivityError>;
}

fn db_err(e: rusqlite::Error) -> ConnectivityError {
    ConnectivityError::Store(e.to_string())
}

/// SQLite-backed connection state store.
pub struct SqliteConnectionStore {
    conn: Mutex<Connection>,
}

impl SqliteConnectionStore {
    pub fn new(path: &Path) -> Result<Self, ConnectivityError> {
        let conn = db::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, ConnectivityError> {
        let conn = db::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ConnectivityError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS integration_connections (
                project_id TEXT NOT NULL,
                provider_type TEXT NOT NULL,
                configured INTEGER NOT NULL DEFAULT 0,
                last_test_status TEXT NOT NULL DEFAULT 'unknown',
                last_test_at TEXT,
                last_test_error TEXT,
                last_latency_ms INTEGER,
                PRIMARY KEY (project_id, provider_type)
            );
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ConnectivityError> {
        self.conn
            .lock()
            .map_err(|_| ConnectivityError::Store("connection mutex poisoned".to_string()))
    }

    fn select(
        conn: &Connection,
        project_id: &str,
        provider_type: &str,
    ) -> Result<Option<ConnectionState>, ConnectivityError> {
        conn.query_row(
            "SELECT project_id, provider_type, configured, last_test_status, last_test_at, last_test_error, last_latency_ms
             FROM integration_connections WHERE project_id = ? AND provider_type = ?",
            params![project_id, provider_type],
            Self::row_to_state,
        )
        .optional()
        .map_err(db_err)
    }

    fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<ConnectionState> {
        let status: String = row.get(3)?;
        let tested_at: Option<String> = row.get(4)?;
        let latency: Option<i64> = row.get(6)?;

        Ok(ConnectionState {
            project_id: row.get(0)?,
            provider_type: row.get(1)?,
            configured: row.get(2)?,
            last_test_status: status
                .parse()
                .map_err(|e| db::conversion_error(3, e))?,
            last_test_at: tested_at.map(|s| db::parse_ts(4, &s)).transpose()?,
            last_test_error: row.get(5)?,
            last_latency_ms: latency.map(|ms| ms.max(0) as u64),
        })
    }

    fn read_back(
        conn: &Connection,
        project_id: &str,
        provider_type: &str,
    ) -> Result<ConnectionState, ConnectivityError> {
        Self::select(conn, project_id, provider_type)?.ok_or_else(|| {
            ConnectivityError::Store(format!(
                "connection row for {}/{} vanished after write",
                project_id, provider_type
            ))
        })
    }
}

impl ConnectionStore for SqliteConnectionStore {
    fn get(
        &self,
        project_id: &str,
        provider_type: &str,
    ) -> Result<Option<ConnectionState>, ConnectivityError> {
        let conn = self.lock()?;
        Self::select(&conn, project_id, provider_type)
    }

    fn mark_configured(
        &self,
        project_id: &str,
        provider_type: &str,
        configured: bool,
    ) -> Result<ConnectionState, ConnectivityError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO integration_connections (project_id, provider_type, configured)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (project_id, provider_type) DO UPDATE SET configured = excluded.configured",
            params![project_id, provider_type, configured],
        )
        .map_err(db_err)?;
        Self::read_back(&conn, project_id, provider_type)
    }

    fn record_test(
        &self,
        project_id: &str,
        provider_type: &str,
        status: TestStatus,
        error: Option<&str>,
        latency_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<ConnectionState, ConnectivityError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO integration_connections
                 (project_id, provider_type, configured, last_test_status, last_test_at, last_test_error, last_latency_ms)
             VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6)
             ON CONFLICT (project_id, provider_type) DO UPDATE SET
                 last_test_status = excluded.last_test_status,
                 last_test_at = excluded.last_test_at,
                 last_test_error = excluded.last_test_error,
                 last_latency_ms = excluded.last_latency_ms",
            params![
                project_id,
                provider_type,
                status.as_str(),
                db::format_ts(&now),
                error,
                latency_ms as i64,
            ],
        )
        .map_err(db_err)?;
        Self::read_back(&conn, project_id, provider_type)
    }
}
