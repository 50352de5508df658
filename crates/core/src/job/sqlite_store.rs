//! SQLite-backed job store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use super::{
    CancelOutcome, EnqueueRequest, Enqueued, Job, JobFailure, JobFilter, JobKind, JobStatus,
    JobStore, JobStoreError,
};
use crate::db;
use crate::metrics::JOBS_ENQUEUED;

const COLUMNS: &str = "id, project_id, kind, idempotency_key, payload, status, attempt_count, \
     max_attempts, last_error, result, run_after, cancel_requested, locked_by, locked_until, \
     created_at, updated_at";

fn db_err(e: rusqlite::Error) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    now + chrono::Duration::milliseconds(lease.as_millis() as i64)
}

/// SQLite-backed job store.
///
/// Several processes may open the same file; claims run inside an
/// immediate transaction so only one of them can lease a given row.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the job database at `path`.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = db::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = db::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                last_error TEXT,
                result TEXT,
                run_after TEXT NOT NULL,
                cancel_requested INTEGER NOT NULL DEFAULT 0,
                locked_by TEXT,
                locked_until TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (project_id, kind, idempotency_key)
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(status, run_after);
            CREATE INDEX IF NOT EXISTS idx_jobs_project ON jobs(project_id, created_at);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref project_id) = filter.project_id {
            conditions.push("project_id = ?");
            params.push(Box::new(project_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(kind) = filter.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let kind: String = row.get(2)?;
        let payload: String = row.get(4)?;
        let status: String = row.get(5)?;
        let last_error: Option<String> = row.get(8)?;
        let result: Option<String> = row.get(9)?;
        let run_after: String = row.get(10)?;
        let locked_until: Option<String> = row.get(13)?;
        let created_at: String = row.get(14)?;
        let updated_at: String = row.get(15)?;

        let json_err = |idx: usize| move |e: serde_json::Error| db::conversion_error(idx, e.to_string());

        Ok(Job {
            id: row.get(0)?,
            project_id: row.get(1)?,
            kind: kind
                .parse::<JobKind>()
                .map_err(|e| db::conversion_error(2, e))?,
            idempotency_key: row.get(3)?,
            payload: serde_json::from_str(&payload).map_err(json_err(4))?,
            status: status
                .parse::<JobStatus>()
                .map_err(|e| db::conversion_error(5, e))?,
            attempt_count: row.get(6)?,
            max_attempts: row.get(7)?,
            last_error: last_error
                .map(|s| serde_json::from_str::<JobFailure>(&s))
                .transpose()
                .map_err(json_err(8))?,
            result: result
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(json_err(9))?,
            run_after: db::parse_ts(10, &run_after)?,
            cancel_requested: row.get(11)?,
            locked_by: row.get(12)?,
            locked_until: locked_until
                .map(|s| db::parse_ts(13, &s))
                .transpose()?,
            created_at: db::parse_ts(14, &created_at)?,
            updated_at: db::parse_ts(15, &updated_at)?,
        })
    }

    fn select_by_id(conn: &Connection, id: &str) -> Result<Option<Job>, JobStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    /// Run a lease-guarded `UPDATE ... RETURNING` and explain a miss.
    fn guarded_update<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
        id: &str,
        worker_id: &str,
    ) -> Result<Job, JobStoreError> {
        let updated = conn
            .query_row(sql, params, Self::row_to_job)
            .optional()
            .map_err(db_err)?;

        match updated {
            Some(job) => Ok(job),
            None => match Self::select_by_id(conn, id)? {
                None => Err(JobStoreError::NotFound(id.to_string())),
                Some(_) => Err(JobStoreError::LeaseLost {
                    job_id: id.to_string(),
                    worker_id: worker_id.to_string(),
                }),
            },
        }
    }

    fn failure_json(failure: &JobFailure) -> Result<String, JobStoreError> {
        serde_json::to_string(failure).map_err(|e| JobStoreError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn enqueue(
        &self,
        request: EnqueueRequest,
        now: DateTime<Utc>,
    ) -> Result<Enqueued, JobStoreError> {
        let key = request.effective_key();
        let id = uuid::Uuid::new_v4().to_string();
        let ts = db::format_ts(&now);
        let max_attempts = request.max_attempts.max(1);
        let conn = self.lock()?;

        let inserted = conn
            .execute(
                "INSERT INTO jobs (id, project_id, kind, idempotency_key, payload, status, attempt_count, max_attempts, run_after, cancel_requested, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'queued', 0, ?6, ?7, 0, ?7, ?7)
                 ON CONFLICT (project_id, kind, idempotency_key) DO NOTHING",
                params![
                    id,
                    request.project_id,
                    request.kind.as_str(),
                    key,
                    request.payload.to_string(),
                    max_attempts,
                    ts,
                ],
            )
            .map_err(db_err)?;

        let job = conn
            .query_row(
                &format!(
                    "SELECT {} FROM jobs WHERE project_id = ? AND kind = ? AND idempotency_key = ?",
                    COLUMNS
                ),
                params![request.project_id, request.kind.as_str(), key],
                Self::row_to_job,
            )
            .map_err(db_err)?;

        let created = inserted == 1;
        JOBS_ENQUEUED
            .with_label_values(&[request.kind.as_str(), if created { "true" } else { "false" }])
            .inc();

        Ok(Enqueued { job, created })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let conn = self.lock()?;
        Self::select_by_id(&conn, id)
    }

    fn find_existing(&self, request: &EnqueueRequest) -> Result<Option<Job>, JobStoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE project_id = ? AND kind = ? AND idempotency_key = ?",
                COLUMNS
            ),
            params![request.project_id, request.kind.as_str(), request.effective_key()],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(db_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn claim(
        &self,
        worker_id: &str,
        kinds: &[JobKind],
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, JobStoreError> {
        if kinds.is_empty() {
            return Ok(None);
        }

        let now_ts = db::format_ts(&now);
        let exhausted = Self::failure_json(&JobFailure::new(
            "lease_expired",
            "worker lease expired on the final attempt",
        ))?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        // Expired leases that must not run again.
        tx.execute(
            "UPDATE jobs SET status = 'cancelled', locked_by = NULL, locked_until = NULL, updated_at = ?1
             WHERE status = 'running' AND locked_until < ?1 AND cancel_requested = 1",
            params![now_ts],
        )
        .map_err(db_err)?;
        tx.execute(
            "UPDATE jobs SET status = 'dead', last_error = ?2, locked_by = NULL, locked_until = NULL, updated_at = ?1
             WHERE status = 'running' AND locked_until < ?1 AND attempt_count >= max_attempts",
            params![now_ts, exhausted],
        )
        .map_err(db_err)?;

        let kind_slots = (0..kinds.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE jobs
             SET status = 'running', locked_by = ?1, locked_until = ?2,
                 attempt_count = attempt_count + 1, updated_at = ?3
             WHERE id = (
                 SELECT id FROM jobs
                 WHERE kind IN ({kind_slots})
                   AND ((status = 'queued' AND run_after <= ?3)
                        OR (status = 'running' AND locked_until < ?3))
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1
             )
             RETURNING {COLUMNS}"
        );

        let mut values = vec![
            worker_id.to_string(),
            db::format_ts(&lease_deadline(now, lease)),
            now_ts,
        ];
        values.extend(kinds.iter().map(|k| k.as_str().to_string()));

        let claimed = tx
            .query_row(&sql, params_from_iter(values.iter()), Self::row_to_job)
            .optional()
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(claimed)
    }

    fn heartbeat(
        &self,
        id: &str,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, JobStoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE jobs SET locked_until = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'running' AND locked_by = ?4",
                params![
                    db::format_ts(&lease_deadline(now, lease)),
                    db::format_ts(&now),
                    id,
                    worker_id
                ],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    fn complete(
        &self,
        id: &str,
        worker_id: &str,
        result: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError> {
        let conn = self.lock()?;
        Self::guarded_update(
            &conn,
            &format!(
                "UPDATE jobs SET status = 'succeeded', result = ?1, last_error = NULL,
                     locked_by = NULL, locked_until = NULL, updated_at = ?2
                 WHERE id = ?3 AND status = 'running' AND locked_by = ?4
                 RETURNING {}",
                COLUMNS
            ),
            params![result.to_string(), db::format_ts(&now), id, worker_id],
            id,
            worker_id,
        )
    }

    fn retry_later(
        &self,
        id: &str,
        worker_id: &str,
        failure: &JobFailure,
        run_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError> {
        let failure = Self::failure_json(failure)?;
        let conn = self.lock()?;
        Self::guarded_update(
            &conn,
            &format!(
                "UPDATE jobs SET status = 'queued', last_error = ?1, run_after = ?2,
                     locked_by = NULL, locked_until = NULL, updated_at = ?3
                 WHERE id = ?4 AND status = 'running' AND locked_by = ?5
                 RETURNING {}",
                COLUMNS
            ),
            params![
                failure,
                db::format_ts(&run_after),
                db::format_ts(&now),
                id,
                worker_id
            ],
            id,
            worker_id,
        )
    }

    fn finish(
        &self,
        id: &str,
        worker_id: &str,
        status: JobStatus,
        failure: Option<&JobFailure>,
        now: DateTime<Utc>,
    ) -> Result<Job, JobStoreError> {
        if !matches!(
            status,
            JobStatus::Failed | JobStatus::Dead | JobStatus::Cancelled
        ) {
            return Err(JobStoreError::InvalidState {
                job_id: id.to_string(),
                current_status: JobStatus::Running,
                operation: format!("finish as {}", status),
            });
        }

        let failure = failure.map(Self::failure_json).transpose()?;
        let conn = self.lock()?;
        Self::guarded_update(
            &conn,
            &format!(
                "UPDATE jobs SET status = ?1, last_error = COALESCE(?2, last_error),
                     locked_by = NULL, locked_until = NULL, updated_at = ?3
                 WHERE id = ?4 AND status = 'running' AND locked_by = ?5
                 RETURNING {}",
                COLUMNS
            ),
            params![status.as_str(), failure, db::format_ts(&now), id, worker_id],
            id,
            worker_id,
        )
    }

    fn request_cancel(&self, id: &str, now: DateTime<Utc>) -> Result<CancelOutcome, JobStoreError> {
        let now_ts = db::format_ts(&now);
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let job = Self::select_by_id(&tx, id)?
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        let outcome = match job.status {
            JobStatus::Queued => {
                tx.execute(
                    "UPDATE jobs SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
                    params![now_ts, id],
                )
                .map_err(db_err)?;
                CancelOutcome::Cancelled
            }
            JobStatus::Running => {
                tx.execute(
                    "UPDATE jobs SET cancel_requested = 1, updated_at = ?1 WHERE id = ?2",
                    params![now_ts, id],
                )
                .map_err(db_err)?;
                CancelOutcome::Requested
            }
            status => {
                return Err(JobStoreError::InvalidState {
                    job_id: id.to_string(),
                    current_status: status,
                    operation: "cancel".to_string(),
                });
            }
        };

        tx.commit().map_err(db_err)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    const LEASE: Duration = Duration::from_secs(60);

    fn create_test_store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn text_request(prompt: &str) -> EnqueueRequest {
        EnqueueRequest::new("shop-1", JobKind::TextGeneration, json!({ "prompt": prompt }))
    }

    #[test]
    fn test_enqueue_creates_queued_job() {
        let store = create_test_store();
        let enqueued = store.enqueue(text_request("ad copy"), t0()).unwrap();

        assert!(enqueued.created);
        let job = enqueued.job;
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.payload, json!({ "prompt": "ad copy" }));
        assert_eq!(job.run_after, t0());
        assert!(job.locked_by.is_none());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let store = create_test_store();
        let first = store.enqueue(text_request("same"), t0()).unwrap();
        let second = store.enqueue(text_request("same"), t0() + secs(5)).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.job.id, second.job.id);
        assert_eq!(store.count(&JobFilter::new()).unwrap(), 1);
    }

    #[test]
    fn test_explicit_key_dedupes_different_payloads() {
        let store = create_test_store();
        let a = store
            .enqueue(text_request("one").with_idempotency_key("sku-9"), t0())
            .unwrap();
        let b = store
            .enqueue(text_request("two").with_idempotency_key("sku-9"), t0())
            .unwrap();
        assert_eq!(a.job.id, b.job.id);
        assert_eq!(b.job.payload, json!({ "prompt": "one" }));

        // Same key in another project is a different job.
        let mut other = text_request("one").with_idempotency_key("sku-9");
        other.project_id = "shop-2".to_string();
        assert!(store.enqueue(other, t0()).unwrap().created);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_find_existing_matches_enqueue_key() {
        let store = create_test_store();
        assert!(store.find_existing(&text_request("a")).unwrap().is_none());

        let job = store.enqueue(text_request("a"), t0()).unwrap().job;

        let found = store.find_existing(&text_request("a")).unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert!(store.find_existing(&text_request("b")).unwrap().is_none());
        assert!(store
            .find_existing(&text_request("b").with_idempotency_key(job.idempotency_key.clone()))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_claim_oldest_first_and_increments_attempts() {
        let store = create_test_store();
        let first = store.enqueue(text_request("a"), t0()).unwrap().job;
        store.enqueue(text_request("b"), t0() + secs(1)).unwrap();

        let claimed = store
            .claim("w1", &[JobKind::TextGeneration], LEASE, t0() + secs(2))
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt_count, 1);
        assert_eq!(claimed.locked_by.as_deref(), Some("w1"));
        assert_eq!(claimed.locked_until, Some(t0() + secs(62)));
    }

    #[test]
    fn test_claim_respects_kinds_and_run_after() {
        let store = create_test_store();
        store.enqueue(text_request("a"), t0()).unwrap();

        assert!(store
            .claim("w1", &[JobKind::LipSync], LEASE, t0())
            .unwrap()
            .is_none());
        assert!(store.claim("w1", &[], LEASE, t0()).unwrap().is_none());
        // Not yet eligible.
        assert!(store
            .claim("w1", &[JobKind::TextGeneration], LEASE, t0() - secs(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_lease_recovery_after_expiry() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        let kinds = [JobKind::TextGeneration];

        store.claim("w1", &kinds, LEASE, t0()).unwrap().unwrap();

        // Lease still live.
        assert!(store.claim("w2", &kinds, LEASE, t0() + secs(30)).unwrap().is_none());

        let reclaimed = store
            .claim("w2", &kinds, LEASE, t0() + secs(61))
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.locked_by.as_deref(), Some("w2"));
        assert_eq!(reclaimed.attempt_count, 2);

        // The first worker has lost the lease.
        assert!(!store.heartbeat(&job.id, "w1", LEASE, t0() + secs(62)).unwrap());
        let err = store
            .complete(&job.id, "w1", &json!({}), t0() + secs(62))
            .unwrap_err();
        assert!(matches!(err, JobStoreError::LeaseLost { .. }));
    }

    #[test]
    fn test_heartbeat_extends_lease() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        let kinds = [JobKind::TextGeneration];
        store.claim("w1", &kinds, LEASE, t0()).unwrap();

        assert!(store.heartbeat(&job.id, "w1", LEASE, t0() + secs(50)).unwrap());
        assert!(store.claim("w2", &kinds, LEASE, t0() + secs(70)).unwrap().is_none());

        let job = store.get(&job.id).unwrap().unwrap();
        assert_eq!(job.locked_until, Some(t0() + secs(110)));
    }

    #[test]
    fn test_expired_lease_on_last_attempt_goes_dead() {
        let store = create_test_store();
        let job = store
            .enqueue(text_request("a").with_max_attempts(2), t0())
            .unwrap()
            .job;
        let kinds = [JobKind::TextGeneration];

        store.claim("w1", &kinds, LEASE, t0()).unwrap().unwrap();
        let second = store.claim("w2", &kinds, LEASE, t0() + secs(61)).unwrap().unwrap();
        assert_eq!(second.attempt_count, 2);

        assert!(store.claim("w3", &kinds, LEASE, t0() + secs(122)).unwrap().is_none());
        let job = store.get(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dead);
        assert_eq!(job.attempt_count, 2);
        assert_eq!(job.last_error.unwrap().kind, "lease_expired");
        assert!(job.locked_by.is_none());
    }

    #[test]
    fn test_complete_writes_result() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        store
            .claim("w1", &[JobKind::TextGeneration], LEASE, t0())
            .unwrap();

        let done = store
            .complete(&job.id, "w1", &json!({"text": "hello"}), t0() + secs(3))
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.result, Some(json!({"text": "hello"})));
        assert!(done.locked_until.is_none());

        // A second completion is refused.
        assert!(store
            .complete(&job.id, "w1", &json!({}), t0() + secs(4))
            .is_err());
    }

    #[test]
    fn test_retry_later_requeues_with_delay() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        let kinds = [JobKind::TextGeneration];
        store.claim("w1", &kinds, LEASE, t0()).unwrap();

        let failure = JobFailure::new("rate_limited", "429");
        let requeued = store
            .retry_later(&job.id, "w1", &failure, t0() + secs(10), t0() + secs(1))
            .unwrap();
        assert_eq!(requeued.status, JobStatus::Queued);
        assert_eq!(requeued.last_error, Some(failure));
        assert!(requeued.locked_by.is_none());

        assert!(store.claim("w1", &kinds, LEASE, t0() + secs(9)).unwrap().is_none());
        let again = store.claim("w1", &kinds, LEASE, t0() + secs(10)).unwrap().unwrap();
        assert_eq!(again.attempt_count, 2);
    }

    #[test]
    fn test_finish_rejects_non_failure_status() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        store
            .claim("w1", &[JobKind::TextGeneration], LEASE, t0())
            .unwrap();

        assert!(store
            .finish(&job.id, "w1", JobStatus::Succeeded, None, t0())
            .is_err());
        let failed = store
            .finish(
                &job.id,
                "w1",
                JobStatus::Failed,
                Some(&JobFailure::new("invalid_request", "bad prompt")),
                t0(),
            )
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
    }

    #[test]
    fn test_request_cancel() {
        let store = create_test_store();
        let queued = store.enqueue(text_request("a"), t0()).unwrap().job;
        assert_eq!(
            store.request_cancel(&queued.id, t0()).unwrap(),
            CancelOutcome::Cancelled
        );
        assert_eq!(
            store.get(&queued.id).unwrap().unwrap().status,
            JobStatus::Cancelled
        );

        let running = store.enqueue(text_request("b"), t0()).unwrap().job;
        store
            .claim("w1", &[JobKind::TextGeneration], LEASE, t0())
            .unwrap();
        assert_eq!(
            store.request_cancel(&running.id, t0()).unwrap(),
            CancelOutcome::Requested
        );
        let running = store.get(&running.id).unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.cancel_requested);

        assert!(matches!(
            store.request_cancel(&queued.id, t0()),
            Err(JobStoreError::InvalidState { .. })
        ));
        assert!(matches!(
            store.request_cancel("missing", t0()),
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_expired_lease_with_cancel_request_is_cancelled() {
        let store = create_test_store();
        let job = store.enqueue(text_request("a"), t0()).unwrap().job;
        let kinds = [JobKind::TextGeneration];
        store.claim("w1", &kinds, LEASE, t0()).unwrap();
        store.request_cancel(&job.id, t0() + secs(1)).unwrap();

        assert!(store.claim("w2", &kinds, LEASE, t0() + secs(61)).unwrap().is_none());
        assert_eq!(
            store.get(&job.id).unwrap().unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[test]
    fn test_list_and_count_with_filter() {
        let store = create_test_store();
        store.enqueue(text_request("a"), t0()).unwrap();
        store.enqueue(text_request("b"), t0() + secs(1)).unwrap();
        let mut other = EnqueueRequest::new("shop-2", JobKind::LipSync, json!({"x": 1}));
        other.max_attempts = 3;
        store.enqueue(other, t0()).unwrap();

        let filter = JobFilter::new().with_project("shop-1");
        let jobs = store.list(&filter).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].payload, json!({"prompt": "b"}));
        assert_eq!(store.count(&filter).unwrap(), 2);

        let filter = JobFilter::new().with_kind(JobKind::LipSync);
        assert_eq!(store.count(&filter).unwrap(), 1);
        let filter = JobFilter::new().with_status(JobStatus::Running);
        assert_eq!(store.count(&filter).unwrap(), 0);

        let page = store
            .list(&JobFilter::new().with_limit(1).with_offset(1))
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        let seed = SqliteJobStore::new(&path).unwrap();
        for i in 0..20 {
            seed.enqueue(text_request(&format!("job {}", i)), t0()).unwrap();
        }

        // One connection per worker, like separate processes.
        let stores: Vec<Arc<SqliteJobStore>> = (0..4)
            .map(|_| Arc::new(SqliteJobStore::new(&path).unwrap()))
            .collect();

        let handles: Vec<_> = stores
            .into_iter()
            .enumerate()
            .map(|(n, store)| {
                std::thread::spawn(move || {
                    let worker = format!("w{}", n);
                    let mut ids = Vec::new();
                    while let Some(job) = store
                        .claim(&worker, &[JobKind::TextGeneration], LEASE, t0())
                        .unwrap()
                    {
                        ids.push(job.id);
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.join().unwrap() {
                total += 1;
                assert!(seen.insert(id), "job claimed twice");
            }
        }
        assert_eq!(total, 20);
        assert_eq!(
            seed.count(&JobFilter::new().with_status(JobStatus::Running))
                .unwrap(),
            20
        );
    }
}
