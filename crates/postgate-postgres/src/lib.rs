//! PostgreSQL implementations of the postgate collaborator traits.
//!
//! This crate provides production backends for the admission guard, the
//! record store and the deferred job scheduler, all sharing one pool.
//!
//! # Features
//!
//! - Admission lock as a single `INSERT ... ON CONFLICT DO UPDATE ... WHERE`
//!   statement: a live lock is never overwritten, an expired one is taken over
//! - JSONB records with full-replace upserts
//! - Append-only daily index rows, read back in insertion order
//! - Durable `jobs` table with `run_at` scheduling, consumed by external workers
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE admission_locks (
//!     key TEXT PRIMARY KEY,
//!     value JSONB NOT NULL,
//!     expires_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE submission_records (
//!     key TEXT PRIMARY KEY,
//!     value JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE submission_index (
//!     position BIGSERIAL PRIMARY KEY,
//!     index_key TEXT NOT NULL,
//!     value JSONB NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE jobs (
//!     id UUID PRIMARY KEY,
//!     job_type TEXT NOT NULL,
//!     payload JSONB NOT NULL,
//!     status TEXT NOT NULL DEFAULT 'pending',
//!     attempt INTEGER NOT NULL DEFAULT 1,
//!     max_retries INTEGER NOT NULL DEFAULT 3,
//!     priority INTEGER NOT NULL DEFAULT 0,
//!     run_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use postgate_postgres::PgBackend;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/mydb").await?;
//! let backend = PgBackend::new(pool);
//! backend.ensure_schema().await?;
//!
//! let orchestrator = Orchestrator::new(backend.collaborators(resources), config);
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use postgate::{
    Collaborators, GuardStore, JobHandle, JobScheduler, RecordStore, ResourceService,
    ScheduledJob,
};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

/// Idempotent DDL for every table this crate uses.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS admission_locks (
    key TEXT PRIMARY KEY,
    value JSONB NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS submission_records (
    key TEXT PRIMARY KEY,
    value JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS submission_index (
    position BIGSERIAL PRIMARY KEY,
    index_key TEXT NOT NULL,
    value JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_submission_index_key
    ON submission_index (index_key, position);

CREATE TABLE IF NOT EXISTS jobs (
    id UUID PRIMARY KEY,
    job_type TEXT NOT NULL,
    payload JSONB NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'succeeded', 'failed', 'dead_letter')),
    attempt INTEGER NOT NULL DEFAULT 1,
    max_retries INTEGER NOT NULL DEFAULT 3,
    priority INTEGER NOT NULL DEFAULT 0,
    run_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_jobs_ready ON jobs (priority, run_at)
    WHERE status = 'pending';
"#;

/// All PostgreSQL backends over one connection pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables and indexes.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("failed to apply postgate schema")?;
        Ok(())
    }

    pub fn guard_store(&self) -> PgGuardStore {
        PgGuardStore::new(self.pool.clone())
    }

    pub fn record_store(&self) -> PgRecordStore {
        PgRecordStore::new(self.pool.clone())
    }

    pub fn job_scheduler(&self) -> PgJobScheduler {
        PgJobScheduler::new(self.pool.clone())
    }

    /// Wire these backends together with a resource service.
    pub fn collaborators(&self, resources: Arc<dyn ResourceService>) -> Collaborators {
        Collaborators {
            guard_store: Arc::new(self.guard_store()),
            resources,
            records: Arc::new(self.record_store()),
            scheduler: Arc::new(self.job_scheduler()),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Guard store
// ============================================================================

/// Admission lock store on the `admission_locks` table.
#[derive(Clone)]
pub struct PgGuardStore {
    pool: PgPool,
}

impl PgGuardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete locks that have lapsed.
    ///
    /// Expired rows never block acquisition; this only keeps the table small.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM admission_locks WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GuardStore for PgGuardStore {
    /// One statement: insert, or take over a lapsed row. A live row makes
    /// the `WHERE` false, so nothing is returned.
    async fn set_if_absent(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            INSERT INTO admission_locks (key, value, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            WHERE admission_locks.expires_at <= NOW()
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(ttl_seconds(ttl))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

/// TTL as fractional seconds for `make_interval`.
fn ttl_seconds(ttl: Duration) -> f64 {
    ttl.as_secs_f64()
}

// ============================================================================
// Record store
// ============================================================================

/// Canonical records and daily indexes as JSONB rows.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submission_records (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_index(&self, index_key: &str, value: serde_json::Value) -> Result<()> {
        sqlx::query("INSERT INTO submission_index (index_key, value) VALUES ($1, $2)")
            .bind(index_key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT value FROM submission_records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn read_index(&self, index_key: &str) -> Result<Vec<serde_json::Value>> {
        let rows = sqlx::query(
            "SELECT value FROM submission_index WHERE index_key = $1 ORDER BY position ASC",
        )
        .bind(index_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("value")).collect())
    }
}

// ============================================================================
// Job scheduler
// ============================================================================

/// Durable scheduler writing to the `jobs` table.
///
/// Workers outside this process claim rows once `run_at` has passed.
#[derive(Clone)]
pub struct PgJobScheduler {
    pool: PgPool,
    max_retries: i32,
}

impl PgJobScheduler {
    /// Create a scheduler.
    ///
    /// # Default Settings
    ///
    /// - Max retries: 3
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_retries: 3,
        }
    }

    /// Create a scheduler whose jobs allow `max_retries` attempts.
    pub fn with_max_retries(pool: PgPool, max_retries: i32) -> Self {
        Self { pool, max_retries }
    }
}

#[async_trait]
impl JobScheduler for PgJobScheduler {
    async fn schedule(&self, job: ScheduledJob) -> Result<JobHandle> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, payload, max_retries, run_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(job.name.as_str())
        .bind(&job.payload)
        .bind(self.max_retries)
        .bind(job.run_at)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %id, job_type = %job.name, run_at = %job.run_at, "job scheduled");
        Ok(JobHandle(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_keeps_sub_second_precision() {
        assert_eq!(ttl_seconds(Duration::from_secs(10)), 10.0);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 1.5);
    }

    #[test]
    fn schema_is_idempotent() {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            assert!(
                statement.starts_with("CREATE TABLE IF NOT EXISTS")
                    || statement.starts_with("CREATE INDEX IF NOT EXISTS"),
                "non-idempotent statement: {statement}"
            );
        }
    }

    #[test]
    fn schema_covers_every_backend() {
        for table in ["admission_locks", "submission_records", "submission_index", "jobs"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}
