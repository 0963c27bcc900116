//! Scheduler lock backed by the `scheduler_locks` table.
//!
//! Implements [`JobLock`] with a single upsert per acquisition. All time
//! arithmetic uses the database clock, so replicas with skewed system clocks
//! still agree on when a lock expires.

use chrono::{DateTime, Utc};
use petreg_core::error::AppError;
use petreg_core::lock::{LockHandle, LockSpec};
use petreg_core::traits::JobLock;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Current row of a named lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockRow {
    pub name: String,
    pub lock_until: DateTime<Utc>,
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
    pub token: Uuid,
}

/// PostgreSQL implementation of the scheduler lock.
#[derive(Clone)]
pub struct PgJobLock {
    pool: Pool<Postgres>,
}

impl PgJobLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the lock row for `name`, expired or not.
    pub async fn get(&self, name: &str) -> Result<Option<LockRow>, AppError> {
        let row: Option<LockRow> = sqlx::query_as(
            "SELECT name, lock_until, locked_at, locked_by, token FROM scheduler_locks WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// True if `name` is locked according to the database clock.
    pub async fn is_held(&self, name: &str) -> Result<bool, AppError> {
        let held: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM scheduler_locks WHERE name = $1 AND lock_until > NOW())",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(held.0)
    }
}

impl JobLock for PgJobLock {
    async fn try_acquire(
        &self,
        spec: &LockSpec,
        holder: &str,
    ) -> Result<Option<LockHandle>, AppError> {
        let token = Uuid::new_v4();

        // The conflict branch only fires when the existing lock has expired;
        // otherwise no row is returned and the acquisition fails.
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            INSERT INTO scheduler_locks (name, lock_until, locked_at, locked_by, token)
            VALUES ($1, NOW() + make_interval(secs => $2::double precision), NOW(), $3, $4)
            ON CONFLICT (name) DO UPDATE SET
                lock_until = EXCLUDED.lock_until,
                locked_at = EXCLUDED.locked_at,
                locked_by = EXCLUDED.locked_by,
                token = EXCLUDED.token
            WHERE scheduler_locks.lock_until <= NOW()
            RETURNING locked_at
            "#,
        )
        .bind(&spec.job_name)
        .bind(spec.max_hold.as_secs_f64())
        .bind(holder)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::LockError(format!("acquire {}: {}", spec.job_name, e)))?;

        Ok(row.map(|(acquired_at,)| LockHandle {
            job_name: spec.job_name.clone(),
            holder: holder.to_string(),
            token,
            acquired_at,
            min_hold: spec.min_hold,
            max_hold: spec.max_hold,
        }))
    }

    async fn release(&self, handle: LockHandle) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduler_locks
            SET lock_until = GREATEST(locked_at + make_interval(secs => $3::double precision), NOW())
            WHERE name = $1 AND token = $2
            "#,
        )
        .bind(&handle.job_name)
        .bind(handle.token)
        .bind(handle.min_hold.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::LockError(format!("release {}: {}", handle.job_name, e)))?;

        Ok(result.rows_affected() > 0)
    }
}
