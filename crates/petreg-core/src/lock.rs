//! Scheduler lock types and a process-local [`JobLock`] implementation.
//!
//! The lock follows a hold-window model: an acquired lock expires on its own
//! after `max_hold`, so a crashed holder never blocks a job forever, and a
//! released lock stays taken until `min_hold` has passed since acquisition,
//! so replicas with slightly skewed clocks do not re-run the same tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::AppError;
use crate::traits::JobLock;

/// What to lock and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    pub job_name: String,
    /// The lock is kept at least this long after acquisition, even if released.
    pub min_hold: Duration,
    /// The lock expires after this long regardless of release.
    pub max_hold: Duration,
}

impl LockSpec {
    /// Creates a spec. `min_hold` is capped at `max_hold`.
    pub fn new(job_name: impl Into<String>, min_hold: Duration, max_hold: Duration) -> Self {
        Self {
            job_name: job_name.into(),
            min_hold: min_hold.min(max_hold),
            max_hold,
        }
    }
}

/// Proof of ownership returned by [`JobLock::try_acquire`].
///
/// The token distinguishes this acquisition from any later one for the same
/// job, so a late release cannot free a lock somebody else now holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub job_name: String,
    pub holder: String,
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub min_hold: Duration,
    pub max_hold: Duration,
}

#[derive(Debug)]
struct LockRecord {
    token: Uuid,
    acquired: Instant,
    lock_until: Instant,
}

/// In-memory [`JobLock`] for single-instance deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobLock {
    records: Arc<Mutex<HashMap<String, LockRecord>>>,
}

impl MemoryJobLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True if `job_name` is currently held (acquired and not yet expired).
    pub fn is_held(&self, job_name: &str) -> bool {
        self.records()
            .get(job_name)
            .is_some_and(|r| r.lock_until > Instant::now())
    }
}

impl JobLock for MemoryJobLock {
    async fn try_acquire(
        &self,
        spec: &LockSpec,
        holder: &str,
    ) -> Result<Option<LockHandle>, AppError> {
        let now = Instant::now();
        let mut records = self.records();

        if records
            .get(&spec.job_name)
            .is_some_and(|r| r.lock_until > now)
        {
            return Ok(None);
        }

        let token = Uuid::new_v4();
        records.insert(
            spec.job_name.clone(),
            LockRecord {
                token,
                acquired: now,
                lock_until: now + spec.max_hold,
            },
        );

        Ok(Some(LockHandle {
            job_name: spec.job_name.clone(),
            holder: holder.to_string(),
            token,
            acquired_at: Utc::now(),
            min_hold: spec.min_hold,
            max_hold: spec.max_hold,
        }))
    }

    async fn release(&self, handle: LockHandle) -> Result<bool, AppError> {
        let now = Instant::now();
        let mut records = self.records();

        let Some(record) = records.get_mut(&handle.job_name) else {
            return Ok(false);
        };
        if record.token != handle.token {
            return Ok(false);
        }

        let hold_until = record.acquired + handle.min_hold;
        if hold_until > now {
            record.lock_until = hold_until;
        } else {
            records.remove(&handle.job_name);
        }
        Ok(true)
    }
}
