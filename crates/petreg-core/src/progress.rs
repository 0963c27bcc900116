//! Progress reporting for breed sync runs.
//!
//! The sync service and scheduler emit [`SyncEvent`]s instead of logging
//! directly, so the server, the CLI and tests can each decide how (and
//! whether) to surface them.

use tracing::{debug, error, info, warn};

use crate::circuit_breaker::FallbackReason;
use crate::reconcile::SyncStats;

/// Events emitted during a vendor sync.
#[derive(Debug, Clone)]
pub enum SyncEvent<'a> {
    /// A run took the lock and is starting.
    RunStarted { job: &'a str, trigger: &'a str },
    /// Another holder owns the job lock; the run was skipped.
    LockContended { job: &'a str, trigger: &'a str },
    /// The vendor answered with a usable list.
    Fetched { vendor: &'a str, count: usize },
    /// The vendor answered with an empty list.
    FetchEmpty { vendor: &'a str },
    /// The breaker refused the call or the call failed; the fallback was used.
    FetchFellBack {
        vendor: &'a str,
        reason: &'a FallbackReason,
    },
    /// The same external id appeared more than once in one fetch.
    DuplicateExternalId {
        vendor: &'a str,
        external_id: &'a str,
    },
    /// Every fetched breed is already stored.
    NothingNew {
        vendor: &'a str,
        already_present: usize,
    },
    /// Some candidates hit a uniqueness constraint and were skipped.
    InsertConflicts {
        vendor: &'a str,
        skipped: usize,
        names: &'a [String],
    },
    /// New breeds were persisted.
    Inserted {
        vendor: &'a str,
        species: &'a str,
        count: usize,
    },
    /// A run completed.
    RunFinished {
        job: &'a str,
        stats: &'a SyncStats,
        fallback: bool,
    },
    /// A run failed with an error or panic.
    RunFailed { job: &'a str, error: &'a str },
    /// Releasing the job lock failed.
    LockReleaseFailed { job: &'a str, error: &'a str },
    /// The lock had already expired and was taken over before release.
    LockLost { job: &'a str },
}

/// Trait for reporting sync events.
///
/// Object-safe so that jobs can share an `Arc<dyn SyncReporter>`.
pub trait SyncReporter: Send + Sync {
    /// Called when a sync event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Silent reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl SyncReporter for SilentReporter {}

/// Tracing-based reporter for server and CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::RunStarted { job, trigger } => {
                info!(job, trigger, "Breed sync started");
            }
            SyncEvent::LockContended { job, trigger } => {
                info!(job, trigger, "Lock held by another instance, skipping run");
            }
            SyncEvent::Fetched { vendor, count } => {
                debug!(vendor, count, "Fetched breeds from vendor");
            }
            SyncEvent::FetchEmpty { vendor } => {
                info!(vendor, "Vendor returned no breeds");
            }
            SyncEvent::FetchFellBack { vendor, reason } => {
                error!(vendor, %reason, "Vendor unavailable, using empty fallback");
            }
            SyncEvent::DuplicateExternalId {
                vendor,
                external_id,
            } => {
                warn!(
                    vendor,
                    external_id, "Duplicate external id in vendor response, keeping first"
                );
            }
            SyncEvent::NothingNew {
                vendor,
                already_present,
            } => {
                info!(vendor, already_present, "No new breeds to insert");
            }
            SyncEvent::InsertConflicts {
                vendor,
                skipped,
                names,
            } => {
                warn!(
                    vendor,
                    skipped,
                    names = ?names,
                    "Breeds skipped on uniqueness conflict"
                );
            }
            SyncEvent::Inserted {
                vendor,
                species,
                count,
            } => {
                info!(vendor, species, inserted = count, "Inserted new breeds");
            }
            SyncEvent::RunFinished {
                job,
                stats,
                fallback,
            } => {
                info!(
                    job,
                    fetched = stats.fetched,
                    already_present = stats.already_present,
                    duplicates = stats.duplicates_in_fetch,
                    inserted = stats.inserted,
                    conflicted = stats.conflicted,
                    fallback,
                    "Breed sync finished"
                );
            }
            SyncEvent::RunFailed { job, error } => {
                error!(job, %error, "Breed sync failed");
            }
            SyncEvent::LockReleaseFailed { job, error } => {
                warn!(job, %error, "Failed to release job lock");
            }
            SyncEvent::LockLost { job } => {
                warn!(job, "Job lock expired before release and was taken over");
            }
        }
    }
}
