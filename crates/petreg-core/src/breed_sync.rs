//! Breed sync service.
//!
//! [`BreedSyncService`] runs one vendor through the pipeline:
//!
//! ```text
//! species lookup -> guarded fetch -> load existing -> diff -> bulk insert
//! ```
//!
//! The service is generic over [`SpeciesStore`] and [`BreedStore`] so the
//! same logic runs against PostgreSQL in production and in-memory stores in
//! tests. It does not take locks; scheduling and mutual exclusion belong to
//! [`crate::scheduler`].
//!
//! # Example
//!
//! ```ignore
//! use petreg_core::breed_sync::BreedSyncService;
//! use petreg_core::circuit_breaker::{CircuitBreaker, FallbackGuard};
//! use petreg_core::progress::TracingReporter;
//!
//! let service = BreedSyncService::new(species_repo, breed_repo);
//! let guard = FallbackGuard::with_default(CircuitBreaker::new("cat", Default::default()));
//! let report = service.sync_vendor(&cat_client, &guard, "Cat", &TracingReporter).await?;
//! println!("{} new breeds", report.stats.inserted);
//! ```

use crate::circuit_breaker::{FallbackGuard, FallbackReason, Guarded};
use crate::models::{Breed, ExternalBreedRecord, Species};
use crate::progress::{SyncEvent, SyncReporter};
use crate::reconcile::{self, SyncStats};
use crate::traits::{BreedSource, BreedStore, SpeciesStore};
use crate::AppError;

/// Guard type used around vendor fetches. Its fallback yields an empty list.
pub type FetchGuard = FallbackGuard<Vec<ExternalBreedRecord>>;

/// Where the records of a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    /// The vendor answered (possibly with an empty list).
    Live,
    /// The guard substituted its fallback.
    Fallback(FallbackReason),
}

impl FetchSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FetchSource::Fallback(_))
    }
}

/// Outcome of one vendor sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub vendor: String,
    pub species: Species,
    pub fetch: FetchSource,
    pub stats: SyncStats,
    /// Rows persisted by this run.
    pub inserted: Vec<Breed>,
}

/// Service that reconciles vendor breed lists into the local store.
pub struct BreedSyncService<Sp, B>
where
    Sp: SpeciesStore,
    B: BreedStore,
{
    species: Sp,
    breeds: B,
}

impl<Sp, B> Clone for BreedSyncService<Sp, B>
where
    Sp: SpeciesStore,
    B: BreedStore,
{
    fn clone(&self) -> Self {
        Self {
            species: self.species.clone(),
            breeds: self.breeds.clone(),
        }
    }
}

impl<Sp, B> BreedSyncService<Sp, B>
where
    Sp: SpeciesStore,
    B: BreedStore,
{
    pub fn new(species: Sp, breeds: B) -> Self {
        Self { species, breeds }
    }

    pub fn species_store(&self) -> &Sp {
        &self.species
    }

    pub fn breed_store(&self) -> &B {
        &self.breeds
    }

    /// Synchronizes one vendor into `species_name`.
    ///
    /// Vendor failures never surface as errors here: the guard substitutes
    /// an empty list and the run completes with nothing inserted.
    ///
    /// # Errors
    ///
    /// - [`AppError::SpeciesNotFound`] if the target species is missing. This
    ///   is checked before any network call.
    /// - Store errors other than per-row uniqueness conflicts.
    pub async fn sync_vendor<S>(
        &self,
        source: &S,
        guard: &FetchGuard,
        species_name: &str,
        reporter: &dyn SyncReporter,
    ) -> Result<SyncReport, AppError>
    where
        S: BreedSource,
    {
        let vendor = source.vendor_key();
        let species = self.species.find_by_name(species_name).await?;

        let mut stats = SyncStats::new();
        let (records, fetch) = match guard.call(|| source.fetch_all()).await {
            Guarded::Live(records) => {
                if records.is_empty() {
                    reporter.report(SyncEvent::FetchEmpty { vendor });
                } else {
                    reporter.report(SyncEvent::Fetched {
                        vendor,
                        count: records.len(),
                    });
                }
                (records, FetchSource::Live)
            }
            Guarded::Fallback { value, reason } => {
                reporter.report(SyncEvent::FetchFellBack {
                    vendor,
                    reason: &reason,
                });
                (value, FetchSource::Fallback(reason))
            }
        };
        stats.fetched = records.len();

        let existing = self.breeds.find_by_species(species.id).await?;
        let outcome = reconcile::diff(records, &existing, species.id);
        stats.record_reconcile(&outcome);

        for external_id in &outcome.duplicates_in_fetch {
            reporter.report(SyncEvent::DuplicateExternalId {
                vendor,
                external_id,
            });
        }

        if outcome.is_empty() {
            reporter.report(SyncEvent::NothingNew {
                vendor,
                already_present: outcome.already_present,
            });
            return Ok(SyncReport {
                vendor: vendor.to_string(),
                species,
                fetch,
                stats,
                inserted: Vec::new(),
            });
        }

        let result = self.breeds.bulk_insert(&outcome.to_insert).await?;
        stats.inserted = result.inserted.len();
        stats.conflicted = result.skipped.len();

        if !result.skipped.is_empty() {
            let names: Vec<String> = result.skipped.iter().map(|b| b.name.clone()).collect();
            reporter.report(SyncEvent::InsertConflicts {
                vendor,
                skipped: names.len(),
                names: &names,
            });
        }
        if !result.inserted.is_empty() {
            reporter.report(SyncEvent::Inserted {
                vendor,
                species: &species.name,
                count: result.inserted.len(),
            });
        }

        Ok(SyncReport {
            vendor: vendor.to_string(),
            species,
            fetch,
            stats,
            inserted: result.inserted,
        })
    }
}
