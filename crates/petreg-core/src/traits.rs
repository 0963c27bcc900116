//! Trait definitions for external dependencies.
//!
//! This module defines traits that abstract over external dependencies
//! (breed vendors, data stores, the scheduler lock), enabling:
//!
//! - **Testability**: Mock implementations for unit testing
//! - **Flexibility**: Different backends (PostgreSQL, in-memory)
//! - **Decoupling**: The sync pipeline doesn't depend on specific implementations
//!
//! # Example
//!
//! ```
//! use petreg_core::traits::{BreedSource, BreedStore, SpeciesStore};
//!
//! // Business logic uses traits, not concrete types
//! async fn count_new<S, Sp, B>(
//!     source: &S,
//!     species: &Sp,
//!     breeds: &B,
//! ) -> Result<usize, petreg_core::AppError>
//! where
//!     S: BreedSource,
//!     Sp: SpeciesStore,
//!     B: BreedStore,
//! {
//!     let cat = species.find_by_name("Cat").await?;
//!     let existing = breeds.find_by_species(cat.id).await?;
//!     let fetched = source.fetch_all().await?;
//!     Ok(petreg_core::reconcile::diff(fetched, &existing, cat.id).to_insert.len())
//! }
//! ```

use std::future::Future;

use crate::lock::{LockHandle, LockSpec};
use crate::{AppError, Breed, ExternalBreedRecord, NewBreed, Species};

/// A vendor catalog of breeds (TheCatAPI, TheDogAPI).
pub trait BreedSource: Send + Sync + Clone {
    /// Short vendor key used in job names and logs (`"cat"`, `"dog"`).
    fn vendor_key(&self) -> &str;

    /// Fetches the complete breed list.
    ///
    /// A successful empty list is `Ok(vec![])`. Failures are reported through
    /// distinct [`AppError`] variants so the circuit breaker can classify them.
    fn fetch_all(
        &self,
    ) -> impl Future<Output = Result<Vec<ExternalBreedRecord>, AppError>> + Send;
}

/// Read access to species seed data.
pub trait SpeciesStore: Send + Sync + Clone {
    /// Looks a species up by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SpeciesNotFound`] when no row matches.
    fn find_by_name(&self, name: &str) -> impl Future<Output = Result<Species, AppError>> + Send;
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInsertResult {
    /// Rows that were persisted, with store-assigned ids.
    pub inserted: Vec<Breed>,
    /// Candidates rejected by a uniqueness constraint.
    pub skipped: Vec<NewBreed>,
}

/// Store for breed persistence.
pub trait BreedStore: Send + Sync + Clone {
    /// Returns every breed stored for a species.
    fn find_by_species(
        &self,
        species_id: i64,
    ) -> impl Future<Output = Result<Vec<Breed>, AppError>> + Send;

    /// Inserts candidates in one batch.
    ///
    /// A unique violation on a single row is not an error: the row is reported
    /// in [`BulkInsertResult::skipped`] and the others are still persisted.
    fn bulk_insert(
        &self,
        breeds: &[NewBreed],
    ) -> impl Future<Output = Result<BulkInsertResult, AppError>> + Send;
}

/// Cross-instance mutual exclusion for scheduled jobs.
///
/// A lock is acquired for at most `max_hold` and, once released, stays held
/// until `min_hold` has elapsed since acquisition.
pub trait JobLock: Send + Sync + Clone {
    /// Attempts to take the lock without waiting.
    ///
    /// Returns `Ok(None)` when another holder owns an unexpired lock.
    fn try_acquire(
        &self,
        spec: &LockSpec,
        holder: &str,
    ) -> impl Future<Output = Result<Option<LockHandle>, AppError>> + Send;

    /// Releases a previously acquired lock.
    ///
    /// Returns `false` when the handle no longer owns the lock (it expired and
    /// was taken by someone else); nothing is changed in that case.
    fn release(&self, handle: LockHandle) -> impl Future<Output = Result<bool, AppError>> + Send;
}
