//! Breed reconciliation logic.
//!
//! This module provides the pure diff between a vendor fetch and the breeds
//! already stored for a species, decoupled from I/O. It also holds the
//! statistics type the sync pipeline fills in.

use std::collections::HashSet;

use crate::models::{Breed, ExternalBreedRecord, NewBreed};

/// Result of diffing a vendor fetch against stored breeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Breeds not yet stored for the species, in fetch order.
    pub to_insert: Vec<NewBreed>,
    /// Number of fetched records whose external id is already stored.
    pub already_present: usize,
    /// Normalized external ids that appeared more than once in the fetch.
    /// Only the first occurrence of each is kept.
    pub duplicates_in_fetch: Vec<String>,
}

impl ReconcileOutcome {
    /// True when the fetch contained nothing new.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty()
    }
}

/// Computes the breeds to insert for `species_id`.
///
/// Dedup is keyed on the normalized external id, so a numeric vendor id
/// matches its stored string form. Existing breeds without an external id
/// (created manually) never match a vendor record.
///
/// # Examples
///
/// ```
/// use petreg_core::models::ExternalBreedRecord;
/// use petreg_core::reconcile::diff;
///
/// let fetched = vec![ExternalBreedRecord::new(1, "A"), ExternalBreedRecord::new(2, "B")];
/// let outcome = diff(fetched, &[], 1);
/// assert_eq!(outcome.to_insert.len(), 2);
/// ```
pub fn diff(
    records: Vec<ExternalBreedRecord>,
    existing: &[Breed],
    species_id: i64,
) -> ReconcileOutcome {
    let stored: HashSet<&str> = existing
        .iter()
        .filter_map(|b| b.external_api_id.as_deref())
        .map(str::trim)
        .collect();

    let mut seen = HashSet::with_capacity(records.len());
    let mut outcome = ReconcileOutcome::default();

    for record in records {
        let key = record.external_id.normalized();

        if !seen.insert(key.clone()) {
            outcome.duplicates_in_fetch.push(key);
            continue;
        }

        if stored.contains(key.as_str()) {
            outcome.already_present += 1;
            continue;
        }

        outcome.to_insert.push(record.into_new_breed(species_id));
    }

    outcome
}

/// Statistics for a single vendor sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Records obtained from the vendor (0 on fallback).
    pub fetched: usize,
    pub already_present: usize,
    pub duplicates_in_fetch: usize,
    pub inserted: usize,
    /// Candidates rejected by a storage uniqueness constraint.
    pub conflicted: usize,
}

impl SyncStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a reconciliation outcome into the counters.
    pub fn record_reconcile(&mut self, outcome: &ReconcileOutcome) {
        self.already_present = outcome.already_present;
        self.duplicates_in_fetch = outcome.duplicates_in_fetch.len();
    }

    /// Number of records that were new when reconciled.
    pub fn candidates(&self) -> usize {
        self.inserted + self.conflicted
    }
}
