//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the core traits so that
//! `BreedSyncService` and `SyncScheduler` can be tested in isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use petreg_core::traits::{BreedSource, BreedStore, BulkInsertResult, SpeciesStore};
use petreg_core::{AppError, Breed, ExternalBreedRecord, NewBreed, Species, SyncEvent, SyncReporter};

// =============================================================================
// MockBreedSource
// =============================================================================

/// What the next `fetch_all` calls do.
#[derive(Clone)]
pub enum SourceBehavior {
    Records(Vec<ExternalBreedRecord>),
    NetworkFailure,
    ServerError(u16),
    Panic,
    Slow(Duration),
}

/// Mock vendor with a switchable behavior and a call counter.
#[derive(Clone)]
pub struct MockBreedSource {
    vendor: String,
    behavior: Arc<Mutex<SourceBehavior>>,
    calls: Arc<AtomicUsize>,
}

impl MockBreedSource {
    pub fn new(vendor: &str, records: Vec<ExternalBreedRecord>) -> Self {
        Self {
            vendor: vendor.to_string(),
            behavior: Arc::new(Mutex::new(SourceBehavior::Records(records))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(vendor: &str) -> Self {
        let source = Self::new(vendor, Vec::new());
        source.set_behavior(SourceBehavior::NetworkFailure);
        source
    }

    pub fn set_behavior(&self, behavior: SourceBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BreedSource for MockBreedSource {
    fn vendor_key(&self) -> &str {
        &self.vendor
    }

    async fn fetch_all(&self) -> Result<Vec<ExternalBreedRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            SourceBehavior::Records(records) => Ok(records),
            SourceBehavior::NetworkFailure => {
                Err(AppError::NetworkError("connection refused".to_string()))
            }
            SourceBehavior::ServerError(status) => Err(AppError::UpstreamStatus {
                status,
                url: format!("https://{}.example.com/v1/breeds", self.vendor),
            }),
            SourceBehavior::Panic => panic!("vendor {} exploded", self.vendor),
            SourceBehavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Cat-style records with string ids.
pub fn cat_records() -> Vec<ExternalBreedRecord> {
    vec![
        ExternalBreedRecord::new("abys", "Abyssinian"),
        ExternalBreedRecord::new("aege", "Aegean"),
        ExternalBreedRecord::new("beng", "Bengal"),
    ]
}

/// Dog-style records with integer ids.
pub fn dog_records() -> Vec<ExternalBreedRecord> {
    vec![
        ExternalBreedRecord::new(1, "Affenpinscher"),
        ExternalBreedRecord::new(2, "Afghan Hound"),
    ]
}

// =============================================================================
// MockSpeciesStore
// =============================================================================

#[derive(Clone)]
pub struct MockSpeciesStore {
    species: Arc<Vec<Species>>,
}

impl MockSpeciesStore {
    /// Seeded like the migration: Cat = 1, Dog = 2.
    pub fn seeded() -> Self {
        Self::with(vec![
            Species {
                id: 1,
                name: "Cat".to_string(),
            },
            Species {
                id: 2,
                name: "Dog".to_string(),
            },
        ])
    }

    pub fn with(species: Vec<Species>) -> Self {
        Self {
            species: Arc::new(species),
        }
    }
}

impl SpeciesStore for MockSpeciesStore {
    async fn find_by_name(&self, name: &str) -> Result<Species, AppError> {
        self.species
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| AppError::SpeciesNotFound(name.to_string()))
    }
}

// =============================================================================
// MockBreedStore
// =============================================================================

/// In-memory breed table enforcing the same unique constraints as the
/// PostgreSQL schema: `(external_api_id, species_id)` and `(species_id, name)`.
#[derive(Clone, Default)]
pub struct MockBreedStore {
    breeds: Arc<Mutex<Vec<Breed>>>,
    insert_calls: Arc<AtomicUsize>,
}

impl MockBreedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a breed directly, bypassing the sync pipeline.
    pub fn seed(&self, species_id: i64, name: &str, external_api_id: Option<&str>) {
        let mut breeds = self.breeds.lock().unwrap();
        let id = breeds.len() as i64 + 1;
        breeds.push(Breed {
            id,
            name: name.to_string(),
            species_id,
            external_api_id: external_api_id.map(str::to_string),
            created_at: Utc::now(),
        });
    }

    pub fn count(&self, species_id: i64) -> usize {
        self.breeds
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.species_id == species_id)
            .count()
    }

    pub fn names(&self, species_id: i64) -> Vec<String> {
        self.breeds
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.species_id == species_id)
            .map(|b| b.name.clone())
            .collect()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

impl BreedStore for MockBreedStore {
    async fn find_by_species(&self, species_id: i64) -> Result<Vec<Breed>, AppError> {
        Ok(self
            .breeds
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.species_id == species_id)
            .cloned()
            .collect())
    }

    async fn bulk_insert(&self, candidates: &[NewBreed]) -> Result<BulkInsertResult, AppError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut breeds = self.breeds.lock().unwrap();
        let mut result = BulkInsertResult::default();

        for candidate in candidates {
            let conflicts = breeds.iter().any(|b| {
                b.species_id == candidate.species_id
                    && (b.name == candidate.name
                        || (candidate.external_api_id.is_some()
                            && b.external_api_id == candidate.external_api_id))
            });
            if conflicts {
                result.skipped.push(candidate.clone());
                continue;
            }

            let breed = Breed {
                id: breeds.len() as i64 + 1,
                name: candidate.name.clone(),
                species_id: candidate.species_id,
                external_api_id: candidate.external_api_id.clone(),
                created_at: Utc::now(),
            };
            breeds.push(breed.clone());
            result.inserted.push(breed);
        }

        Ok(result)
    }
}

// =============================================================================
// RecordingReporter
// =============================================================================

/// Reporter that keeps a short label for every event it sees.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events().iter().filter(|e| *e == label).count()
    }
}

impl SyncReporter for RecordingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        let label = match event {
            SyncEvent::RunStarted { .. } => "run_started",
            SyncEvent::LockContended { .. } => "lock_contended",
            SyncEvent::Fetched { .. } => "fetched",
            SyncEvent::FetchEmpty { .. } => "fetch_empty",
            SyncEvent::FetchFellBack { .. } => "fetch_fell_back",
            SyncEvent::DuplicateExternalId { .. } => "duplicate_external_id",
            SyncEvent::NothingNew { .. } => "nothing_new",
            SyncEvent::InsertConflicts { .. } => "insert_conflicts",
            SyncEvent::Inserted { .. } => "inserted",
            SyncEvent::RunFinished { .. } => "run_finished",
            SyncEvent::RunFailed { .. } => "run_failed",
            SyncEvent::LockReleaseFailed { .. } => "lock_release_failed",
            SyncEvent::LockLost { .. } => "lock_lost",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
