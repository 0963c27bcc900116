//! Petreg Core - Domain types, business logic, and services for breed sync.
//!
//! This crate provides the core functionality of the petreg breed
//! synchronization, including:
//!
//! - **Domain models**: [`Species`], [`Breed`], [`ExternalBreedRecord`]
//! - **Business logic**: [`reconcile::diff`] dedup against stored breeds
//! - **Resilience**: [`CircuitBreaker`] and [`FallbackGuard`] around vendor calls
//! - **Services**: [`BreedSyncService`] for one vendor run, [`SyncScheduler`]
//!   for cron-driven, lock-guarded runs across vendors
//! - **Traits**: [`BreedSource`], [`SpeciesStore`], [`BreedStore`], [`JobLock`]
//!   for dependency injection
//! - **Progress reporting**: [`SyncReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! This crate is reused by the server and the CLI. I/O is behind traits:
//!
//! - [`BreedSource`] - vendor APIs (`petreg-client`)
//! - [`SpeciesStore`] / [`BreedStore`] - persistence (`petreg-db`)
//! - [`JobLock`] - cross-instance mutual exclusion (`petreg-db`, or
//!   [`MemoryJobLock`] for a single instance)
//!
//! # Example
//!
//! ```ignore
//! use petreg_core::{BreedSyncService, MemoryJobLock, SyncScheduler, TracingReporter};
//!
//! let service = BreedSyncService::new(species_repo, breed_repo);
//! let scheduler = SyncScheduler::from_settings(
//!     &settings,
//!     service,
//!     MemoryJobLock::new(),
//!     "instance-1",
//!     Arc::new(TracingReporter),
//!     |entry, http| BreedSourceEnum::from_vendor(entry, http),
//! )?;
//!
//! scheduler.run_startup().await;
//! scheduler.start();
//! ```

pub mod breed_sync;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod lock;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod scheduler;
pub mod traits;

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
    FallbackGuard, FallbackReason, Guarded,
};

// Configuration
pub use config::{
    CircuitBreakerSettings, DbConfig, HttpConfig, SyncSettings, VendorEntry, VendorKind,
    default_config_path, load_sync_config,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{Breed, ExternalBreedRecord, ExternalId, NewBreed, Species};

// Reconciliation
pub use reconcile::{ReconcileOutcome, SyncStats};

// Locking
pub use lock::{LockHandle, LockSpec, MemoryJobLock};

// Progress reporting
pub use progress::{SilentReporter, SyncEvent, SyncReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{BreedSource, BreedStore, BulkInsertResult, JobLock, SpeciesStore};

// Services
pub use breed_sync::{BreedSyncService, FetchGuard, FetchSource, SyncReport};
pub use scheduler::{
    JobSnapshot, JobState, RunReport, RunStatus, SyncJob, SyncJobConfig, SyncScheduler, Trigger,
    job_name,
};
