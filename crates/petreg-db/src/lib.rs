//! Petreg DB - PostgreSQL persistence for the breed registry
//!
//! This crate provides the repository pattern for species and breeds, plus
//! the table-backed scheduler lock.
//!
//! # Overview
//!
//! The main components are:
//! - [`SpeciesRepository`] - Species lookup (implements `SpeciesStore`)
//! - [`BreedRepository`] - Breed reads and conflict-tolerant bulk insert (implements `BreedStore`)
//! - [`PgJobLock`] - Cross-instance scheduler lock (implements `JobLock`)
//! - [`run_migrations`] - Idempotent schema setup and species seed

mod breed_repository;
mod lock_repository;
mod schema;
mod species_repository;

pub use breed_repository::{BreedRepository, SpeciesBreedCount};
pub use lock_repository::{LockRow, PgJobLock};
pub use schema::{MIGRATIONS, run_migrations};
pub use species_repository::SpeciesRepository;
