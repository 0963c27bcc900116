use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use petreg_client::BreedSourceEnum;
use petreg_core::SyncScheduler;
use petreg_db::{BreedRepository, PgJobLock, SpeciesRepository};

/// The scheduler as wired in the server: HTTP vendors, Postgres stores and lock.
pub type BreedScheduler =
    SyncScheduler<BreedSourceEnum, SpeciesRepository, BreedRepository, PgJobLock>;

/// Shared application state for all handlers.
///
/// This is wrapped in Arc internally by Axum when using `with_state()`,
/// so all fields must implement Clone (which they do via internal `Arc<Pool>`).
#[derive(Clone)]
pub struct AppState {
    /// Pool used for health checks
    pub pool: PgPool,

    pub species_repo: SpeciesRepository,

    pub breed_repo: BreedRepository,

    /// Vendor jobs, for status, manual triggers and previews
    pub scheduler: Arc<BreedScheduler>,

    /// Bearer token for admin endpoints; `None` disables them
    pub admin_token: Option<String>,

    /// Cancellation token for graceful shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        scheduler: Arc<BreedScheduler>,
        admin_token: Option<String>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            species_repo: SpeciesRepository::new(pool.clone()),
            breed_repo: BreedRepository::new(pool.clone()),
            pool,
            scheduler,
            admin_token,
            shutdown_token,
        }
    }
}
