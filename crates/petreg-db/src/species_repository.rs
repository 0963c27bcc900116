//! Species repository.

use petreg_core::error::AppError;
use petreg_core::models::Species;
use petreg_core::traits::SpeciesStore;
use sqlx::{PgPool, Pool, Postgres};

/// Read access to the `species` table.
#[derive(Clone)]
pub struct SpeciesRepository {
    pool: Pool<Postgres>,
}

impl SpeciesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All species ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Species>, AppError> {
        let rows: Vec<Species> = sqlx::query_as("SELECT id, name FROM species ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Species>, AppError> {
        let row: Option<Species> = sqlx::query_as("SELECT id, name FROM species WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

impl SpeciesStore for SpeciesRepository {
    async fn find_by_name(&self, name: &str) -> Result<Species, AppError> {
        let row: Option<Species> = sqlx::query_as("SELECT id, name FROM species WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| AppError::SpeciesNotFound(name.to_string()))
    }
}
