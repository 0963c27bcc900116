//! Breed repository.

use std::collections::HashSet;

use petreg_core::error::AppError;
use petreg_core::models::{Breed, NewBreed};
use petreg_core::traits::{BreedStore, BulkInsertResult};
use sqlx::{PgPool, Pool, Postgres};

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const BREED_COLUMNS: &str = "id, name, species_id, external_api_id, created_at";

/// Number of stored breeds for one species.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SpeciesBreedCount {
    pub species_id: i64,
    pub species_name: String,
    pub breeds: i64,
}

/// Breed persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use petreg_db::BreedRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/petreg")
///     .await?;
///
/// let repo = BreedRepository::new(pool);
/// println!("{} breeds", repo.list_all().await?.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BreedRepository {
    pool: Pool<Postgres>,
}

impl BreedRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All breeds, grouped by species and sorted by name.
    pub async fn list_all(&self) -> Result<Vec<Breed>, AppError> {
        let query = format!(
            "SELECT {} FROM breeds ORDER BY species_id, name",
            BREED_COLUMNS
        );
        let rows: Vec<Breed> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Breed>, AppError> {
        let query = format!("SELECT {} FROM breeds WHERE id = $1", BREED_COLUMNS);
        let row: Option<Breed> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Looks a breed up by name within a species.
    pub async fn find_by_name(
        &self,
        species_id: i64,
        name: &str,
    ) -> Result<Option<Breed>, AppError> {
        let query = format!(
            "SELECT {} FROM breeds WHERE species_id = $1 AND name = $2",
            BREED_COLUMNS
        );
        let row: Option<Breed> = sqlx::query_as(&query)
            .bind(species_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Breed totals per species, including species with no breeds.
    pub async fn count_by_species(&self) -> Result<Vec<SpeciesBreedCount>, AppError> {
        let rows: Vec<SpeciesBreedCount> = sqlx::query_as(
            r#"
            SELECT s.id AS species_id, s.name AS species_name, COUNT(b.id) AS breeds
            FROM species s
            LEFT JOIN breeds b ON b.species_id = s.id
            GROUP BY s.id, s.name
            ORDER BY s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl BreedStore for BreedRepository {
    async fn find_by_species(&self, species_id: i64) -> Result<Vec<Breed>, AppError> {
        let query = format!(
            "SELECT {} FROM breeds WHERE species_id = $1 ORDER BY name",
            BREED_COLUMNS
        );
        let rows: Vec<Breed> = sqlx::query_as(&query)
            .bind(species_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts all candidates in one statement.
    ///
    /// Rows hitting either unique constraint are dropped by `ON CONFLICT DO
    /// NOTHING` and reported as skipped; the rest of the batch is committed.
    async fn bulk_insert(&self, breeds: &[NewBreed]) -> Result<BulkInsertResult, AppError> {
        if breeds.is_empty() {
            return Ok(BulkInsertResult::default());
        }

        let names: Vec<String> = breeds.iter().map(|b| b.name.clone()).collect();
        let species_ids: Vec<i64> = breeds.iter().map(|b| b.species_id).collect();
        let external_ids: Vec<Option<String>> =
            breeds.iter().map(|b| b.external_api_id.clone()).collect();

        let query = format!(
            r#"
            INSERT INTO breeds (name, species_id, external_api_id)
            SELECT * FROM UNNEST($1::varchar[], $2::bigint[], $3::varchar[])
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            BREED_COLUMNS
        );
        let inserted: Vec<Breed> = sqlx::query_as(&query)
            .bind(&names)
            .bind(&species_ids)
            .bind(&external_ids)
            .fetch_all(&self.pool)
            .await?;

        let persisted: HashSet<(i64, String, Option<String>)> = inserted
            .iter()
            .map(|b| (b.species_id, b.name.clone(), b.external_api_id.clone()))
            .collect();

        let skipped: Vec<NewBreed> = breeds
            .iter()
            .filter(|b| {
                !persisted.contains(&(b.species_id, b.name.clone(), b.external_api_id.clone()))
            })
            .cloned()
            .collect();

        Ok(BulkInsertResult { inserted, skipped })
    }
}
