//! Database schema.
//!
//! Statements are idempotent and executed one by one, so running them against
//! an already migrated database is a no-op.

use petreg_core::error::AppError;
use sqlx::PgPool;

/// Schema and seed statements, in execution order.
pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS species (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        CONSTRAINT uk_species_name UNIQUE (name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS breeds (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        species_id BIGINT NOT NULL REFERENCES species(id),
        external_api_id VARCHAR(100),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT uk_breeds_species_external_id UNIQUE (species_id, external_api_id),
        CONSTRAINT uk_breeds_species_name UNIQUE (species_id, name)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_breeds_species ON breeds(species_id)",
    r#"CREATE TABLE IF NOT EXISTS scheduler_locks (
        name VARCHAR(64) PRIMARY KEY,
        lock_until TIMESTAMPTZ NOT NULL,
        locked_at TIMESTAMPTZ NOT NULL,
        locked_by VARCHAR(255) NOT NULL,
        token UUID NOT NULL
    )"#,
    "INSERT INTO species (name) VALUES ('Cat'), ('Dog') ON CONFLICT (name) DO NOTHING",
];

/// Applies [`MIGRATIONS`] to the database.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    for (i, statement) in MIGRATIONS.iter().enumerate() {
        sqlx::query(statement).execute(pool).await?;
        tracing::debug!(step = i + 1, total = MIGRATIONS.len(), "Applied migration");
    }
    tracing::info!(statements = MIGRATIONS.len(), "Database schema is up to date");
    Ok(())
}
