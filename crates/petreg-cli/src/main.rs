use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use petreg_cli::{Command, Config};
use petreg_client::BreedSourceEnum;
use petreg_core::traits::{BreedStore, SpeciesStore};
use petreg_core::{
    BreedSyncService, DbConfig, RunReport, RunStatus, SyncScheduler, SyncSettings,
    TracingReporter, Trigger, load_sync_config,
};
use petreg_db::{BreedRepository, PgJobLock, SpeciesRepository, run_migrations};

type CliScheduler = SyncScheduler<BreedSourceEnum, SpeciesRepository, BreedRepository, PgJobLock>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::parse();

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;

    info!("Connecting to database...");
    let db_config = DbConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    match &config.command {
        Command::Migrate => {
            run_migrations(&pool)
                .await
                .context("Failed to apply migrations")?;
            println!("Database schema is up to date.");
        }
        Command::Sync { vendor } => {
            sync(&config, pool, vendor.as_deref()).await?;
        }
        Command::Breeds { species } => {
            list_breeds(&pool, species.as_deref()).await?;
        }
        Command::Species => {
            list_species(&pool).await?;
        }
    }

    Ok(())
}

async fn sync(config: &Config, pool: PgPool, vendor: Option<&str>) -> anyhow::Result<()> {
    let settings = load_sync_config(config.config.clone())
        .context("Failed to load breed sync configuration")?
        .unwrap_or_else(|| {
            info!("No breed sync configuration found, using built-in vendors");
            SyncSettings::builtin()
        });

    let service = BreedSyncService::new(
        SpeciesRepository::new(pool.clone()),
        BreedRepository::new(pool.clone()),
    );
    let scheduler = CliScheduler::from_settings(
        &settings,
        service,
        PgJobLock::new(pool),
        &config.holder(),
        Arc::new(TracingReporter),
        BreedSourceEnum::from_vendor,
    )
    .context("Invalid breed sync configuration")?;

    let reports = match vendor {
        Some(name) => {
            let Some(report) = scheduler.trigger(name).await else {
                let available: Vec<&str> = scheduler.jobs().iter().map(|j| j.vendor()).collect();
                anyhow::bail!(
                    "No enabled vendor named '{}' (available: {})",
                    name,
                    available.join(", ")
                );
            };
            vec![report]
        }
        None => {
            let mut reports = Vec::with_capacity(scheduler.jobs().len());
            for job in scheduler.jobs() {
                reports.push(job.run_once(Trigger::Manual).await);
            }
            reports
        }
    };

    print_sync_summary(&reports);

    let failed = reports.iter().filter(|r| r.error().is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} vendor syncs failed", failed, reports.len());
    }
    Ok(())
}

fn print_sync_summary(reports: &[RunReport]) {
    println!();
    println!("Breed sync summary");
    println!("{}", "-".repeat(60));
    for report in reports {
        match &report.status {
            RunStatus::Completed(sync) => {
                let source = if sync.fetch.is_fallback() {
                    " (vendor unavailable, fallback used)"
                } else {
                    ""
                };
                println!("  {:<20} completed{}", report.job, source);
                println!(
                    "      fetched {:>4}  present {:>4}  inserted {:>4}  skipped {:>4}",
                    sync.stats.fetched,
                    sync.stats.already_present,
                    sync.stats.inserted,
                    sync.stats.conflicted
                );
            }
            RunStatus::Skipped => {
                println!("  {:<20} skipped (locked by another run)", report.job);
            }
            RunStatus::Failed { error } => {
                println!("  {:<20} FAILED: {}", report.job, error);
            }
        }
    }
    println!("{}", "-".repeat(60));
    let inserted: usize = reports.iter().map(RunReport::inserted).sum();
    println!("  Total inserted: {}", inserted);
    println!();
}

async fn list_breeds(pool: &PgPool, species: Option<&str>) -> anyhow::Result<()> {
    let species_repo = SpeciesRepository::new(pool.clone());
    let breed_repo = BreedRepository::new(pool.clone());

    let breeds = match species {
        Some(name) => {
            let species = species_repo.find_by_name(name).await?;
            breed_repo.find_by_species(species.id).await?
        }
        None => breed_repo.list_all().await?,
    };

    if breeds.is_empty() {
        println!("No breeds stored yet. Run: petreg sync");
        return Ok(());
    }

    let names: HashMap<i64, String> = species_repo
        .list_all()
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    println!("{:<6} {:<8} {:<12} NAME", "ID", "SPECIES", "EXTERNAL ID");
    for breed in &breeds {
        println!(
            "{:<6} {:<8} {:<12} {}",
            breed.id,
            names.get(&breed.species_id).map_or("?", String::as_str),
            breed.external_api_id.as_deref().unwrap_or("-"),
            breed.name
        );
    }
    println!("\n{} breeds", breeds.len());

    Ok(())
}

async fn list_species(pool: &PgPool) -> anyhow::Result<()> {
    let counts = BreedRepository::new(pool.clone()).count_by_species().await?;

    println!("{:<6} {:<12} BREEDS", "ID", "NAME");
    for row in &counts {
        println!("{:<6} {:<12} {}", row.species_id, row.species_name, row.breeds);
    }

    Ok(())
}
