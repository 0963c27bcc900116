//! Petreg REST API Server
//!
//! This binary hosts the breed sync scheduler (startup run plus per-vendor
//! cron) and exposes the registry and sync controls over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use petreg_client::BreedSourceEnum;
use petreg_core::{BreedSyncService, SyncSettings, TracingReporter, load_sync_config};
use petreg_db::{BreedRepository, PgJobLock, SpeciesRepository, run_migrations};

use petreg_server::{AppState, BreedScheduler, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let config = ServerConfig::parse();

    // Initialize logging
    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");

    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;

    // Load sync configuration
    let settings = load_sync_config(config.breed_sync_config.clone())
        .context("Failed to load breed sync configuration")?
        .unwrap_or_else(|| {
            info!("No breed sync configuration found, using built-in vendors");
            SyncSettings::builtin()
        });

    let holder = config.holder();
    let service = BreedSyncService::new(
        SpeciesRepository::new(pool.clone()),
        BreedRepository::new(pool.clone()),
    );
    let scheduler = BreedScheduler::from_settings(
        &settings,
        service,
        PgJobLock::new(pool.clone()),
        &holder,
        Arc::new(TracingReporter),
        BreedSourceEnum::from_vendor,
    )
    .context("Invalid breed sync configuration")?;
    let scheduler = Arc::new(scheduler);

    info!(
        jobs = scheduler.jobs().len(),
        holder = %holder,
        "Breed sync scheduler configured"
    );
    if scheduler.jobs().is_empty() {
        warn!("No enabled vendors; breeds will not be synced");
    }

    // Eager run completes before the first cron tick can fire
    if config.skip_startup_sync {
        info!("Startup sync skipped");
    }
    for report in scheduler.launch(!config.skip_startup_sync).await {
        info!(
            job = %report.job,
            status = report.status_label(),
            inserted = report.inserted(),
            fallback = report.fallback(),
            "Startup sync finished"
        );
    }

    // Create shutdown token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    let admin_token = config.admin_token();
    if admin_token.is_none() {
        warn!("PETREG_ADMIN_TOKEN is not set; admin endpoints are disabled");
    }

    let app_state = AppState::new(
        pool,
        Arc::clone(&scheduler),
        admin_token,
        shutdown_token.clone(),
    );
    let app = create_router(app_state, &config);

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting petreg API server on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    scheduler.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
    shutdown_token.cancel();
}
