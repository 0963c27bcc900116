//! Per-vendor scheduling of breed sync runs.
//!
//! Each vendor becomes a [`SyncJob`] with its own cron schedule, timezone,
//! lock and circuit breaker. The [`SyncScheduler`] owns the jobs and drives
//! them:
//!
//! ```text
//! run_startup()  -> every job once, concurrently, awaited
//! start()        -> one task per job:
//!                     loop {
//!                         sleep until next cron fire (job timezone)
//!                         run_once(Scheduled)
//!                     }
//! trigger(name)  -> run_once(Manual)
//! shutdown()     -> cancel tasks and join them
//! ```
//!
//! A run moves through `Idle -> AcquiringLock -> Running -> Idle`. If another
//! instance holds the job lock the run is skipped. Errors and panics inside
//! the pipeline are contained and recorded in the [`RunReport`]; nothing
//! escapes to the task loop, so one vendor can never stop the other.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::breed_sync::{BreedSyncService, FetchGuard, SyncReport};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use crate::config::{HttpConfig, SyncSettings, VendorEntry};
use crate::lock::LockSpec;
use crate::progress::{SyncEvent, SyncReporter, TracingReporter};
use crate::traits::{BreedSource, BreedStore, JobLock, SpeciesStore};
use crate::AppError;

/// Lock and job name for a vendor.
pub fn job_name(vendor: &str) -> String {
    format!("breed_sync_{}", vendor)
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    AcquiringLock,
    Running,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::AcquiringLock => write!(f, "acquiring_lock"),
            JobState::Running => write!(f, "running"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunStatus {
    Completed(SyncReport),
    /// The lock was held elsewhere; nothing ran.
    Skipped,
    Failed { error: String },
}

/// Record of a single run attempt.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub job: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed(_))
    }

    pub fn status_label(&self) -> &'static str {
        match self.status {
            RunStatus::Completed(_) => "completed",
            RunStatus::Skipped => "skipped",
            RunStatus::Failed { .. } => "failed",
        }
    }

    pub fn sync_report(&self) -> Option<&SyncReport> {
        match &self.status {
            RunStatus::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// Breeds inserted by this run (0 unless completed).
    pub fn inserted(&self) -> usize {
        self.sync_report().map_or(0, |r| r.stats.inserted)
    }

    pub fn fetched(&self) -> usize {
        self.sync_report().map_or(0, |r| r.stats.fetched)
    }

    /// True if the run completed on the fallback instead of vendor data.
    pub fn fallback(&self) -> bool {
        self.sync_report().is_some_and(|r| r.fetch.is_fallback())
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Per-job settings, usually derived from a [`VendorEntry`].
#[derive(Debug, Clone)]
pub struct SyncJobConfig {
    pub species: String,
    pub cron: String,
    pub timezone: String,
    pub lock_min_hold: Duration,
    pub lock_max_hold: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Identifies this instance in the lock table.
    pub holder: String,
}

impl SyncJobConfig {
    /// Builds the job settings for a vendor entry. `CB_*` environment
    /// variables override the entry's breaker settings.
    pub fn from_vendor(entry: &VendorEntry, holder: impl Into<String>) -> Self {
        Self {
            species: entry.species().to_string(),
            cron: entry.cron.clone(),
            timezone: entry.timezone.clone(),
            lock_min_hold: entry.lock_min_hold(),
            lock_max_hold: entry.lock_max_hold(),
            circuit_breaker: entry
                .circuit_breaker
                .to_breaker_config()
                .with_env_overrides(),
            holder: holder.into(),
        }
    }
}

#[derive(Debug)]
/// Overlapping calls (a manual trigger during a scheduled run) each hold their own phase.
struct JobStatus {
    acquiring: usize,
    running: usize,
    last_run: Option<RunReport>,
}

impl JobStatus {
    fn state(&self) -> JobState {
        if self.running > 0 {
            JobState::Running
        } else if self.acquiring > 0 {
            JobState::AcquiringLock
        } else {
            JobState::Idle
        }
    }

    fn counter(&mut self, phase: JobState) -> Option<&mut usize> {
        match phase {
            JobState::AcquiringLock => Some(&mut self.acquiring),
            JobState::Running => Some(&mut self.running),
            JobState::Idle => None,
        }
    }
}

/// Keeps one call counted in a phase until dropped.
struct PhaseGuard<'a> {
    status: &'a Mutex<JobStatus>,
    phase: JobState,
}

impl<'a> PhaseGuard<'a> {
    fn enter(status: &'a Mutex<JobStatus>, phase: JobState) -> Self {
        let mut current = status.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = current.counter(phase) {
            *count += 1;
        }
        Self { status, phase }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = current.counter(self.phase) {
            *count = count.saturating_sub(1);
        }
    }
}

/// One vendor's scheduled sync.
pub struct SyncJob<S, Sp, B, L>
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    name: String,
    vendor: String,
    species: String,
    source: S,
    guard: FetchGuard,
    service: BreedSyncService<Sp, B>,
    lock: L,
    lock_spec: LockSpec,
    cron: String,
    schedule: Schedule,
    timezone: Tz,
    holder: String,
    reporter: Arc<dyn SyncReporter>,
    status: Mutex<JobStatus>,
}

impl<S, Sp, B, L> SyncJob<S, Sp, B, L>
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    /// Creates a job for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigError`] for an invalid cron expression or
    /// an unknown timezone.
    pub fn new(
        source: S,
        service: BreedSyncService<Sp, B>,
        lock: L,
        config: SyncJobConfig,
    ) -> Result<Self, AppError> {
        let vendor = source.vendor_key().to_string();
        let name = job_name(&vendor);

        let schedule = Schedule::from_str(&config.cron).map_err(|e| {
            AppError::ConfigError(format!(
                "Invalid cron expression '{}' for vendor '{}': {}",
                config.cron, vendor, e
            ))
        })?;
        let timezone: Tz = config.timezone.parse().map_err(|e| {
            AppError::ConfigError(format!(
                "Invalid timezone '{}' for vendor '{}': {}",
                config.timezone, vendor, e
            ))
        })?;

        let guard = FetchGuard::with_default(CircuitBreaker::new(
            vendor.clone(),
            config.circuit_breaker,
        ));
        let lock_spec = LockSpec::new(name.clone(), config.lock_min_hold, config.lock_max_hold);

        Ok(Self {
            name,
            vendor,
            species: config.species,
            source,
            guard,
            service,
            lock,
            lock_spec,
            cron: config.cron,
            schedule,
            timezone,
            holder: config.holder,
            reporter: Arc::new(TracingReporter),
            status: Mutex::new(JobStatus {
                acquiring: 0,
                running: 0,
                last_run: None,
            }),
        })
    }

    /// Replaces the default [`TracingReporter`].
    pub fn with_reporter(mut self, reporter: Arc<dyn SyncReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The guard around this vendor's fetches. Shared with previews so they
    /// see and affect the same breaker.
    pub fn guard(&self) -> &FetchGuard {
        &self.guard
    }

    pub fn lock_spec(&self) -> &LockSpec {
        &self.lock_spec
    }

    pub fn cron_expression(&self) -> &str {
        &self.cron
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn status(&self) -> MutexGuard<'_, JobStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> JobState {
        self.status().state()
    }

    pub fn last_run(&self) -> Option<RunReport> {
        self.status().last_run.clone()
    }

    /// Next fire time strictly after `after`, evaluated in the job timezone.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Runs the pipeline once under the job lock.
    ///
    /// Never returns an error: contention, failures and panics are all
    /// reported through the returned [`RunReport`].
    pub async fn run_once(&self, trigger: Trigger) -> RunReport {
        let started_at = Utc::now();
        let reporter = self.reporter.as_ref();

        let acquiring = PhaseGuard::enter(&self.status, JobState::AcquiringLock);
        let status = match self.lock.try_acquire(&self.lock_spec, &self.holder).await {
            Ok(None) => {
                reporter.report(SyncEvent::LockContended {
                    job: &self.name,
                    trigger: trigger.as_str(),
                });
                RunStatus::Skipped
            }
            Err(e) => {
                let error = format!("lock acquisition failed: {}", e);
                reporter.report(SyncEvent::RunFailed {
                    job: &self.name,
                    error: &error,
                });
                RunStatus::Failed { error }
            }
            Ok(Some(handle)) => {
                let _running = PhaseGuard::enter(&self.status, JobState::Running);
                reporter.report(SyncEvent::RunStarted {
                    job: &self.name,
                    trigger: trigger.as_str(),
                });

                let outcome = AssertUnwindSafe(self.service.sync_vendor(
                    &self.source,
                    &self.guard,
                    &self.species,
                    reporter,
                ))
                .catch_unwind()
                .await;

                let status = match outcome {
                    Ok(Ok(report)) => {
                        reporter.report(SyncEvent::RunFinished {
                            job: &self.name,
                            stats: &report.stats,
                            fallback: report.fetch.is_fallback(),
                        });
                        RunStatus::Completed(report)
                    }
                    Ok(Err(e)) => {
                        let error = e.to_string();
                        reporter.report(SyncEvent::RunFailed {
                            job: &self.name,
                            error: &error,
                        });
                        RunStatus::Failed { error }
                    }
                    Err(payload) => {
                        let error = format!("panic: {}", panic_message(payload.as_ref()));
                        reporter.report(SyncEvent::RunFailed {
                            job: &self.name,
                            error: &error,
                        });
                        RunStatus::Failed { error }
                    }
                };

                match self.lock.release(handle).await {
                    Ok(true) => {}
                    Ok(false) => reporter.report(SyncEvent::LockLost { job: &self.name }),
                    Err(e) => reporter.report(SyncEvent::LockReleaseFailed {
                        job: &self.name,
                        error: &e.to_string(),
                    }),
                }

                status
            }
        };

        let report = RunReport {
            job: self.name.clone(),
            trigger,
            started_at,
            finished_at: Utc::now(),
            status,
        };

        self.status().last_run = Some(report.clone());
        drop(acquiring);
        report
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.status();
        JobSnapshot {
            job: self.name.clone(),
            vendor: self.vendor.clone(),
            species: self.species.clone(),
            state: status.state(),
            cron: self.cron.clone(),
            timezone: self.timezone.name().to_string(),
            next_fire: self.next_fire_after(Utc::now()),
            last_run: status.last_run.clone(),
            circuit: self.guard.breaker().stats(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Point-in-time view of a job, for status endpoints.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job: String,
    pub vendor: String,
    pub species: String,
    pub state: JobState,
    pub cron: String,
    pub timezone: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub last_run: Option<RunReport>,
    pub circuit: CircuitBreakerStats,
}

/// Owns the vendor jobs and their background tasks.
pub struct SyncScheduler<S, Sp, B, L>
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    jobs: Vec<Arc<SyncJob<S, Sp, B, L>>>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, Sp, B, L> Default for SyncScheduler<S, Sp, B, L>
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, Sp, B, L> SyncScheduler<S, Sp, B, L>
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Builds one job per enabled vendor.
    ///
    /// `make_source` turns a vendor entry into a [`BreedSource`]; its
    /// `vendor_key` must be the entry name.
    pub fn from_settings<F>(
        settings: &SyncSettings,
        service: BreedSyncService<Sp, B>,
        lock: L,
        holder: &str,
        reporter: Arc<dyn SyncReporter>,
        mut make_source: F,
    ) -> Result<Self, AppError>
    where
        F: FnMut(&VendorEntry, &HttpConfig) -> Result<S, AppError>,
    {
        let mut scheduler = Self::new();
        for entry in settings.enabled_vendors() {
            let source = make_source(entry, &settings.http)?;
            let job = SyncJob::new(
                source,
                service.clone(),
                lock.clone(),
                SyncJobConfig::from_vendor(entry, holder),
            )?
            .with_reporter(Arc::clone(&reporter));
            scheduler.register(job)?;
        }
        Ok(scheduler)
    }

    /// Adds a job. Job names must be unique.
    pub fn register(&mut self, job: SyncJob<S, Sp, B, L>) -> Result<(), AppError> {
        if self.jobs.iter().any(|j| j.name() == job.name()) {
            return Err(AppError::ConfigError(format!(
                "Job '{}' is already registered",
                job.name()
            )));
        }
        self.jobs.push(Arc::new(job));
        Ok(())
    }

    pub fn jobs(&self) -> &[Arc<SyncJob<S, Sp, B, L>>] {
        &self.jobs
    }

    /// Looks a job up by vendor key or job name.
    pub fn job(&self, name: &str) -> Option<&Arc<SyncJob<S, Sp, B, L>>> {
        self.jobs
            .iter()
            .find(|j| j.vendor().eq_ignore_ascii_case(name) || j.name() == name)
    }

    /// Runs every job once, concurrently, and waits for all of them.
    pub async fn run_startup(&self) -> Vec<RunReport> {
        join_all(self.jobs.iter().map(|job| job.run_once(Trigger::Startup))).await
    }

    /// Runs one job now, through the same lock as scheduled runs.
    ///
    /// Returns `None` for an unknown job.
    pub async fn trigger(&self, name: &str) -> Option<RunReport> {
        let job = self.job(name)?;
        Some(job.run_once(Trigger::Manual).await)
    }

    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        self.jobs.iter().map(|j| j.snapshot()).collect()
    }

    /// Token cancelled by [`SyncScheduler::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

impl<S, Sp, B, L> SyncScheduler<S, Sp, B, L>
where
    S: BreedSource + 'static,
    Sp: SpeciesStore + 'static,
    B: BreedStore + 'static,
    L: JobLock + 'static,
{
    /// Spawns one cron task per job. Calling it again while tasks are
    /// running does nothing.
    pub fn start(&self) -> usize {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        if !handles.is_empty() {
            tracing::warn!("Scheduler already started");
            return 0;
        }

        for job in &self.jobs {
            let job = Arc::clone(job);
            let cancel = self.cancel.child_token();
            handles.push(tokio::spawn(run_schedule(job, cancel)));
        }
        handles.len()
    }

    /// Startup sequence: the eager run (unless `eager` is false) completes
    /// before any cron task is spawned.
    pub async fn launch(&self, eager: bool) -> Vec<RunReport> {
        let reports = if eager {
            self.run_startup().await
        } else {
            Vec::new()
        };
        self.start();
        reports
    }
}

async fn run_schedule<S, Sp, B, L>(job: Arc<SyncJob<S, Sp, B, L>>, cancel: CancellationToken)
where
    S: BreedSource,
    Sp: SpeciesStore,
    B: BreedStore,
    L: JobLock,
{
    tracing::info!(
        job = job.name(),
        cron = job.cron_expression(),
        timezone = %job.timezone(),
        "Scheduled breed sync"
    );

    loop {
        let now = Utc::now();
        let Some(next) = job.next_fire_after(now) else {
            tracing::warn!(job = job.name(), "Cron schedule has no upcoming fire time");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(job = job.name(), next = %next, "Waiting for next fire time");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => break,
        }

        job.run_once(Trigger::Scheduled).await;
    }

    tracing::info!(job = job.name(), "Scheduler task stopped");
}
