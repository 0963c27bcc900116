//! Integration tests for SyncJob and SyncScheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use petreg_core::traits::JobLock;
use petreg_core::{
    AppError, BreedSyncService, CircuitBreakerConfig, CircuitState, JobState, LockSpec,
    MemoryJobLock, RunStatus, SilentReporter, SyncJob, SyncJobConfig, SyncScheduler,
    SyncSettings, Trigger,
};

use crate::integration::common::{
    MockBreedSource, MockBreedStore, MockSpeciesStore, RecordingReporter, SourceBehavior,
    cat_records, dog_records,
};

type TestJob = SyncJob<MockBreedSource, MockSpeciesStore, MockBreedStore, MemoryJobLock>;
type TestScheduler =
    SyncScheduler<MockBreedSource, MockSpeciesStore, MockBreedStore, MemoryJobLock>;

fn job_config(species: &str) -> SyncJobConfig {
    SyncJobConfig {
        species: species.to_string(),
        cron: "0 0 3 * * *".to_string(),
        timezone: "UTC".to_string(),
        lock_min_hold: Duration::ZERO,
        lock_max_hold: Duration::from_secs(60),
        circuit_breaker: CircuitBreakerConfig::default(),
        holder: "test-instance".to_string(),
    }
}

fn make_job(
    source: &MockBreedSource,
    store: &MockBreedStore,
    lock: &MemoryJobLock,
    config: SyncJobConfig,
) -> TestJob {
    let service = BreedSyncService::new(MockSpeciesStore::seeded(), store.clone());
    SyncJob::new(source.clone(), service, lock.clone(), config)
        .unwrap()
        .with_reporter(Arc::new(SilentReporter))
}

fn two_vendor_scheduler(
    cat: &MockBreedSource,
    dog: &MockBreedSource,
    store: &MockBreedStore,
    lock: &MemoryJobLock,
) -> TestScheduler {
    let mut scheduler = TestScheduler::new();
    scheduler
        .register(make_job(cat, store, lock, job_config("Cat")))
        .unwrap();
    scheduler
        .register(make_job(dog, store, lock, job_config("Dog")))
        .unwrap();
    scheduler
}

#[tokio::test]
async fn test_startup_runs_every_vendor() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let dog = MockBreedSource::new("dog", dog_records());
    let scheduler = two_vendor_scheduler(&cat, &dog, &store, &lock);

    let reports = scheduler.run_startup().await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_success()));
    assert!(reports.iter().all(|r| r.trigger == Trigger::Startup));
    assert_eq!(store.count(1), 3);
    assert_eq!(store.count(2), 2);
}

#[tokio::test]
async fn test_failing_vendor_does_not_affect_other() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    cat.set_behavior(SourceBehavior::Panic);
    let dog = MockBreedSource::new("dog", dog_records());
    let scheduler = two_vendor_scheduler(&cat, &dog, &store, &lock);

    let reports = scheduler.run_startup().await;

    let cat_report = reports.iter().find(|r| r.job == "breed_sync_cat").unwrap();
    let dog_report = reports.iter().find(|r| r.job == "breed_sync_dog").unwrap();
    assert_eq!(cat_report.status_label(), "failed");
    assert_eq!(dog_report.inserted(), 2);
    assert_eq!(store.count(2), 2);
}

#[tokio::test]
async fn test_panic_is_contained_and_lock_released() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    cat.set_behavior(SourceBehavior::Panic);
    let reporter = RecordingReporter::new();
    let job = make_job(&cat, &store, &lock, job_config("Cat")).with_reporter(Arc::new(reporter.clone()));

    let report = job.run_once(Trigger::Scheduled).await;

    assert!(matches!(report.status, RunStatus::Failed { ref error } if error.contains("exploded")));
    assert_eq!(job.state(), JobState::Idle);
    assert!(!lock.is_held("breed_sync_cat"));
    assert_eq!(reporter.count("run_failed"), 1);

    // The job keeps working once the vendor recovers.
    cat.set_behavior(SourceBehavior::Records(cat_records()));
    let report = job.run_once(Trigger::Scheduled).await;
    assert_eq!(report.inserted(), 3);
}

#[tokio::test]
async fn test_lock_held_elsewhere_skips_run() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let dog = MockBreedSource::new("dog", dog_records());
    let scheduler = two_vendor_scheduler(&cat, &dog, &store, &lock);

    let foreign = LockSpec::new("breed_sync_cat", Duration::ZERO, Duration::from_secs(60));
    lock.try_acquire(&foreign, "other-instance")
        .await
        .unwrap()
        .unwrap();

    let cat_report = scheduler.trigger("cat").await.unwrap();
    let dog_report = scheduler.trigger("dog").await.unwrap();

    assert!(matches!(cat_report.status, RunStatus::Skipped));
    assert_eq!(cat.calls(), 0);
    assert_eq!(store.count(1), 0);
    assert_eq!(dog_report.inserted(), 2, "locks are vendor-scoped");
}

#[tokio::test]
async fn test_concurrent_runs_of_same_job_do_not_overlap() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    cat.set_behavior(SourceBehavior::Slow(Duration::from_millis(200)));
    let job = make_job(&cat, &store, &lock, job_config("Cat"));

    let (a, b) = tokio::join!(job.run_once(Trigger::Manual), job.run_once(Trigger::Scheduled));

    let labels = [a.status_label(), b.status_label()];
    assert!(labels.contains(&"completed"));
    assert!(labels.contains(&"skipped"));
    assert_eq!(cat.calls(), 1);
}

#[tokio::test]
async fn test_skipped_trigger_keeps_running_state() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    cat.set_behavior(SourceBehavior::Slow(Duration::from_millis(300)));
    let job = make_job(&cat, &store, &lock, job_config("Cat"));

    let scheduled = job.run_once(Trigger::Scheduled);
    let manual = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(job.state(), JobState::Running);

        let report = job.run_once(Trigger::Manual).await;
        assert!(matches!(report.status, RunStatus::Skipped));
        assert_eq!(job.state(), JobState::Running);
        assert_eq!(job.snapshot().state, JobState::Running);
    };

    let (first, ()) = tokio::join!(scheduled, manual);

    assert!(first.is_success());
    assert_eq!(job.state(), JobState::Idle);
}

#[tokio::test]
async fn test_min_hold_skips_immediate_rerun() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let dog = MockBreedSource::new("dog", dog_records());
    let config = SyncJobConfig {
        lock_min_hold: Duration::from_secs(60),
        ..job_config("Dog")
    };
    let job = make_job(&dog, &store, &lock, config);

    let first = job.run_once(Trigger::Manual).await;
    let second = job.run_once(Trigger::Manual).await;

    assert_eq!(first.status_label(), "completed");
    assert_eq!(second.status_label(), "skipped");
    assert!(lock.is_held("breed_sync_dog"));
}

#[tokio::test]
async fn test_manual_trigger_reports_inserted_count() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let dog = MockBreedSource::new("dog", dog_records());
    let scheduler = two_vendor_scheduler(&cat, &dog, &store, &lock);

    let report = scheduler.trigger("breed_sync_cat").await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.trigger, Trigger::Manual);
    assert_eq!(report.inserted(), 3);
    assert_eq!(report.fetched(), 3);
    assert!(!report.fallback());

    let again = scheduler.trigger("cat").await.unwrap();
    assert_eq!(again.inserted(), 0);

    assert!(scheduler.trigger("parrot").await.is_none());
}

#[tokio::test]
async fn test_fallback_run_is_completed_with_flag() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let dog = MockBreedSource::failing("dog");
    let job = make_job(&dog, &store, &lock, job_config("Dog"));

    let report = job.run_once(Trigger::Manual).await;

    assert!(report.is_success());
    assert!(report.fallback());
    assert_eq!(report.inserted(), 0);
}

#[tokio::test]
async fn test_missing_species_fails_run() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let job = make_job(&cat, &store, &lock, job_config("Feline"));

    let report = job.run_once(Trigger::Startup).await;

    assert_eq!(report.status_label(), "failed");
    assert!(report.error().unwrap().contains("Feline"));
    assert_eq!(cat.calls(), 0);
    assert!(!lock.is_held("breed_sync_cat"));
}

#[test]
fn test_register_rejects_duplicate_job() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    let mut scheduler = TestScheduler::new();

    scheduler
        .register(make_job(&cat, &store, &lock, job_config("Cat")))
        .unwrap();
    let result = scheduler.register(make_job(&cat, &store, &lock, job_config("Cat")));

    assert!(matches!(result, Err(AppError::ConfigError(_))));
}

#[test]
fn test_invalid_cron_or_timezone_is_config_error() {
    let store = MockBreedStore::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    let service = BreedSyncService::new(MockSpeciesStore::seeded(), store);

    let bad_cron = SyncJob::new(
        cat.clone(),
        service.clone(),
        MemoryJobLock::new(),
        SyncJobConfig {
            cron: "every day".to_string(),
            ..job_config("Cat")
        },
    );
    let bad_tz = SyncJob::new(
        cat,
        service,
        MemoryJobLock::new(),
        SyncJobConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..job_config("Cat")
        },
    );

    assert!(matches!(bad_cron, Err(AppError::ConfigError(_))));
    assert!(matches!(bad_tz, Err(AppError::ConfigError(_))));
}

#[test]
fn test_from_settings_builds_enabled_vendors() {
    let mut settings = SyncSettings::builtin();
    settings.vendors[1].enabled = false;
    settings.vendors[0].timezone = "Europe/Madrid".to_string();

    let service = BreedSyncService::new(MockSpeciesStore::seeded(), MockBreedStore::new());
    let scheduler = TestScheduler::from_settings(
        &settings,
        service,
        MemoryJobLock::new(),
        "test-instance",
        Arc::new(SilentReporter),
        |entry, _http| Ok(MockBreedSource::new(&entry.name, Vec::new())),
    )
    .unwrap();

    assert_eq!(scheduler.jobs().len(), 1);
    let job = scheduler.job("cat").unwrap();
    assert_eq!(job.name(), "breed_sync_cat");
    assert_eq!(job.species(), "Cat");
    assert_eq!(job.timezone().name(), "Europe/Madrid");
    assert!(scheduler.job("dog").is_none());
}

#[tokio::test]
async fn test_snapshot_reports_state_and_next_fire() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let dog = MockBreedSource::new("dog", dog_records());
    let scheduler = two_vendor_scheduler(&cat, &dog, &store, &lock);

    scheduler.trigger("cat").await.unwrap();
    let snapshot = scheduler.snapshot();

    assert_eq!(snapshot.len(), 2);
    let cat_snap = snapshot.iter().find(|s| s.vendor == "cat").unwrap();
    assert_eq!(cat_snap.state, JobState::Idle);
    assert!(cat_snap.last_run.is_some());
    assert!(cat_snap.next_fire.unwrap() > Utc::now());
    assert_eq!(cat_snap.circuit.state, CircuitState::Closed);

    let dog_snap = snapshot.iter().find(|s| s.vendor == "dog").unwrap();
    assert!(dog_snap.last_run.is_none());
}

#[tokio::test]
async fn test_cron_task_fires_and_stops_on_shutdown() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let config = SyncJobConfig {
        cron: "* * * * * *".to_string(),
        ..job_config("Cat")
    };
    let mut scheduler = TestScheduler::new();
    scheduler
        .register(make_job(&cat, &store, &lock, config))
        .unwrap();

    assert_eq!(scheduler.start(), 1);
    assert_eq!(scheduler.start(), 0, "second start is a no-op");
    tokio::time::sleep(Duration::from_millis(2500)).await;
    scheduler.shutdown().await;

    let calls_at_shutdown = cat.calls();
    assert!(calls_at_shutdown >= 1);
    let last = scheduler.jobs()[0].last_run().unwrap();
    assert_eq!(last.trigger, Trigger::Scheduled);
    assert_eq!(store.count(1), 3);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(cat.calls(), calls_at_shutdown, "no runs after shutdown");
}

#[tokio::test]
async fn test_launch_finishes_startup_before_first_tick() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", Vec::new());
    cat.set_behavior(SourceBehavior::Slow(Duration::from_millis(1500)));
    let reporter = RecordingReporter::new();
    let config = SyncJobConfig {
        cron: "* * * * * *".to_string(),
        ..job_config("Cat")
    };
    let mut scheduler = TestScheduler::new();
    scheduler
        .register(make_job(&cat, &store, &lock, config).with_reporter(Arc::new(reporter.clone())))
        .unwrap();

    let reports = scheduler.launch(true).await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].trigger, Trigger::Startup);
    assert!(reports[0].is_success());
    assert_eq!(cat.calls(), 1, "no tick ran during the startup run");
    assert_eq!(reporter.count("lock_contended"), 0);

    scheduler.shutdown().await;
    assert_eq!(reporter.count("lock_contended"), 0);
}

#[tokio::test]
async fn test_launch_without_eager_run_only_starts_cron() {
    let store = MockBreedStore::new();
    let lock = MemoryJobLock::new();
    let cat = MockBreedSource::new("cat", cat_records());
    let mut scheduler = TestScheduler::new();
    scheduler
        .register(make_job(&cat, &store, &lock, job_config("Cat")))
        .unwrap();

    let reports = scheduler.launch(false).await;

    assert!(reports.is_empty());
    assert_eq!(cat.calls(), 0);
    assert_eq!(scheduler.start(), 0, "cron tasks already running");
    scheduler.shutdown().await;
}
