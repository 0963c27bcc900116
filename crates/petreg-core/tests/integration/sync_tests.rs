//! Integration tests for BreedSyncService.

use std::time::Duration;

use petreg_core::breed_sync::{BreedSyncService, FetchGuard, FetchSource};
use petreg_core::{
    AppError, CircuitBreaker, CircuitBreakerConfig, CircuitState, ExternalBreedRecord,
    FallbackReason, SilentReporter,
};

use crate::integration::common::{
    MockBreedSource, MockBreedStore, MockSpeciesStore, RecordingReporter, SourceBehavior,
    cat_records, dog_records,
};

const CAT: i64 = 1;
const DOG: i64 = 2;

fn guard(name: &str) -> FetchGuard {
    FetchGuard::with_default(CircuitBreaker::new(name, CircuitBreakerConfig::default()))
}

fn service(store: &MockBreedStore) -> BreedSyncService<MockSpeciesStore, MockBreedStore> {
    BreedSyncService::new(MockSpeciesStore::seeded(), store.clone())
}

#[tokio::test]
async fn test_first_sync_inserts_all_breeds() {
    let store = MockBreedStore::new();
    let source = MockBreedSource::new("cat", cat_records());

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &SilentReporter)
        .await
        .unwrap();

    assert_eq!(report.vendor, "cat");
    assert_eq!(report.species.id, CAT);
    assert_eq!(report.fetch, FetchSource::Live);
    assert_eq!(report.stats.fetched, 3);
    assert_eq!(report.stats.inserted, 3);
    assert_eq!(report.inserted.len(), 3);
    assert_eq!(store.count(CAT), 3);
    assert!(
        report
            .inserted
            .iter()
            .all(|b| b.external_api_id.is_some() && b.species_id == CAT)
    );
}

#[tokio::test]
async fn test_second_sync_is_idempotent() {
    let store = MockBreedStore::new();
    let source = MockBreedSource::new("dog", dog_records());
    let svc = service(&store);
    let guard = guard("dog");

    svc.sync_vendor(&source, &guard, "Dog", &SilentReporter)
        .await
        .unwrap();
    let reporter = RecordingReporter::new();
    let second = svc
        .sync_vendor(&source, &guard, "Dog", &reporter)
        .await
        .unwrap();

    assert_eq!(second.stats.inserted, 0);
    assert_eq!(second.stats.already_present, 2);
    assert_eq!(store.count(DOG), 2);
    assert_eq!(store.insert_calls(), 1, "nothing new means no insert call");
    assert_eq!(reporter.count("nothing_new"), 1);
}

#[tokio::test]
async fn test_numeric_vendor_id_matches_stored_string() {
    let store = MockBreedStore::new();
    store.seed(DOG, "Affenpinscher", Some("1"));
    let source = MockBreedSource::new("dog", vec![ExternalBreedRecord::new(1, "Affenpinscher")]);

    let report = service(&store)
        .sync_vendor(&source, &guard("dog"), "Dog", &SilentReporter)
        .await
        .unwrap();

    assert_eq!(report.stats.inserted, 0);
    assert_eq!(report.stats.already_present, 1);
    assert_eq!(store.count(DOG), 1);
}

#[tokio::test]
async fn test_empty_fetch_completes_without_fallback() {
    let store = MockBreedStore::new();
    store.seed(CAT, "Abyssinian", Some("abys"));
    let source = MockBreedSource::new("cat", Vec::new());
    let reporter = RecordingReporter::new();

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &reporter)
        .await
        .unwrap();

    assert_eq!(report.fetch, FetchSource::Live);
    assert_eq!(report.stats.fetched, 0);
    assert_eq!(report.stats.inserted, 0);
    assert_eq!(store.count(CAT), 1);
    assert_eq!(reporter.count("fetch_empty"), 1);
    assert_eq!(reporter.count("fetch_fell_back"), 0);
}

#[tokio::test]
async fn test_vendor_failure_falls_back_to_empty_list() {
    let store = MockBreedStore::new();
    store.seed(CAT, "Abyssinian", Some("abys"));
    let source = MockBreedSource::failing("cat");
    let reporter = RecordingReporter::new();

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &reporter)
        .await
        .unwrap();

    assert!(matches!(
        report.fetch,
        FetchSource::Fallback(FallbackReason::Failed { ref error }) if error.contains("connection refused")
    ));
    assert_eq!(report.stats.inserted, 0);
    assert_eq!(store.count(CAT), 1, "stored breeds are untouched");
    assert_eq!(reporter.count("fetch_fell_back"), 1);
    assert_eq!(reporter.count("fetch_empty"), 0);
}

#[tokio::test]
async fn test_open_circuit_skips_vendor_call() {
    let store = MockBreedStore::new();
    let source = MockBreedSource::new("dog", dog_records());
    source.set_behavior(SourceBehavior::ServerError(503));
    let guard = FetchGuard::with_default(CircuitBreaker::new(
        "dog",
        CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            ..Default::default()
        },
    ));
    let svc = service(&store);

    for _ in 0..2 {
        svc.sync_vendor(&source, &guard, "Dog", &SilentReporter)
            .await
            .unwrap();
    }
    assert_eq!(guard.breaker().state(), CircuitState::Open);

    source.set_behavior(SourceBehavior::Records(dog_records()));
    let report = svc
        .sync_vendor(&source, &guard, "Dog", &SilentReporter)
        .await
        .unwrap();

    assert_eq!(source.calls(), 2, "open circuit must not call the vendor");
    assert!(matches!(
        report.fetch,
        FetchSource::Fallback(FallbackReason::CircuitOpen { .. })
    ));
    assert_eq!(store.count(DOG), 0);
}

#[tokio::test]
async fn test_missing_species_aborts_before_fetch() {
    let store = MockBreedStore::new();
    let source = MockBreedSource::new("cat", cat_records());
    let svc = BreedSyncService::new(MockSpeciesStore::with(Vec::new()), store.clone());

    let result = svc
        .sync_vendor(&source, &guard("cat"), "Cat", &SilentReporter)
        .await;

    assert!(matches!(result, Err(AppError::SpeciesNotFound(ref name)) if name == "Cat"));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_name_conflict_skips_row_without_failing_batch() {
    let store = MockBreedStore::new();
    // Same name already stored under a different external id.
    store.seed(CAT, "Bengal", Some("legacy-bengal"));
    let source = MockBreedSource::new("cat", cat_records());
    let reporter = RecordingReporter::new();

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &reporter)
        .await
        .unwrap();

    assert_eq!(report.stats.inserted, 2);
    assert_eq!(report.stats.conflicted, 1);
    assert_eq!(report.stats.candidates(), 3);
    assert_eq!(store.count(CAT), 3);
    assert_eq!(reporter.count("insert_conflicts"), 1);
    assert_eq!(reporter.count("inserted"), 1);
}

#[tokio::test]
async fn test_same_name_in_other_species_is_allowed() {
    let store = MockBreedStore::new();
    store.seed(DOG, "Bengal", Some("99"));
    let source = MockBreedSource::new("cat", cat_records());

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &SilentReporter)
        .await
        .unwrap();

    assert_eq!(report.stats.inserted, 3);
    assert!(store.names(CAT).contains(&"Bengal".to_string()));
}

#[tokio::test]
async fn test_duplicate_ids_in_fetch_keep_first_and_warn() {
    let store = MockBreedStore::new();
    let source = MockBreedSource::new(
        "cat",
        vec![
            ExternalBreedRecord::new("abys", "Abyssinian"),
            ExternalBreedRecord::new("abys", "Abyssinian Copy"),
        ],
    );
    let reporter = RecordingReporter::new();

    let report = service(&store)
        .sync_vendor(&source, &guard("cat"), "Cat", &reporter)
        .await
        .unwrap();

    assert_eq!(report.stats.duplicates_in_fetch, 1);
    assert_eq!(store.names(CAT), vec!["Abyssinian".to_string()]);
    assert_eq!(reporter.count("duplicate_external_id"), 1);
}
