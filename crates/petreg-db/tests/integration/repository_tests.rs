//! Integration tests for SpeciesRepository and BreedRepository.

use petreg_core::AppError;
use petreg_core::traits::{BreedStore, SpeciesStore};
use petreg_db::{BreedRepository, SpeciesRepository, run_migrations};

use crate::integration::common::{new_breed, setup_test_db};

#[tokio::test]
async fn test_migrations_seed_species_and_are_idempotent() {
    let (pool, _container) = setup_test_db().await;

    // Second run must not fail or duplicate the seed.
    run_migrations(&pool).await.expect("rerun should succeed");

    let species = SpeciesRepository::new(pool).list_all().await.unwrap();
    let names: Vec<&str> = species.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Cat", "Dog"]);
}

#[tokio::test]
async fn test_find_species_by_name() {
    let (pool, _container) = setup_test_db().await;
    let repo = SpeciesRepository::new(pool);

    let dog = repo.find_by_name("Dog").await.expect("Dog is seeded");
    assert_eq!(dog.name, "Dog");

    let by_id = repo.find_by_id(dog.id).await.unwrap();
    assert_eq!(by_id, Some(dog));
}

#[tokio::test]
async fn test_find_missing_species_is_not_found() {
    let (pool, _container) = setup_test_db().await;
    let repo = SpeciesRepository::new(pool);

    let result = repo.find_by_name("Axolotl").await;

    assert!(matches!(result, Err(AppError::SpeciesNotFound(ref n)) if n == "Axolotl"));
    assert_eq!(repo.find_by_id(9_999).await.unwrap(), None);
}

#[tokio::test]
async fn test_bulk_insert_persists_batch() {
    let (pool, _container) = setup_test_db().await;
    let cat = SpeciesRepository::new(pool.clone())
        .find_by_name("Cat")
        .await
        .unwrap();
    let repo = BreedRepository::new(pool);

    let result = repo
        .bulk_insert(&[
            new_breed(cat.id, "Abyssinian", "abys"),
            new_breed(cat.id, "Aegean", "aege"),
        ])
        .await
        .expect("bulk insert should succeed");

    assert_eq!(result.inserted.len(), 2);
    assert!(result.skipped.is_empty());
    assert!(result.inserted.iter().all(|b| b.id > 0 && b.species_id == cat.id));

    let stored = repo.find_by_species(cat.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].external_api_id.as_deref(), Some("abys"));
}

#[tokio::test]
async fn test_bulk_insert_empty_batch_is_noop() {
    let (pool, _container) = setup_test_db().await;
    let repo = BreedRepository::new(pool);

    let result = repo.bulk_insert(&[]).await.unwrap();

    assert!(result.inserted.is_empty());
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_bulk_insert_skips_conflicting_rows() {
    let (pool, _container) = setup_test_db().await;
    let cat = SpeciesRepository::new(pool.clone())
        .find_by_name("Cat")
        .await
        .unwrap();
    let repo = BreedRepository::new(pool);
    repo.bulk_insert(&[
        new_breed(cat.id, "Abyssinian", "abys"),
        new_breed(cat.id, "Bengal", "legacy-beng"),
    ])
    .await
    .unwrap();

    let result = repo
        .bulk_insert(&[
            // Same external id as a stored row.
            new_breed(cat.id, "Abyssinian Cat", "abys"),
            // Same name as a stored row, different external id.
            new_breed(cat.id, "Bengal", "beng"),
            new_breed(cat.id, "Birman", "birm"),
        ])
        .await
        .expect("conflicts must not fail the batch");

    assert_eq!(result.inserted.len(), 1);
    assert_eq!(result.inserted[0].name, "Birman");
    assert_eq!(result.skipped.len(), 2);
    assert_eq!(repo.find_by_species(cat.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_same_name_allowed_across_species() {
    let (pool, _container) = setup_test_db().await;
    let species = SpeciesRepository::new(pool.clone());
    let cat = species.find_by_name("Cat").await.unwrap();
    let dog = species.find_by_name("Dog").await.unwrap();
    let repo = BreedRepository::new(pool);

    let result = repo
        .bulk_insert(&[
            new_breed(cat.id, "Highlander", "hcat"),
            new_breed(dog.id, "Highlander", "1"),
        ])
        .await
        .unwrap();

    assert_eq!(result.inserted.len(), 2);
    assert!(repo.find_by_name(cat.id, "Highlander").await.unwrap().is_some());
    assert!(repo.find_by_name(dog.id, "Highlander").await.unwrap().is_some());
}

#[tokio::test]
async fn test_list_and_count_by_species() {
    let (pool, _container) = setup_test_db().await;
    let species = SpeciesRepository::new(pool.clone());
    let dog = species.find_by_name("Dog").await.unwrap();
    let repo = BreedRepository::new(pool);
    let inserted = repo
        .bulk_insert(&[
            new_breed(dog.id, "Affenpinscher", "1"),
            new_breed(dog.id, "Afghan Hound", "2"),
        ])
        .await
        .unwrap();

    let counts = repo.count_by_species().await.unwrap();
    let cat_count = counts.iter().find(|c| c.species_name == "Cat").unwrap();
    let dog_count = counts.iter().find(|c| c.species_name == "Dog").unwrap();
    assert_eq!(cat_count.breeds, 0);
    assert_eq!(dog_count.breeds, 2);

    assert_eq!(repo.list_all().await.unwrap().len(), 2);
    let first = repo.find_by_id(inserted.inserted[0].id).await.unwrap();
    assert_eq!(first, Some(inserted.inserted[0].clone()));
}
