//! Unit tests for the store snapshot and its persistence seam

use mock_relay::{
    ExtensionStorage, InMemoryStorage, MockPath, MockStore, MockStoreProvider, StorageError,
    StorageStoreProvider,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wire_types::{MockDefinition, STORE_KEY};

#[test]
fn test_empty_database_object_is_an_empty_store() {
    let store = MockStore::from_json("{}").expect("An empty db object must parse");
    assert!(store.mocks().is_empty());
    assert!(store.mock_paths("https://a/b", "GET").is_empty());
}

#[test]
fn test_malformed_database_is_a_malformed_error() {
    assert!(matches!(
        MockStore::from_json("not json"),
        Err(StorageError::Malformed(_))
    ));
}

#[test]
fn test_resolve_rejects_out_of_range_paths() {
    let store = MockStore::from_mocks(vec![MockDefinition::new("GET", "https://a/b", 200)]);
    assert!(store.resolve(MockPath(0)).is_some());
    assert!(store.resolve(MockPath(1)).is_none());
}

#[test]
fn test_dynamic_method_comparison_ignores_case() {
    let store = MockStore::from_mocks(vec![
        MockDefinition::new("get", "https://a/goals/:id", 200).dynamic(),
    ]);
    assert_eq!(
        store.mock_paths("https://a/goals/7", "get"),
        vec![MockPath(0)]
    );
}

#[tokio::test]
async fn test_persisted_store_round_trips_in_order() {
    let storage = Arc::new(InMemoryStorage::new());
    let provider = StorageStoreProvider::new(storage.clone());

    provider
        .persist(&[
            MockDefinition::new("GET", "https://a/goals", 200),
            MockDefinition::new("GET", "https://a/goals", 201),
        ])
        .await
        .expect("Failed to persist");
    // The database lands under the well-known key.
    assert!(storage.get(STORE_KEY).await.unwrap().is_some());

    let store = provider.fetch().await.expect("Failed to fetch");
    assert_eq!(
        store.mock_paths("https://a/goals", "GET"),
        vec![MockPath(0), MockPath(1)]
    );
}
