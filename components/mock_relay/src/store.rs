// Mock store snapshot, lookup indexes, and the storage seam behind them

use crate::pattern::{segment_count, strip_query, PathPattern};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use wire_types::{host_active_key, MockDefinition, STORE_KEY};

/// Failures of the persistence layer behind the store
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage backend rejected the operation
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// The persisted store could not be parsed
    #[error("persisted store is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Location of one mock inside the store, rendered as a getter path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPath(pub usize);

impl fmt::Display for MockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mocks[{}]", self.0)
    }
}

/// Persisted shape of the store database
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDb {
    #[serde(default)]
    mocks: Vec<MockDefinition>,
}

struct DynamicEntry {
    method: String,
    pattern: PathPattern,
    path: MockPath,
}

/// Immutable snapshot of the mock store with its lookup indexes
///
/// Rebuilt wholesale whenever the backing store changes; lookups between
/// rebuilds share one snapshot with no locking.
pub struct MockStore {
    mocks: Vec<MockDefinition>,
    /// Exact-match index: query-stripped URL, then method, in store order
    url_index: HashMap<String, HashMap<String, Vec<MockPath>>>,
    /// Pattern mocks bucketed by segment count
    dynamic_index: HashMap<usize, Vec<DynamicEntry>>,
}

impl MockStore {
    /// A store with no mocks
    pub fn empty() -> Self {
        Self::from_mocks(Vec::new())
    }

    /// Build the snapshot and both indexes from a list of mocks
    pub fn from_mocks(mocks: Vec<MockDefinition>) -> Self {
        let mut url_index: HashMap<String, HashMap<String, Vec<MockPath>>> = HashMap::new();
        let mut dynamic_index: HashMap<usize, Vec<DynamicEntry>> = HashMap::new();

        for (index, mock) in mocks.iter().enumerate() {
            let path = MockPath(index);
            let method = mock.method.to_uppercase();
            if mock.dynamic {
                let pattern = PathPattern::compile(&mock.url);
                dynamic_index
                    .entry(pattern.segment_count())
                    .or_default()
                    .push(DynamicEntry {
                        method,
                        pattern,
                        path,
                    });
            } else {
                url_index
                    .entry(strip_query(&mock.url).to_string())
                    .or_default()
                    .entry(method)
                    .or_default()
                    .push(path);
            }
        }

        Self {
            mocks,
            url_index,
            dynamic_index,
        }
    }

    /// Parse the snapshot out of the persisted JSON database
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let db: StoreDb = serde_json::from_str(json)?;
        Ok(Self::from_mocks(db.mocks))
    }

    /// All mocks, in store order
    pub fn mocks(&self) -> &[MockDefinition] {
        &self.mocks
    }

    /// Resolve a getter path back to its mock
    pub fn resolve(&self, path: MockPath) -> Option<&MockDefinition> {
        self.mocks.get(path.0)
    }

    /// All candidate paths for (url, method), active or not
    ///
    /// Exact matches win outright and are returned in store order. The
    /// dynamic buckets are consulted only when the exact index has
    /// nothing for this URL and method, and yield at most the first
    /// pattern that matches; later patterns in the bucket are never
    /// candidates, even when the first one is inactive.
    pub fn mock_paths(&self, url: &str, method: &str) -> Vec<MockPath> {
        let method = method.to_uppercase();
        let exact: Vec<MockPath> = self
            .url_index
            .get(strip_query(url))
            .and_then(|by_method| by_method.get(&method))
            .map(|paths| paths.clone())
            .unwrap_or_default();
        if !exact.is_empty() {
            return exact;
        }

        self.dynamic_index
            .get(&segment_count(url))
            .and_then(|bucket| {
                bucket
                    .iter()
                    .find(|entry| entry.method == method && entry.pattern.matches(url))
                    .map(|entry| vec![entry.path])
            })
            .unwrap_or_default()
    }

    /// First active candidate for (url, method), with its path
    ///
    /// Exact and dynamic candidates go through this one active filter;
    /// inactive candidates are skipped entirely, not merely deprioritized.
    /// No match is a pass-through, never an error.
    pub fn active_mock_with_path(
        &self,
        url: &str,
        method: &str,
    ) -> Option<(MockPath, &MockDefinition)> {
        self.mock_paths(url, method)
            .into_iter()
            .filter_map(|path| self.resolve(path).map(|mock| (path, mock)))
            .find(|(_, mock)| mock.active)
    }
}

/// Key/value persistence as the extension sees it
#[async_trait]
pub trait ExtensionStorage: Send + Sync {
    /// Read one key
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write one key
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process storage, the default for tests and headless use
#[derive(Default)]
pub struct InMemoryStorage {
    entries: DashMap<String, String>,
}

impl InMemoryStorage {
    /// An empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtensionStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Source of store snapshots for the relay
#[async_trait]
pub trait MockStoreProvider: Send + Sync {
    /// Fetch a fresh snapshot; called at boot and on every store-change
    /// notification
    async fn fetch(&self) -> Result<MockStore, StorageError>;
}

/// Provider reading the persisted database out of extension storage
pub struct StorageStoreProvider {
    storage: Arc<dyn ExtensionStorage>,
}

impl StorageStoreProvider {
    /// Wrap a storage backend
    pub fn new(storage: Arc<dyn ExtensionStorage>) -> Self {
        Self { storage }
    }

    /// Whether interception is switched on for a host
    ///
    /// Localhost counts as active until a flag is persisted; every other
    /// host must be switched on explicitly.
    pub async fn host_active(&self, host: &str) -> Result<bool, StorageError> {
        match self.storage.get(&host_active_key(host)).await? {
            Some(flag) => Ok(flag == "true"),
            None => Ok(host.starts_with("localhost")),
        }
    }

    /// Persist the activation flag for a host
    pub async fn set_host_active(&self, host: &str, active: bool) -> Result<(), StorageError> {
        self.storage
            .set(&host_active_key(host), if active { "true" } else { "false" })
            .await
    }

    /// Persist a list of mocks as the store database
    pub async fn persist(&self, mocks: &[MockDefinition]) -> Result<(), StorageError> {
        let db = StoreDb {
            mocks: mocks.to_vec(),
        };
        self.storage.set(STORE_KEY, &serde_json::to_string(&db)?).await
    }
}

#[async_trait]
impl MockStoreProvider for StorageStoreProvider {
    async fn fetch(&self) -> Result<MockStore, StorageError> {
        match self.storage.get(STORE_KEY).await? {
            Some(json) => {
                let store = MockStore::from_json(&json)?;
                debug!(mocks = store.mocks().len(), "mock store loaded");
                Ok(store)
            }
            None => Ok(MockStore::empty()),
        }
    }
}
