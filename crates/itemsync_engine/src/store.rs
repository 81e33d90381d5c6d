//! Remote dataset store abstraction.

use crate::error::{StoreError, StoreResult};
use crate::identity::Identity;
use async_trait::async_trait;
use itemsync_core::{encode_count, Records};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A named key-value dataset backed by a remote store.
///
/// `put` and `records` act on the dataset's local cache; `synchronize`
/// exchanges that cache with the remote side.
#[async_trait]
pub trait Dataset: Send + Sync + 'static {
    /// Returns the dataset name.
    fn name(&self) -> &str;

    /// Returns a copy of all records.
    fn records(&self) -> StoreResult<Records>;

    /// Writes a single record.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Synchronizes the dataset with the remote store.
    ///
    /// Resolves exactly once, with `Ok` on success or the store failure.
    async fn synchronize(&self) -> StoreResult<()>;
}

/// A store that hands out datasets for a resolved identity.
pub trait RemoteDatasetStore: Send + Sync + 'static {
    /// The dataset type produced by this store.
    type Dataset: Dataset;

    /// Opens the named dataset, creating it if needed.
    ///
    /// Opening the same name twice returns the same dataset.
    fn open_or_create(&self, name: &str, identity: &Identity) -> StoreResult<Arc<Self::Dataset>>;
}

/// An in-memory store for testing and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<String, Arc<MemoryDataset>>>,
    open_failure: Mutex<Option<StoreError>>,
    opened_by: RwLock<Vec<Identity>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named dataset, creating it if needed.
    ///
    /// Lets tests seed or script a dataset before the engine opens it.
    pub fn dataset(&self, name: &str) -> Arc<MemoryDataset> {
        Arc::clone(
            self.datasets
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryDataset::new(name))),
        )
    }

    /// Makes the next `open_or_create` call fail.
    pub fn fail_next_open(&self, error: StoreError) {
        *self.open_failure.lock() = Some(error);
    }

    /// Returns the identities that opened a dataset, in order.
    pub fn opened_by(&self) -> Vec<Identity> {
        self.opened_by.read().clone()
    }
}

impl RemoteDatasetStore for MemoryStore {
    type Dataset = MemoryDataset;

    fn open_or_create(&self, name: &str, identity: &Identity) -> StoreResult<Arc<MemoryDataset>> {
        if let Some(error) = self.open_failure.lock().take() {
            return Err(error);
        }
        self.opened_by.write().push(identity.clone());
        Ok(self.dataset(name))
    }
}

/// An in-memory dataset with scriptable behavior.
///
/// Synchronize calls succeed immediately unless a failure was queued with
/// [`fail_next_sync`](Self::fail_next_sync) or syncs are held with
/// [`hold_syncs`](Self::hold_syncs), in which case each call waits for a
/// matching [`release_sync`](Self::release_sync).
#[derive(Debug)]
pub struct MemoryDataset {
    name: String,
    records: RwLock<Records>,
    puts: Mutex<Vec<(String, String)>>,
    put_failure: Mutex<Option<StoreError>>,
    sync_failures: Mutex<VecDeque<StoreError>>,
    held: AtomicBool,
    releases: Semaphore,
    sync_calls: AtomicU64,
}

impl MemoryDataset {
    /// Creates an empty dataset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(Records::new()),
            puts: Mutex::new(Vec::new()),
            put_failure: Mutex::new(None),
            sync_failures: Mutex::new(VecDeque::new()),
            held: AtomicBool::new(false),
            releases: Semaphore::new(0),
            sync_calls: AtomicU64::new(0),
        }
    }

    /// Sets a record as if another device had written it remotely.
    ///
    /// Not recorded in the put log.
    pub fn set_remote_record(&self, key: &str, value: &str) {
        self.records
            .write()
            .insert(key.to_string(), value.to_string());
    }

    /// Sets a count as if another device had written it remotely.
    pub fn set_remote_count(&self, key: &str, count: i64) {
        self.set_remote_record(key, &encode_count(count));
    }

    /// Returns every `put` made through the [`Dataset`] trait, in order.
    pub fn put_log(&self) -> Vec<(String, String)> {
        self.puts.lock().clone()
    }

    /// Makes the next `put` call fail.
    pub fn fail_next_put(&self, error: StoreError) {
        *self.put_failure.lock() = Some(error);
    }

    /// Queues a failure for a future synchronize call.
    pub fn fail_next_sync(&self, error: StoreError) {
        self.sync_failures.lock().push_back(error);
    }

    /// Makes synchronize calls wait for [`release_sync`](Self::release_sync).
    pub fn hold_syncs(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Lets one held synchronize call complete.
    pub fn release_sync(&self) {
        self.releases.add_permits(1);
    }

    /// Returns the number of synchronize calls started so far.
    pub fn sync_calls(&self) -> u64 {
        self.sync_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn records(&self) -> StoreResult<Records> {
        Ok(self.records.read().clone())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        if let Some(error) = self.put_failure.lock().take() {
            return Err(error);
        }
        self.records
            .write()
            .insert(key.to_string(), value.to_string());
        self.puts.lock().push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn synchronize(&self) -> StoreResult<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);

        if self.held.load(Ordering::SeqCst) {
            self.releases
                .acquire()
                .await
                .map_err(|_| StoreError::unavailable("dataset closed"))?
                .forget();
        }

        match self.sync_failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
