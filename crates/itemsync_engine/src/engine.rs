//! The item sync engine.

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::gate::SyncGate;
use crate::identity::{Identity, IdentityProvider};
use crate::notifier::{ChangeNotifier, EngineEvent, EventReceiver};
use crate::reconcile::{Reconciler, Reconciliation};
use crate::store::{Dataset, RemoteDatasetStore};
use itemsync_core::{compute_delta, decode_records, encode_count, Delta, ItemMap};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync cycles that ended with the gate released.
    pub cycles_completed: u64,
    /// Pending writes flushed to the store.
    pub flushes: u64,
    /// Failed sync cycles.
    pub failures: u64,
    /// Time the last cycle completed.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Keeps a local item snapshot reconciled with a remote dataset.
///
/// The engine resolves an identity, opens its dataset, and then syncs
/// periodically. Callers write through [`set_items`](Self::set_items) and
/// observe results through [`subscribe`](Self::subscribe).
///
/// Methods that start work spawn Tokio tasks and must be called from within
/// a Tokio runtime. Dropping the engine disposes it.
pub struct ItemSyncEngine<S: RemoteDatasetStore, P: IdentityProvider> {
    inner: Arc<Inner<S, P>>,
}

struct Inner<S: RemoteDatasetStore, P: IdentityProvider> {
    config: EngineConfig,
    store: S,
    identity_provider: P,
    dataset: RwLock<Option<Arc<S::Dataset>>>,
    state: Mutex<EngineState>,
    notifier: ChangeNotifier,
    stats: RwLock<SyncStats>,
}

#[derive(Default)]
struct EngineState {
    gate: SyncGate,
    reconciler: Reconciler,
    identity: Option<Identity>,
    init_task: Option<JoinHandle<()>>,
    sync_task: Option<JoinHandle<()>>,
    cooldown_task: Option<JoinHandle<()>>,
}

impl<S: RemoteDatasetStore, P: IdentityProvider> ItemSyncEngine<S, P> {
    /// Creates an engine. Nothing runs until [`initialize`](Self::initialize).
    pub fn new(config: EngineConfig, store: S, identity_provider: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                identity_provider,
                dataset: RwLock::new(None),
                state: Mutex::new(EngineState::default()),
                notifier: ChangeNotifier::new(),
                stats: RwLock::new(SyncStats::default()),
            }),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Starts initialization for the given identity pool.
    ///
    /// Completion is reported through [`EngineEvent::Initialized`] or
    /// [`EngineEvent::InitializationFailed`]. Calling this while
    /// initializing or after initialization is a logged no-op.
    pub fn initialize(&self, pool_id: impl Into<String>) {
        self.inner.initialize(pool_id.into());
    }

    /// Requests a sync now.
    ///
    /// Ignored if a sync is already in flight.
    pub fn sync(&self) -> SyncResult<()> {
        self.inner.ensure_initialized()?;
        self.inner.request_sync();
        Ok(())
    }

    /// Returns a fresh copy of the dataset's items.
    pub fn get_items(&self) -> SyncResult<ItemMap> {
        let dataset = self.inner.open_dataset()?;
        Ok(decode_records(&dataset.records()?)?)
    }

    /// Returns true if the dataset holds at least one record.
    pub fn has_items(&self) -> SyncResult<bool> {
        let dataset = self.inner.open_dataset()?;
        Ok(!dataset.records()?.is_empty())
    }

    /// Returns true if the dataset holds no records.
    pub fn is_empty(&self) -> SyncResult<bool> {
        self.has_items().map(|has| !has)
    }

    /// Submits a write of `items`.
    ///
    /// The write replaces any earlier write that has not been flushed yet.
    /// With `sync_now` a sync is requested immediately; otherwise the write
    /// goes out with the next periodic sync.
    pub fn set_items(&self, items: ItemMap, sync_now: bool) -> SyncResult<()> {
        {
            let mut state = self.inner.state.lock();
            if state.gate.is_disposed() {
                return Err(SyncError::Disposed);
            }
            if !state.gate.is_initialized() {
                warn!("set_items called before initialization");
                return Err(SyncError::NotInitialized);
            }
            debug!(keys = items.len(), sync_now, "set_items");
            if state.reconciler.set_pending(items).is_some() {
                debug!("replaced a pending write that was not yet flushed");
            }
        }

        if sync_now {
            self.inner.request_sync();
        }
        Ok(())
    }

    /// Computes the per-key change from `from` to `to`.
    pub fn calculate_items_deltas(from: &ItemMap, to: &ItemMap) -> Delta {
        compute_delta(from, to)
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.notifier.subscribe()
    }

    /// Returns a copy of the gate flags.
    pub fn gate_state(&self) -> SyncGate {
        self.inner.state.lock().gate
    }

    /// Returns true once the first sync succeeded.
    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().gate.is_initialized()
    }

    /// Returns the write waiting to be flushed.
    pub fn pending_items(&self) -> Option<ItemMap> {
        self.inner.state.lock().reconciler.pending().cloned()
    }

    /// Returns the last reconciled snapshot.
    pub fn local_items(&self) -> Option<ItemMap> {
        self.inner.state.lock().reconciler.local().cloned()
    }

    /// Returns the resolved identity.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.lock().identity.clone()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Stops all engine activity.
    ///
    /// Pending tasks are aborted and later calls are refused. A pending
    /// write that was not flushed is discarded.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<S: RemoteDatasetStore, P: IdentityProvider> Drop for ItemSyncEngine<S, P> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<S: RemoteDatasetStore, P: IdentityProvider> Inner<S, P> {
    fn ensure_initialized(&self) -> SyncResult<()> {
        let state = self.state.lock();
        if state.gate.is_disposed() {
            return Err(SyncError::Disposed);
        }
        if !state.gate.is_initialized() {
            warn!("sync requested before initialization");
            return Err(SyncError::NotInitialized);
        }
        Ok(())
    }

    fn open_dataset(&self) -> SyncResult<Arc<S::Dataset>> {
        self.dataset.read().clone().ok_or(SyncError::NotInitialized)
    }

    fn initialize(self: &Arc<Self>, pool_id: String) {
        let mut state = self.state.lock();
        if let Err(refusal) = state.gate.begin_initialization() {
            warn!(%refusal, "initialize ignored");
            return;
        }

        info!(pool_id = %pool_id, "initializing");
        let inner = Arc::clone(self);
        state.init_task = Some(tokio::spawn(async move {
            let resolved = inner.identity_provider.get_identity(&pool_id).await;
            inner.on_identity(resolved.map_err(SyncError::from));
        }));
    }

    fn on_identity(self: &Arc<Self>, resolved: SyncResult<Identity>) {
        let opened = resolved.and_then(|identity| {
            let dataset = self
                .store
                .open_or_create(&self.config.dataset_name, &identity)?;
            Ok((identity, dataset))
        });

        let (identity, dataset) = match opened {
            Ok(opened) => opened,
            Err(err) => return self.fail_initialization(err),
        };

        info!(
            identity_id = %identity,
            dataset = dataset.name(),
            "identity received"
        );
        {
            let mut state = self.state.lock();
            if state.gate.is_disposed() {
                return;
            }
            state.identity = Some(identity);
        }
        *self.dataset.write() = Some(dataset);

        self.request_sync();
    }

    fn fail_initialization(&self, err: SyncError) {
        {
            let mut state = self.state.lock();
            if state.gate.is_disposed() {
                return;
            }
            state.gate.abort_initialization();
        }
        error!(error = %err, "initialization failed");
        self.notifier.emit(EngineEvent::InitializationFailed(err));
    }

    fn request_sync(self: &Arc<Self>) {
        let Some(dataset) = self.dataset.read().clone() else {
            debug!("no dataset open, sync skipped");
            return;
        };

        let mut state = self.state.lock();
        if let Err(refusal) = state.gate.try_begin_sync() {
            debug!(%refusal, "sync request ignored");
            return;
        }
        debug!(dataset = dataset.name(), "synchronizing");
        state.sync_task = Some(self.spawn_synchronize(dataset));
    }

    /// Starts a synchronize call. The caller must hold the sync slot.
    fn spawn_synchronize(self: &Arc<Self>, dataset: Arc<S::Dataset>) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match dataset.synchronize().await {
                Ok(()) => inner.on_sync_success(&dataset),
                Err(err) => inner.on_sync_failure(SyncError::from(err)),
            }
        })
    }

    fn on_sync_success(self: &Arc<Self>, dataset: &Arc<S::Dataset>) {
        debug!(dataset = dataset.name(), "sync succeeded");

        let remote = match dataset
            .records()
            .map_err(SyncError::from)
            .and_then(|records| decode_records(&records).map_err(SyncError::from))
        {
            Ok(remote) => remote,
            Err(err) => return self.on_sync_failure(err),
        };

        let mut state = self.state.lock();
        if state.gate.is_disposed() {
            return;
        }

        let Reconciliation { changes, flush } = state.reconciler.reconcile(remote);

        if let Some(merged) = flush {
            debug!(keys = merged.len(), "flushing pending items");
            let mut written = ItemMap::new();
            let mut failure = None;
            for (key, count) in &merged {
                if let Err(err) = dataset.put(key, &encode_count(*count)) {
                    failure = Some(err);
                    break;
                }
                written.insert(key.clone(), *count);
            }

            if let Some(err) = failure {
                state.reconciler.abort_flush(merged, written);
                drop(state);
                self.emit_changes(changes);
                return self.on_sync_failure(SyncError::from(err));
            }

            state.reconciler.commit_flush(merged);
            state.sync_task = Some(self.spawn_synchronize(Arc::clone(dataset)));
            drop(state);

            self.stats.write().flushes += 1;
            self.emit_changes(changes);
            return;
        }

        state.gate.finish_sync();
        let first = state.gate.complete_initialization();
        drop(state);

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.last_sync_time = Some(Instant::now());
            stats.last_error = None;
        }

        self.emit_changes(changes);
        if first {
            info!("initialized");
            self.notifier.emit(EngineEvent::Initialized);
        }
        self.notifier.emit(EngineEvent::Synchronized);

        self.schedule_next();
    }

    fn on_sync_failure(self: &Arc<Self>, err: SyncError) {
        {
            let mut state = self.state.lock();
            if state.gate.is_disposed() {
                return;
            }
            state.gate.finish_sync();
        }

        error!(error = %err, "sync failed");
        {
            let mut stats = self.stats.write();
            stats.failures += 1;
            stats.last_error = Some(err.to_string());
        }
        self.notifier.emit(EngineEvent::SynchronizationFailed(err));

        self.schedule_next();
    }

    fn emit_changes(&self, changes: Option<Delta>) {
        match changes {
            Some(delta) => {
                debug!(keys = delta.len(), "dispatching deltas");
                self.notifier.items_changed(delta);
            }
            None => debug!("no changes"),
        }
    }

    fn schedule_next(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if let Err(refusal) = state.gate.try_begin_cooldown() {
            debug!(%refusal, "next sync already scheduled");
            return;
        }

        let deadline = tokio::time::Instant::now() + self.config.cooldown;
        let inner = Arc::clone(self);
        state.cooldown_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.state.lock().gate.end_cooldown();
            inner.request_sync();
        }));
    }

    fn dispose(&self) {
        let tasks = {
            let mut state = self.state.lock();
            if state.gate.is_disposed() {
                return;
            }
            state.gate.dispose();
            [
                state.init_task.take(),
                state.sync_task.take(),
                state.cooldown_task.take(),
            ]
        };

        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        info!("disposed");
    }
}
