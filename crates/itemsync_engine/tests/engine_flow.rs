//! End-to-end sync cycles against the in-memory store.

use itemsync_engine::{
    EngineConfig, EngineEvent, EventReceiver, GatePhase, ItemMap, ItemSyncEngine, MemoryDataset,
    MemoryStore, StaticIdentityProvider, StoreError, SyncError,
};
use std::sync::Arc;
use std::time::Duration;

type Engine = ItemSyncEngine<MemoryStore, StaticIdentityProvider>;

const POOL: &str = "us-west-2:pool";

fn items(pairs: &[(&str, i64)]) -> ItemMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn puts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Builds an engine over a fresh store, returning the default dataset.
fn setup(cooldown: Duration) -> (Engine, Arc<MemoryDataset>) {
    let store = MemoryStore::new();
    let dataset = store.dataset("gameItems");
    let engine = ItemSyncEngine::new(
        EngineConfig::default().with_cooldown(cooldown),
        store,
        StaticIdentityProvider::new("identity-1"),
    );
    (engine, dataset)
}

/// Lets spawned tasks run without advancing time.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn next_event(events: &mut EventReceiver) -> EngineEvent {
    events.recv().await.expect("event stream closed")
}

async fn initialize(engine: &Engine, events: &mut EventReceiver) {
    engine.initialize(POOL);
    assert_eq!(next_event(events).await, EngineEvent::Initialized);
    assert_eq!(next_event(events).await, EngineEvent::Synchronized);
}

#[tokio::test(start_paused = true)]
async fn first_sync_initializes() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.set_remote_count("sword", 1);
    let mut events = engine.subscribe();

    initialize(&engine, &mut events).await;

    assert!(engine.is_initialized());
    assert_eq!(engine.gate_state().phase(), GatePhase::Idle);
    assert!(engine.gate_state().is_waiting_for_sync());
    assert_eq!(engine.identity().unwrap().identity_id(), "identity-1");
    assert_eq!(engine.local_items(), Some(items(&[("sword", 1)])));
    assert_eq!(engine.get_items().unwrap(), items(&[("sword", 1)]));
    assert!(engine.has_items().unwrap());
    assert_eq!(dataset.sync_calls(), 1);
    assert_eq!(engine.stats().cycles_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn remote_change_is_notified_once() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.set_remote_count("x", 1);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    dataset.set_remote_count("y", 2);
    engine.sync().unwrap();

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::ItemsChanged(items(&[("y", 2)]))
    );
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    settle().await;
    assert!(events.try_recv().is_err());
    assert_eq!(engine.local_items(), Some(items(&[("x", 1), ("y", 2)])));
}

#[tokio::test(start_paused = true)]
async fn unchanged_remote_is_not_notified() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.set_remote_count("x", 1);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    engine.sync().unwrap();
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
}

#[tokio::test(start_paused = true)]
async fn set_items_before_first_sync_is_refused() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.hold_syncs();

    engine.initialize(POOL);
    settle().await;
    assert_eq!(engine.gate_state().phase(), GatePhase::Synchronizing);
    assert!(engine.gate_state().is_initializing());

    assert_eq!(
        engine.set_items(items(&[("x", 1)]), true),
        Err(SyncError::NotInitialized)
    );
    assert_eq!(engine.pending_items(), None);
    assert_eq!(dataset.sync_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn sync_request_during_sync_is_ignored() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    dataset.hold_syncs();
    engine.sync().unwrap();
    settle().await;
    assert_eq!(dataset.sync_calls(), 2);

    let gate = engine.gate_state();
    engine.sync().unwrap();
    engine.sync().unwrap();
    settle().await;
    assert_eq!(engine.gate_state(), gate);
    assert_eq!(dataset.sync_calls(), 2);

    dataset.release_sync();
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    settle().await;
    assert_eq!(dataset.sync_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn pending_write_during_sync_is_flushed() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.set_remote_count("x", 1);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    dataset.hold_syncs();
    engine.sync().unwrap();
    settle().await;
    assert_eq!(dataset.sync_calls(), 2);

    // Arrives while the sync is in flight: buffered, no second call.
    engine.set_items(items(&[("x", 4)]), true).unwrap();
    settle().await;
    assert_eq!(dataset.sync_calls(), 2);
    assert_eq!(engine.pending_items(), Some(items(&[("x", 4)])));

    // Another device adds an item meanwhile.
    dataset.set_remote_count("y", 2);
    dataset.release_sync();

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::ItemsChanged(items(&[("y", 2)]))
    );
    settle().await;

    assert_eq!(dataset.put_log(), puts(&[("x", "4"), ("y", "2")]));
    assert_eq!(engine.pending_items(), None);
    assert_eq!(engine.local_items(), Some(items(&[("x", 4), ("y", 2)])));
    // Re-synchronized before any cooldown, gate still held.
    assert_eq!(dataset.sync_calls(), 3);
    assert!(engine.gate_state().is_synchronizing());
    assert!(events.try_recv().is_err());

    dataset.release_sync();
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    assert!(!engine.gate_state().is_synchronizing());
    assert_eq!(engine.stats().flushes, 1);
}

#[tokio::test(start_paused = true)]
async fn second_set_items_replaces_pending() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    engine.set_items(items(&[("x", 1)]), false).unwrap();
    engine.set_items(items(&[("y", 3)]), false).unwrap();
    assert_eq!(engine.pending_items(), Some(items(&[("y", 3)])));

    engine.sync().unwrap();
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    assert_eq!(dataset.put_log(), puts(&[("y", "3")]));
    assert_eq!(engine.get_items().unwrap(), items(&[("y", 3)]));
}

#[tokio::test(start_paused = true)]
async fn pending_write_goes_out_with_periodic_sync() {
    let cooldown = Duration::from_secs(5);
    let (engine, dataset) = setup(cooldown);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    engine.set_items(items(&[("gem", 7)]), false).unwrap();
    settle().await;
    assert!(dataset.put_log().is_empty());

    tokio::time::advance(cooldown).await;
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    assert_eq!(dataset.put_log(), puts(&[("gem", "7")]));
    assert_eq!(dataset.sync_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_sync_retries_after_cooldown() {
    let cooldown = Duration::from_secs(5);
    let (engine, dataset) = setup(cooldown);
    dataset.fail_next_sync(StoreError::unavailable("offline"));
    let mut events = engine.subscribe();

    engine.initialize(POOL);
    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::SynchronizationFailed(SyncError::Synchronization(StoreError::unavailable(
            "offline"
        )))
    );
    settle().await;

    let gate = engine.gate_state();
    assert!(!gate.is_synchronizing());
    assert!(gate.is_waiting_for_sync());
    assert!(gate.is_initializing());
    assert_eq!(dataset.sync_calls(), 1);
    assert_eq!(engine.stats().failures, 1);

    tokio::time::advance(cooldown - Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(dataset.sync_calls(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(dataset.sync_calls(), 2);

    assert_eq!(next_event(&mut events).await, EngineEvent::Initialized);
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    assert!(engine.is_initialized());
    assert_eq!(engine.stats().last_error, None);
}

#[tokio::test(start_paused = true)]
async fn failed_flush_keeps_pending() {
    let cooldown = Duration::from_secs(5);
    let (engine, dataset) = setup(cooldown);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    dataset.fail_next_put(StoreError::unavailable("cache locked"));
    engine.set_items(items(&[("x", 2)]), true).unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        EngineEvent::SynchronizationFailed(SyncError::Synchronization(_))
    ));
    assert_eq!(engine.pending_items(), Some(items(&[("x", 2)])));
    assert!(!engine.gate_state().is_synchronizing());

    tokio::time::advance(cooldown).await;
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);
    assert_eq!(dataset.put_log(), puts(&[("x", "2")]));
    assert_eq!(engine.pending_items(), None);
}

#[tokio::test(start_paused = true)]
async fn malformed_record_fails_the_cycle() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    dataset.set_remote_record("sword", "lots");
    let mut events = engine.subscribe();

    engine.initialize(POOL);
    assert!(matches!(
        next_event(&mut events).await,
        EngineEvent::SynchronizationFailed(SyncError::Core(_))
    ));
    assert!(!engine.is_initialized());
    assert!(!engine.gate_state().is_synchronizing());
}

#[tokio::test(start_paused = true)]
async fn identity_failure_halts_initialization() {
    let store = MemoryStore::new();
    let dataset = store.dataset("gameItems");
    let identity = StaticIdentityProvider::new("identity-1");
    identity.fail_next("throttled");
    let engine = ItemSyncEngine::new(EngineConfig::default(), store, identity);
    let mut events = engine.subscribe();

    engine.initialize(POOL);
    assert!(matches!(
        next_event(&mut events).await,
        EngineEvent::InitializationFailed(SyncError::IdentityResolution(_))
    ));
    assert_eq!(engine.gate_state().phase(), GatePhase::Idle);
    assert_eq!(dataset.sync_calls(), 0);
    assert_eq!(engine.get_items(), Err(SyncError::NotInitialized));

    // Initialization can be retried.
    initialize(&engine, &mut events).await;
    assert_eq!(dataset.sync_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn double_initialize_is_ignored() {
    let (engine, dataset) = setup(Duration::from_secs(60));
    let mut events = engine.subscribe();

    engine.initialize(POOL);
    engine.initialize(POOL);
    assert_eq!(next_event(&mut events).await, EngineEvent::Initialized);
    assert_eq!(next_event(&mut events).await, EngineEvent::Synchronized);

    engine.initialize(POOL);
    settle().await;
    assert!(events.try_recv().is_err());
    assert_eq!(dataset.sync_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dataset_open_failure_is_an_initialization_failure() {
    let store = MemoryStore::new();
    store.fail_next_open(StoreError::rejected("no access"));
    let engine = ItemSyncEngine::new(
        EngineConfig::default(),
        store,
        StaticIdentityProvider::new("identity-1"),
    );
    let mut events = engine.subscribe();

    engine.initialize(POOL);
    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::InitializationFailed(SyncError::Synchronization(StoreError::rejected(
            "no access"
        )))
    );
    assert!(!engine.gate_state().is_initializing());
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_periodic_sync() {
    let cooldown = Duration::from_secs(5);
    let (engine, dataset) = setup(cooldown);
    let mut events = engine.subscribe();
    initialize(&engine, &mut events).await;

    engine.dispose();
    tokio::time::advance(cooldown * 3).await;
    settle().await;

    assert_eq!(dataset.sync_calls(), 1);
    assert_eq!(engine.gate_state().phase(), GatePhase::Disposed);
    assert_eq!(engine.sync(), Err(SyncError::Disposed));
}
