//! Engine event fan-out.
//!
//! Every subscriber receives every event emitted after it subscribed, in
//! emission order. Subscribers whose receiver was dropped are pruned on the
//! next emit.

use crate::error::SyncError;
use itemsync_core::Delta;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// An event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The first sync succeeded.
    Initialized,
    /// Initialization was halted.
    InitializationFailed(SyncError),
    /// A sync cycle completed.
    Synchronized,
    /// A sync cycle failed. Periodic sync continues.
    SynchronizationFailed(SyncError),
    /// Remote counts changed. The delta is never empty.
    ItemsChanged(Delta),
}

/// Receiving half of an engine subscription.
pub type EventReceiver = UnboundedReceiver<EngineEvent>;

/// Distributes engine events to subscribers.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<UnboundedSender<EngineEvent>>>,
}

impl ChangeNotifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to every live subscriber.
    ///
    /// An `ItemsChanged` event with an empty delta is discarded.
    pub fn emit(&self, event: EngineEvent) {
        if matches!(&event, EngineEvent::ItemsChanged(delta) if delta.is_empty()) {
            return;
        }
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Emits `ItemsChanged` if `delta` is non-empty.
    ///
    /// Returns true if an event was emitted.
    pub fn items_changed(&self, delta: Delta) -> bool {
        if delta.is_empty() {
            return false;
        }
        self.emit(EngineEvent::ItemsChanged(delta));
        true
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
