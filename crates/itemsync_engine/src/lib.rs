//! # ItemSync Engine
//!
//! Keeps a local snapshot of item counts reconciled with a remote dataset.
//!
//! This crate provides:
//! - Reconciliation of the local snapshot, a pending write and the remote
//!   snapshot
//! - A single-flight sync gate with a cooldown between cycles
//! - Change notification carrying only non-zero deltas
//! - Store and identity abstractions with in-memory implementations
//!
//! ## Sync cycle
//!
//! 1. Synchronize the dataset with the remote store
//! 2. Diff the remote snapshot against the local one and notify changes
//! 3. If a write is pending, merge it with the changes, write it back and
//!    synchronize again
//! 4. Otherwise release the gate and schedule the next cycle
//!
//! ## Key Invariants
//!
//! - At most one synchronize call is in flight
//! - A pending write is dropped only once it has been written to the store
//! - `ItemsChanged` is never emitted with an empty delta
//! - A failed cycle never stops the periodic cadence

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod gate;
mod identity;
mod notifier;
mod reconcile;
mod store;

pub use config::{EngineConfig, DEFAULT_COOLDOWN, DEFAULT_DATASET_NAME};
pub use engine::{ItemSyncEngine, SyncStats};
pub use error::{IdentityError, IdentityResult, StoreError, StoreResult, SyncError, SyncResult};
pub use gate::{GatePhase, GateRefusal, SyncGate};
pub use identity::{Identity, IdentityProvider, StaticIdentityProvider};
pub use itemsync_core::{Delta, ItemMap, Records};
pub use notifier::{ChangeNotifier, EngineEvent, EventReceiver};
pub use reconcile::{Reconciler, Reconciliation};
pub use store::{Dataset, MemoryDataset, MemoryStore, RemoteDatasetStore};
