//! Local/pending/remote reconciliation.
//!
//! The reconciler holds no I/O. The engine feeds it each remote snapshot
//! and performs whatever writes the returned [`Reconciliation`] asks for.

use itemsync_core::{compute_delta, merge_sum, Delta, ItemMap};

/// Outcome of reconciling one remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Remote changes since the previous local snapshot, if any.
    pub changes: Option<Delta>,
    /// Items to write back to the store before syncing again.
    pub flush: Option<ItemMap>,
}

/// Owns the local snapshot and the pending write.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    local: Option<ItemMap>,
    pending: Option<ItemMap>,
}

impl Reconciler {
    /// Creates a reconciler with no snapshot and no pending write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last reconciled snapshot.
    pub fn local(&self) -> Option<&ItemMap> {
        self.local.as_ref()
    }

    /// Returns the pending write.
    pub fn pending(&self) -> Option<&ItemMap> {
        self.pending.as_ref()
    }

    /// Replaces the pending write, returning the one it replaced.
    pub fn set_pending(&mut self, items: ItemMap) -> Option<ItemMap> {
        self.pending.replace(items)
    }

    /// Reconciles a freshly fetched remote snapshot.
    ///
    /// The local snapshot becomes `remote`. The pending write is left in
    /// place until [`commit_flush`](Self::commit_flush) confirms it was
    /// written.
    pub fn reconcile(&mut self, remote: ItemMap) -> Reconciliation {
        let changes = self
            .local
            .as_ref()
            .map(|local| compute_delta(local, &remote))
            .filter(|delta| !delta.is_empty());

        self.local = Some(remote);

        let flush = self.pending.as_ref().map(|pending| match &changes {
            Some(delta) => merge_sum(pending, delta),
            None => pending.clone(),
        });

        Reconciliation { changes, flush }
    }

    /// Records that `merged` was fully written to the store.
    pub fn commit_flush(&mut self, merged: ItemMap) {
        self.local = Some(merged);
        self.pending = None;
    }

    /// Records a flush that stopped part-way.
    ///
    /// `written` holds the entries that reached the store; they are folded
    /// into the local snapshot so the next remote snapshot does not report
    /// them as remote changes. `merged` becomes the pending write again.
    pub fn abort_flush(&mut self, merged: ItemMap, written: ItemMap) {
        self.local.get_or_insert_with(ItemMap::new).extend(written);
        self.pending = Some(merged);
    }
}
