//! Snapshot type definitions.

use std::collections::BTreeMap;

/// Item key to count.
///
/// Used for the remote snapshot, the engine's local snapshot and a
/// caller's pending write. Ordered so that logs and test output are stable.
pub type ItemMap = BTreeMap<String, i64>;

/// Item key to signed difference.
///
/// A key absent from a delta is unchanged.
pub type Delta = BTreeMap<String, i64>;

/// Raw dataset records as stored remotely: key to string-encoded count.
pub type Records = BTreeMap<String, String>;
