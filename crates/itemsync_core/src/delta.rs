//! Snapshot comparison and pending-write merging.
//!
//! Both operations walk the union of keys of two maps, treating an absent
//! key as a count of zero, and both only emit keys whose two values differ.
//! They are kept apart because their results mean different things: one is
//! a comparison, the other a sum.

use crate::types::{Delta, ItemMap};
use std::collections::BTreeSet;

/// Computes the per-key change from `from` to `to`.
///
/// The result holds `to[k] - from[k]` for every key whose counts differ.
/// Equal snapshots yield an empty delta.
pub fn compute_delta(from: &ItemMap, to: &ItemMap) -> Delta {
    union_keys(from, to)
        .into_iter()
        .filter_map(|key| {
            let before = count_of(from, key);
            let after = count_of(to, key);
            (before != after).then(|| (key.to_owned(), after.saturating_sub(before)))
        })
        .collect()
}

/// Sums a pending write with a delta.
///
/// A key is only emitted when its two values differ, so a key carrying the
/// same non-zero count on both sides is left out of the result even though
/// its sum is non-zero. Callers rely on this exact shape.
pub fn merge_sum(pending: &ItemMap, delta: &Delta) -> ItemMap {
    union_keys(pending, delta)
        .into_iter()
        .filter_map(|key| {
            let left = count_of(pending, key);
            let right = count_of(delta, key);
            (left != right).then(|| (key.to_owned(), left.saturating_add(right)))
        })
        .collect()
}

fn union_keys<'a>(a: &'a ItemMap, b: &'a ItemMap) -> BTreeSet<&'a str> {
    a.keys().chain(b.keys()).map(String::as_str).collect()
}

fn count_of(map: &ItemMap, key: &str) -> i64 {
    map.get(key).copied().unwrap_or(0)
}
