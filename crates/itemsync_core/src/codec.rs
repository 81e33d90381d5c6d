//! Conversion between dataset records and item counts.
//!
//! Counts are stored remotely as base-10 integer strings.

use crate::error::{CoreError, CoreResult};
use crate::types::{ItemMap, Records};

/// Encodes a single count as a record value.
#[must_use]
pub fn encode_count(count: i64) -> String {
    count.to_string()
}

/// Decodes a single record value.
pub fn decode_count(key: &str, value: &str) -> CoreResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::malformed_count(key, value))
}

/// Encodes an item map into records.
#[must_use]
pub fn encode_items(items: &ItemMap) -> Records {
    items
        .iter()
        .map(|(key, count)| (key.clone(), encode_count(*count)))
        .collect()
}

/// Decodes all records into an item map.
///
/// Fails on the first record whose value is not an integer.
pub fn decode_records(records: &Records) -> CoreResult<ItemMap> {
    records
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_count(key, value)?)))
        .collect()
}
