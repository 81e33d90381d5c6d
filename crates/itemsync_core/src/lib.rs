//! # ItemSync Core
//!
//! Data layer for ItemSync.
//!
//! This crate provides:
//! - `ItemMap` / `Delta` snapshot types
//! - Delta computation between two snapshots
//! - The pending-write merge used during reconciliation
//! - Codec between raw dataset records and item counts
//!
//! ## Usage
//!
//! ```
//! use itemsync_core::{compute_delta, ItemMap};
//!
//! let local: ItemMap = [("sword".to_string(), 1)].into_iter().collect();
//! let remote: ItemMap = [("sword".to_string(), 1), ("shield".to_string(), 2)]
//!     .into_iter()
//!     .collect();
//!
//! let delta = compute_delta(&local, &remote);
//! assert_eq!(delta.len(), 1);
//! assert_eq!(delta["shield"], 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod delta;
mod error;
mod types;

pub use codec::{decode_count, decode_records, encode_count, encode_items};
pub use delta::{compute_delta, merge_sum};
pub use error::{CoreError, CoreResult};
pub use types::{Delta, ItemMap, Records};
