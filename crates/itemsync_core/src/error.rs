//! Error types for ItemSync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A record value is not a base-10 integer.
    #[error("malformed count for item {key:?}: {value:?}")]
    MalformedCount {
        /// Record key.
        key: String,
        /// Raw record value.
        value: String,
    },
}

impl CoreError {
    /// Creates a malformed count error.
    pub fn malformed_count(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedCount {
            key: key.into(),
            value: value.into(),
        }
    }
}
