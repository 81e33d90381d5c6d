//! Error types for the sync engine and its collaborators.

use itemsync_core::CoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for dataset store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for identity resolution.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors reported by the engine.
///
/// Errors are cloneable so they can be fanned out to every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A mutating operation was called before the first sync completed.
    #[error("engine is not initialized")]
    NotInitialized,

    /// The identity provider failed; initialization was halted.
    #[error("identity resolution failed: {0}")]
    IdentityResolution(#[from] IdentityError),

    /// The dataset store failed to open, write or synchronize.
    #[error("synchronization failed: {0}")]
    Synchronization(#[from] StoreError),

    /// The remote snapshot could not be decoded.
    #[error("invalid remote snapshot: {0}")]
    Core(#[from] CoreError),

    /// The engine was disposed.
    #[error("engine disposed")]
    Disposed,
}

/// Errors reported by a remote dataset store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation.
    #[error("store rejected the request: {0}")]
    Rejected(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Returns true if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Other(_))
    }
}

/// Errors reported by an identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No identity could be obtained for the pool.
    #[error("identity unresolved for pool {pool_id}: {message}")]
    Unresolved {
        /// Identity pool that was queried.
        pool_id: String,
        /// Provider message.
        message: String,
    },
}

impl IdentityError {
    /// Creates an unresolved identity error.
    pub fn unresolved(pool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unresolved {
            pool_id: pool_id.into(),
            message: message.into(),
        }
    }
}
