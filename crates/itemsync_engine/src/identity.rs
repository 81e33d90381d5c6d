//! Identity provider abstraction.

use crate::error::{IdentityError, IdentityResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An identity resolved from an identity pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pool_id: String,
    identity_id: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(pool_id: impl Into<String>, identity_id: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            identity_id: identity_id.into(),
        }
    }

    /// Returns the pool the identity belongs to.
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// Returns the opaque identity token.
    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity_id)
    }
}

/// Resolves an identity for an identity pool.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves the identity for `pool_id`.
    async fn get_identity(&self, pool_id: &str) -> IdentityResult<Identity>;
}

/// An identity provider that always hands out the same identity token.
///
/// Failures can be queued ahead of it with [`fail_next`](Self::fail_next).
#[derive(Debug)]
pub struct StaticIdentityProvider {
    identity_id: String,
    failures: Mutex<VecDeque<String>>,
    calls: AtomicU64,
}

impl StaticIdentityProvider {
    /// Creates a provider for the given identity token.
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Queues a failure for a future `get_identity` call.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    /// Returns the number of `get_identity` calls.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn get_identity(&self, pool_id: &str) -> IdentityResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.lock().pop_front() {
            return Err(IdentityError::unresolved(pool_id, message));
        }
        Ok(Identity::new(pool_id, self.identity_id.clone()))
    }
}
