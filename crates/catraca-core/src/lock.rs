//! Distributed mutual exclusion over the store.
//!
//! A lock is a key holding an opaque owner token with a TTL. Existence of a
//! valid record means held. The TTL is the safety net against a crashed
//! holder: nothing else ever removes a lock except its own token.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreResult;
use crate::store::Store;

/// Handle for acquiring and releasing named locks. Cheap to clone.
#[derive(Clone)]
pub struct Lock {
    store: Arc<dyn Store>,
}

impl Lock {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Try to take the lock. Returns false when it is already held,
    /// a normal outcome rather than an error. The owner token is caller-chosen
    /// and must be presented again to release.
    pub async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> StoreResult<bool> {
        let acquired = self.store.set_if_absent(key, owner.as_bytes(), ttl).await?;
        debug!(%key, %owner, acquired, "lock acquire");
        Ok(acquired)
    }

    /// Release the lock if and only if `owner` still holds it, as one
    /// atomic compare-and-delete on the store. Releasing a lock held by
    /// another owner (or by nobody) is a no-op, which keeps release
    /// idempotent: a slow holder whose TTL already expired cannot free
    /// somebody else's lock.
    pub async fn release(&self, key: &str, owner: &str) -> StoreResult<()> {
        let released = self
            .store
            .compare_and_delete(key, owner.as_bytes())
            .await?;
        if !released {
            debug!(%key, %owner, "release was a no-op, lock not held by this owner");
        }
        Ok(())
    }
}
