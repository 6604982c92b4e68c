//! Sliding-window rate limiting over the store.
//!
//! Each key maps to a sorted set of event timestamps inside the trailing
//! window ending now. Pruning, counting, and recording happen as one
//! atomic store-side sequence; two round trips would reintroduce the
//! check-then-act race this primitive exists to remove.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreResult;
use crate::store::{keys, Store};
use crate::time::unix_ms;

/// Handle for sliding-window admission checks. Cheap to clone; state lives
/// entirely in the store, so any process may check the same key.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Admit and record one event if fewer than `limit` events happened in
    /// the trailing `window`, atomically. Returns false when the window is
    /// full, which is normal flow rather than an error.
    ///
    /// The window key carries TTL = `window`, so keys that stop being
    /// checked age out of the store on their own.
    pub async fn allow(&self, key: &str, limit: u64, window: Duration) -> StoreResult<bool> {
        let now_ms = unix_ms();
        // Member uniqueness keeps same-millisecond events from collapsing
        // into one sorted-set entry.
        let member = format!("{now_ms}:{:08x}", rand::random::<u32>());
        let admitted = self
            .store
            .sliding_window_add(&keys::rate_key(key), limit, window, now_ms, member.as_bytes())
            .await?;
        debug!(%key, limit, admitted, "rate limit check");
        Ok(admitted)
    }
}
