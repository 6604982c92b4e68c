//! Periodic quota counters over the store.
//!
//! A counter is an integer created on first increment with TTL = window,
//! so it self-resets when the window passes. The increment and the
//! conditional expire are two calls: a concurrent reader can briefly
//! observe a counter with no TTL yet set. That only delays a reset, never
//! prevents one. The count over a window is an accepted approximation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreResult;
use crate::store::{keys, Store};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Handle for windowed "N actions per period" counting. Cheap to clone.
#[derive(Clone)]
pub struct Counter {
    store: Arc<dyn Store>,
}

impl Counter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Atomically increment the counter for `name` in the given window and
    /// return the post-increment value. The first increment of a window
    /// arms the TTL.
    pub async fn increment(&self, name: &str, window: Duration) -> StoreResult<i64> {
        let key = keys::counter_key(name, window);
        let count = self.store.incr_by(&key, 1).await?;
        if count == 1 {
            self.store.expire(&key, window).await?;
        }
        debug!(%name, count, "counter incremented");
        Ok(count)
    }

    /// Times `name` happened this hour, counting this call.
    pub async fn hour(&self, name: &str) -> StoreResult<i64> {
        self.increment(name, HOUR).await
    }

    /// Times `name` happened today, counting this call.
    pub async fn day(&self, name: &str) -> StoreResult<i64> {
        self.increment(name, DAY).await
    }

    /// Times `name` happened this month (30 days), counting this call.
    pub async fn month(&self, name: &str) -> StoreResult<i64> {
        self.increment(name, MONTH).await
    }
}
