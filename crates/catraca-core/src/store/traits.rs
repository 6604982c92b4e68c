use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// A sorted-set member together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: Vec<u8>,
    pub score: f64,
}

/// The backing-store contract every primitive is built on. Implementations
/// must be thread-safe; the trait is consumed as `Arc<dyn Store>` so any
/// process, anywhere, may issue these calls concurrently.
///
/// Keys are logical; each implementation applies the global key-prefix
/// namespace before touching the wire.
///
/// The compound operations at the bottom must be atomic on the store side
/// (native scripting, transactions, or a process-wide lock for in-memory
/// implementations). Splitting them into separate round trips reintroduces
/// the check-then-act races these primitives exist to remove.
#[async_trait]
pub trait Store: Send + Sync {
    // --- Plain key-value ---

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Set a value, optionally with a time-to-live.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete keys. Returns how many existed.
    async fn del(&self, keys: &[&str]) -> StoreResult<u64>;

    /// Set a time-to-live on an existing key. Returns false if the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remaining time-to-live, or `None` if the key is missing or has no
    /// expiry.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Atomic integer increment. A missing key counts from zero.
    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    // --- Sorted sets ---

    /// Insert a member with a score, or update the score of an existing
    /// member. Identical members collapse to one entry.
    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> StoreResult<()>;

    /// Atomically pop up to `count` lowest-score members.
    async fn zpop_min(&self, key: &str, count: usize) -> StoreResult<Vec<ScoredMember>>;

    /// Members with scores in `[min, max]`, lowest first, at most `limit`.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> StoreResult<Vec<ScoredMember>>;

    /// Remove a member. Returns false if it was not present.
    async fn zrem(&self, key: &str, member: &[u8]) -> StoreResult<bool>;

    /// Number of members in the sorted set.
    async fn zcard(&self, key: &str) -> StoreResult<u64>;

    // --- Atomic compound operations ---

    /// Set `key` to `value` with the given TTL only if the key is absent.
    /// Returns true if the value was set. This is the lock-acquire primitive.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool>;

    /// Delete `key` only if its current value equals `expected`. Returns
    /// true if the key was deleted. This is the lock-release primitive.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// Sliding-window admission: drop members scored at or before
    /// `now_ms - window`, count the remainder, and only if the count is
    /// below `limit` record `member` at score `now_ms` and return true.
    /// The key's TTL is refreshed to `window` either way so abandoned
    /// windows are bounded in storage.
    async fn sliding_window_add(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
        member: &[u8],
    ) -> StoreResult<bool>;
}
