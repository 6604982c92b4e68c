use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::keys::KeyNamespace;
use crate::store::traits::{ScoredMember, Store};
use crate::time::unix_ms;

/// What a key holds. Integers live as decimal byte strings, like the wire
/// protocol of the real store, so `incr_by` and `get` compose.
enum Value {
    Bytes(Vec<u8>),
    /// Members kept sorted by `(score, member)`, member-unique.
    Sorted(Vec<(Vec<u8>, f64)>),
}

struct Entry {
    value: Value,
    /// Absolute expiry on the store clock, in ms. `None` = no TTL.
    expires_at: Option<u64>,
}

/// In-process implementation of [`Store`] with real TTL and sorted-set
/// semantics. The single mutex makes every operation atomic, including the
/// compound ones, which is exactly the contract the remote store provides
/// through scripting.
///
/// Intended for tests and single-process deployments; the store clock can
/// be shifted forward with [`MemoryStore::advance`] so TTL and window
/// behavior is testable without sleeping.
pub struct MemoryStore {
    ns: KeyNamespace,
    inner: Mutex<HashMap<String, Entry>>,
    clock_skew_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_namespace(KeyNamespace::none())
    }

    pub fn with_namespace(ns: KeyNamespace) -> Self {
        Self {
            ns,
            inner: Mutex::new(HashMap::new()),
            clock_skew_ms: AtomicU64::new(0),
        }
    }

    /// Shift the store clock forward. Affects TTL expiry only; callers that
    /// pass wall-clock timestamps (queue scores, window events) are not
    /// rewritten.
    pub fn advance(&self, by: Duration) {
        self.clock_skew_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    fn now(&self) -> u64 {
        unix_ms() + self.clock_skew_ms.load(Ordering::SeqCst)
    }

    /// Lock the map and drop the entry at `key` if its TTL has passed.
    fn lock_purged(&self, key: &str) -> (std::sync::MutexGuard<'_, HashMap<String, Entry>>, String) {
        let physical = self.ns.physical(key);
        let now = self.now();
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map
            .get(&physical)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now)
        {
            map.remove(&physical);
        }
        (map, physical)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Value(format!("key {key} holds a value of another type"))
}

/// Insert or replace a member, keeping the vec sorted by `(score, member)`.
fn sorted_insert(members: &mut Vec<(Vec<u8>, f64)>, member: Vec<u8>, score: f64) {
    members.retain(|(m, _)| m != &member);
    let at = members
        .partition_point(|(m, s)| *s < score || (*s == score && m < &member));
    members.insert(at, (member, score));
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let (map, physical) = self.lock_purged(key);
        match map.get(&physical) {
            Some(Entry {
                value: Value::Bytes(b),
                ..
            }) => Ok(Some(b.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let now = self.now();
        let (mut map, physical) = self.lock_purged(key);
        map.insert(
            physical,
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: ttl.map(|t| now + t.as_millis() as u64),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> StoreResult<u64> {
        let mut removed = 0;
        for key in keys {
            let (mut map, physical) = self.lock_purged(key);
            if map.remove(&physical).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.now();
        let (mut map, physical) = self.lock_purged(key);
        match map.get_mut(&physical) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl.as_millis() as u64);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = self.now();
        let (map, physical) = self.lock_purged(key);
        Ok(map
            .get(&physical)
            .and_then(|e| e.expires_at)
            .map(|at| Duration::from_millis(at.saturating_sub(now))))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let (mut map, physical) = self.lock_purged(key);
        let entry = map.entry(physical).or_insert(Entry {
            value: Value::Bytes(b"0".to_vec()),
            expires_at: None,
        });
        let Value::Bytes(bytes) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current: i64 = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                StoreError::Value(format!("key {key} does not hold an integer"))
            })?;
        let next = current + delta;
        *bytes = next.to_string().into_bytes();
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> StoreResult<()> {
        let (mut map, physical) = self.lock_purged(key);
        let entry = map.entry(physical).or_insert(Entry {
            value: Value::Sorted(Vec::new()),
            expires_at: None,
        });
        let Value::Sorted(members) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        sorted_insert(members, member.to_vec(), score);
        Ok(())
    }

    async fn zpop_min(&self, key: &str, count: usize) -> StoreResult<Vec<ScoredMember>> {
        let (mut map, physical) = self.lock_purged(key);
        let Some(entry) = map.get_mut(&physical) else {
            return Ok(Vec::new());
        };
        let Value::Sorted(members) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let take = count.min(members.len());
        let popped = members
            .drain(..take)
            .map(|(member, score)| ScoredMember { member, score })
            .collect();
        if members.is_empty() {
            map.remove(&physical);
        }
        Ok(popped)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> StoreResult<Vec<ScoredMember>> {
        let (map, physical) = self.lock_purged(key);
        let Some(entry) = map.get(&physical) else {
            return Ok(Vec::new());
        };
        let Value::Sorted(members) = &entry.value else {
            return Err(wrong_type(key));
        };
        Ok(members
            .iter()
            .filter(|(_, s)| *s >= min && *s <= max)
            .take(limit)
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect())
    }

    async fn zrem(&self, key: &str, member: &[u8]) -> StoreResult<bool> {
        let (mut map, physical) = self.lock_purged(key);
        let Some(entry) = map.get_mut(&physical) else {
            return Ok(false);
        };
        let Value::Sorted(members) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let before = members.len();
        members.retain(|(m, _)| m != member);
        let removed = members.len() < before;
        if members.is_empty() {
            map.remove(&physical);
        }
        Ok(removed)
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        let (map, physical) = self.lock_purged(key);
        match map.get(&physical) {
            Some(Entry {
                value: Value::Sorted(members),
                ..
            }) => Ok(members.len() as u64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        let now = self.now();
        let (mut map, physical) = self.lock_purged(key);
        if map.contains_key(&physical) {
            return Ok(false);
        }
        map.insert(
            physical,
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: Some(now + ttl.as_millis() as u64),
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let (mut map, physical) = self.lock_purged(key);
        let matches = matches!(
            map.get(&physical),
            Some(Entry {
                value: Value::Bytes(b),
                ..
            }) if b == expected
        );
        if matches {
            map.remove(&physical);
        }
        Ok(matches)
    }

    async fn sliding_window_add(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
        member: &[u8],
    ) -> StoreResult<bool> {
        let window_ms = window.as_millis() as u64;
        let cutoff = now_ms.saturating_sub(window_ms) as f64;
        let store_now = self.now();

        let (mut map, physical) = self.lock_purged(key);
        let entry = map.entry(physical.clone()).or_insert(Entry {
            value: Value::Sorted(Vec::new()),
            expires_at: None,
        });
        let Value::Sorted(members) = &mut entry.value else {
            return Err(wrong_type(key));
        };

        members.retain(|(_, s)| *s > cutoff);
        entry.expires_at = Some(store_now + window_ms);

        if (members.len() as u64) < limit {
            sorted_insert(members, member.to_vec(), now_ms as f64);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
