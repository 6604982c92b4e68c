use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::keys::KeyNamespace;
use crate::store::traits::{ScoredMember, Store};

/// Delete the key only if it still holds the expected value. One atomic
/// unit: a plain GET-then-DEL would let another owner slip in between.
const COMPARE_AND_DELETE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Prune events outside the trailing window, then admit and record the new
/// event only if the remainder is below the limit. The key TTL is refreshed
/// to the window either way so abandoned windows age out.
const SLIDING_WINDOW_ADD: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local admitted = 0
if redis.call('ZCARD', KEYS[1]) < tonumber(ARGV[2]) then
    redis.call('ZADD', KEYS[1], ARGV[3], ARGV[4])
    admitted = 1
end
redis.call('PEXPIRE', KEYS[1], ARGV[5])
return admitted
"#;

/// Redis-backed implementation of [`Store`].
///
/// Holds one multiplexed connection per configured endpoint and shards keys
/// across them by hashing the physical key, ring addressing over the
/// configured server list. A single endpoint degenerates to no sharding.
///
/// The compound operations run as server-side Lua, so their atomicity holds
/// across any number of client processes.
pub struct RedisStore {
    ns: KeyNamespace,
    conns: Vec<ConnectionManager>,
    compare_and_delete: Script,
    sliding_window_add: Script,
}

impl RedisStore {
    /// Connect to every endpoint in the config. Fails if any endpoint is
    /// unreachable, since a partial ring would silently misroute keys.
    #[tracing::instrument(skip_all, fields(endpoints = config.servers.len()))]
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        if config.servers.is_empty() {
            return Err(StoreError::Connection(
                "no store endpoints configured".to_string(),
            ));
        }

        let mut conns = Vec::with_capacity(config.servers.len());
        for server in &config.servers {
            let url = connection_url(server, config.password.as_deref(), config.db);
            let client = redis::Client::open(url)?;
            let conn = ConnectionManager::new(client).await?;
            conns.push(conn);
        }

        info!(endpoints = config.servers.len(), db = config.db, "store connected");

        Ok(Self {
            ns: config
                .prefix
                .as_deref()
                .map(KeyNamespace::new)
                .unwrap_or_default(),
            conns,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            sliding_window_add: Script::new(SLIDING_WINDOW_ADD),
        })
    }

    /// Route a physical key to its endpoint connection.
    fn conn_for(&self, physical: &str) -> ConnectionManager {
        if self.conns.len() == 1 {
            return self.conns[0].clone();
        }
        let mut hasher = DefaultHasher::new();
        physical.hash(&mut hasher);
        let idx = (hasher.finish() % self.conns.len() as u64) as usize;
        self.conns[idx].clone()
    }

    fn route(&self, key: &str) -> (String, ConnectionManager) {
        let physical = self.ns.physical(key);
        let conn = self.conn_for(&physical);
        (physical, conn)
    }
}

fn connection_url(server: &str, password: Option<&str>, db: i64) -> String {
    match password {
        Some(password) => format!("redis://:{password}@{server}/{db}"),
        None => format!("redis://{server}/{db}"),
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let (physical, mut conn) = self.route(key);
        Ok(conn.get(physical).await?)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let (physical, mut conn) = self.route(key);
        let mut cmd = redis::cmd("SET");
        cmd.arg(physical).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> StoreResult<u64> {
        // Keys may route to different endpoints, so delete one at a time.
        let mut removed = 0u64;
        for key in keys {
            let (physical, mut conn) = self.route(key);
            let n: u64 = conn.del(physical).await?;
            removed += n;
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let (physical, mut conn) = self.route(key);
        Ok(conn.pexpire(physical, ttl.as_millis() as i64).await?)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let (physical, mut conn) = self.route(key);
        let ms: i64 = conn.pttl(physical).await?;
        // Negative replies mean "no key" or "no expiry".
        Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let (physical, mut conn) = self.route(key);
        Ok(conn.incr(physical, delta).await?)
    }

    async fn zadd(&self, key: &str, member: &[u8], score: f64) -> StoreResult<()> {
        let (physical, mut conn) = self.route(key);
        let _: i64 = conn.zadd(physical, member, score).await?;
        Ok(())
    }

    async fn zpop_min(&self, key: &str, count: usize) -> StoreResult<Vec<ScoredMember>> {
        let (physical, mut conn) = self.route(key);
        let popped: Vec<(Vec<u8>, f64)> = conn.zpopmin(physical, count as isize).await?;
        Ok(popped
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> StoreResult<Vec<ScoredMember>> {
        let (physical, mut conn) = self.route(key);
        let entries: Vec<(Vec<u8>, f64)> = conn
            .zrangebyscore_limit_withscores(physical, min, max, 0, limit as isize)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    async fn zrem(&self, key: &str, member: &[u8]) -> StoreResult<bool> {
        let (physical, mut conn) = self.route(key);
        let removed: u64 = conn.zrem(physical, member).await?;
        Ok(removed > 0)
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        let (physical, mut conn) = self.route(key);
        Ok(conn.zcard(physical).await?)
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<bool> {
        let (physical, mut conn) = self.route(key);
        let reply: Option<String> = redis::cmd("SET")
            .arg(physical)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool> {
        let (physical, mut conn) = self.route(key);
        let deleted: i64 = self
            .compare_and_delete
            .key(physical)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn sliding_window_add(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
        member: &[u8],
    ) -> StoreResult<bool> {
        let (physical, mut conn) = self.route(key);
        let window_ms = window.as_millis() as u64;
        let cutoff = now_ms.saturating_sub(window_ms);
        let admitted: i64 = self
            .sliding_window_add
            .key(physical)
            .arg(cutoff)
            .arg(limit)
            .arg(now_ms)
            .arg(member)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;
        Ok(admitted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_formats() {
        assert_eq!(
            connection_url("10.0.0.1:6379", None, 0),
            "redis://10.0.0.1:6379/0"
        );
        assert_eq!(
            connection_url("10.0.0.1:6379", Some("hunter2"), 3),
            "redis://:hunter2@10.0.0.1:6379/3"
        );
    }

    #[test]
    fn key_hash_routing_is_stable() {
        // Same key must always land on the same endpoint index.
        let pick = |key: &str, n: u64| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            hasher.finish() % n
        };
        for key in ["jobs", "every:signup:3600s", "rate:login:10.0.0.1"] {
            assert_eq!(pick(key, 3), pick(key, 3));
        }
    }
}
