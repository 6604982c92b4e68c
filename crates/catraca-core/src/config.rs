use serde::Deserialize;

/// Top-level configuration, deserializable from TOML and overridable from the
/// environment via [`Config::from_env`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub queue: QueueTuning,
}

/// Backing-store addressing and namespace.
///
/// `servers` may list several endpoints; keys are sharded across them by
/// hashing the physical key. `prefix` is the global key-prefix namespace
/// applied to every logical key.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub servers: Vec<String>,
    pub password: Option<String>,
    /// Logical database index on the store.
    pub db: i64,
    pub prefix: Option<String>,
}

/// Queue-engine tuning knobs shared by all workers unless overridden per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueTuning {
    /// Poll interval of the dequeue loop, in milliseconds.
    pub tick_ms: u64,
    /// Maximum entries popped and dispatched per tick.
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            servers: vec!["127.0.0.1:6379".to_string()],
            password: None,
            db: 0,
            prefix: None,
        }
    }
}

impl Default for QueueTuning {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            batch_size: 10,
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    ///
    /// Recognized variables: `CATRACA_SERVERS` (comma-separated endpoint
    /// list), `CATRACA_PASSWORD`, `CATRACA_DB`, `CATRACA_PREFIX`. Unset
    /// variables fall back to the defaults; a non-numeric `CATRACA_DB`
    /// falls back to database 0.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(servers) = lookup("CATRACA_SERVERS") {
            let servers: Vec<String> = servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !servers.is_empty() {
                config.store.servers = servers;
            }
        }
        if let Some(password) = lookup("CATRACA_PASSWORD") {
            if !password.is_empty() {
                config.store.password = Some(password);
            }
        }
        if let Some(db) = lookup("CATRACA_DB") {
            config.store.db = db.trim().parse().unwrap_or(0);
        }
        if let Some(prefix) = lookup("CATRACA_PREFIX") {
            if !prefix.is_empty() {
                config.store.prefix = Some(prefix);
            }
        }

        config
    }
}
