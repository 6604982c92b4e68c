//! Logical-to-physical key mapping and the derived key formats used by the
//! primitives. The namespace is applied inside each `Store` implementation,
//! so everything above the store sees only logical keys.

use std::time::Duration;

/// Global key-prefix namespace. With a prefix of `myapp`, the logical key
/// `jobs` maps to the physical key `myapp:jobs`; without one, the mapping
/// is the identity.
#[derive(Debug, Clone, Default)]
pub struct KeyNamespace {
    prefix: Option<String>,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    /// A namespace that maps every key to itself.
    pub fn none() -> Self {
        Self { prefix: None }
    }

    pub fn physical(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}

/// Key for a periodic quota counter: `every:{name}:{window_secs}s`.
/// The window is part of the key so the same name can be counted over
/// several periods independently.
pub fn counter_key(name: &str, window: Duration) -> String {
    format!("every:{name}:{}s", window.as_secs())
}

/// Key for a sliding rate-limit window.
pub fn rate_key(key: &str) -> String {
    format!("rate:{key}")
}
