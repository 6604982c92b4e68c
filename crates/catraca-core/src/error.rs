/// Low-level store errors (connection, protocol, server-side scripting).
/// This is the error type for the `Store` trait: store operations can only
/// fail with infrastructure errors, never domain outcomes. "Nothing there"
/// (missing key, empty queue, lock already held) is expressed through
/// `Option`/`bool` return values instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("malformed stored value: {0}")]
    Value(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else if err.kind() == redis::ErrorKind::NoScriptError {
            StoreError::Script(err.to_string())
        } else {
            StoreError::Protocol(err.to_string())
        }
    }
}

/// Errors surfaced by `QueueEngine::enqueue`. Encode failures are reported
/// immediately; the entry never enters the queue.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Business errors returned by queue handlers. Opaque to the engine: a
/// failed entry is logged and requeued with its original score, whatever
/// the error was.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
