pub mod config;
pub mod counter;
pub mod error;
pub mod lock;
pub mod queue;
pub mod ratelimit;
pub mod store;
pub mod telemetry;
mod time;

pub use config::{Config, StoreConfig};
pub use counter::Counter;
pub use error::{EnqueueError, HandlerError, StoreError, StoreResult};
pub use lock::Lock;
pub use queue::{Handler, QueueEngine, QueueMode, QueueWorker, RunOptions, Schedule};
pub use ratelimit::RateLimiter;
pub use store::{KeyNamespace, MemoryStore, RedisStore, ScoredMember, Store};
