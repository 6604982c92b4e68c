pub(crate) mod keys;
mod memory;
mod redis;
mod traits;

pub use self::redis::RedisStore;
pub use keys::KeyNamespace;
pub use memory::MemoryStore;
pub use traits::{ScoredMember, Store};
