//! Key-value store adapter.
//!
//! One shared store serves three roles: short-TTL read-through cache,
//! encrypted credential store, and session store. Production uses Redis;
//! tests use the in-memory implementation.

mod memory;
mod redis_store;

pub use memory::MemoryKv;
pub use redis_store::RedisKv;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Get / set-with-TTL / delete operations against the shared cache.
///
/// Every entry written through this trait carries a TTL; nothing persists
/// indefinitely. `delete_prefix` exists for coarse per-tenant cache
/// invalidation after CRM writes.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}
