//! In-memory KV store with per-entry deadlines.
//!
//! Entries are reaped lazily on read. Used in tests and as a single-process
//! fallback when no Redis connection is configured.

use super::KvStore;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }
        // Expired: remove so lookups behave like Redis TTL eviction
        self.entries.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let kv = MemoryKv::new();
        kv.set_ex("k1", "v1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("k1").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_not_stale() {
        let kv = MemoryKv::new();
        kv.set_ex("k1", "v1", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let kv = MemoryKv::new();
        kv.set_ex("k1", "old", Duration::from_millis(10)).await.unwrap();
        kv.set_ex("k1", "new", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k1").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_matching_keys() {
        let kv = MemoryKv::new();
        let ttl = Duration::from_secs(60);
        kv.set_ex("crm:m1:leads", "a", ttl).await.unwrap();
        kv.set_ex("crm:m1:analytics:leads", "b", ttl).await.unwrap();
        kv.set_ex("crm:m2:leads", "c", ttl).await.unwrap();

        let removed = kv.delete_prefix("crm:m1:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(kv.get("crm:m1:leads").await.unwrap(), None);
        assert_eq!(kv.get("crm:m2:leads").await.unwrap(), Some("c".to_string()));
    }
}
