//! Redis-backed KV store.
//!
//! Uses `ConnectionManager` for connection pooling and automatic reconnects.
//! Prefix deletion walks SCAN cursors rather than KEYS so large keyspaces
//! don't block the server.

use super::KvStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

pub struct RedisKv {
    conn_manager: ConnectionManager,
}

impl RedisKv {
    /// Connects to Redis at `redis_url` (e.g. "redis://:pass@127.0.0.1:6379").
    ///
    /// Connection failure here is a fatal configuration error; the process
    /// must not start without its cache store.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid Redis URL")?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Redis GET failed for '{}'", key))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        // SETEX takes whole seconds; anything under a second rounds up to 1
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .with_context(|| format!("Redis SETEX failed for '{}'", key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(key)
            .await
            .with_context(|| format!("Redis DEL failed for '{}'", key))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .context("Redis SCAN failed")?;

            if !keys.is_empty() {
                deleted += keys.len();
                let _: () = conn
                    .del(&keys)
                    .await
                    .context("Redis DEL failed during prefix invalidation")?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(deleted)
    }
}
