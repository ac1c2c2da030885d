//! Short-lived browser sessions mapping an opaque token to a member id.
//!
//! Tokens are unguessable UUIDv4 values. Lookup failure never distinguishes
//! "expired" from "never existed": both are an invalid session.

use crate::error::ApiError;
use crate::kv::KvStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const SESSION_KEY_PREFIX: &str = "session:";

/// Default session lifetime in seconds
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(token: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, token)
    }

    /// Creates a new session for `member_id` and returns the opaque token.
    ///
    /// `ttl_secs` defaults to 600 when not supplied by the caller.
    pub async fn create(
        &self,
        member_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<String, ApiError> {
        let token = Uuid::new_v4().to_string();
        let ttl = ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS);

        self.kv
            .set_ex(&Self::key(&token), member_id, Duration::from_secs(ttl))
            .await
            .context("Failed to store session")?;

        debug!(member_id = %member_id, ttl_secs = ttl, "Session created");
        Ok(token)
    }

    /// Resolves a session token to its member id.
    ///
    /// Unknown and expired tokens are indistinguishable: both fail with an
    /// authorization error.
    pub async fn resolve(&self, token: &str) -> Result<String, ApiError> {
        let member_id = self
            .kv
            .get(&Self::key(token))
            .await
            .context("Failed to read session")?;

        member_id.ok_or_else(|| ApiError::Unauthorized("Invalid session".to_string()))
    }

    /// Removes a session (logout). Removing an unknown token is a no-op.
    pub async fn destroy(&self, token: &str) -> Result<(), ApiError> {
        self.kv
            .delete(&Self::key(token))
            .await
            .context("Failed to delete session")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn test_store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let store = test_store();
        let token = store.create("m1", None).await.unwrap();
        assert_eq!(store.resolve(&token).await.unwrap(), "m1");
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let store = test_store();
        let t1 = store.create("m1", None).await.unwrap();
        let t2 = store.create("m1", None).await.unwrap();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid_session() {
        let store = test_store();
        let result = store.resolve("never-existed").await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid_session() {
        let store = test_store();
        // Zero TTL: MemoryKv treats the entry as immediately expired
        let token = store.create("m1", Some(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Same error shape as a token that never existed
        let expired = store.resolve(&token).await;
        let unknown = store.resolve("never-existed").await;
        assert!(matches!(expired, Err(ApiError::Unauthorized(_))));
        assert!(matches!(unknown, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_destroy_invalidates_session() {
        let store = test_store();
        let token = store.create("m1", None).await.unwrap();
        store.destroy(&token).await.unwrap();
        assert!(store.resolve(&token).await.is_err());
    }
}
