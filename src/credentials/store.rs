//! Token store: the only owner of per-tenant OAuth token records.
//!
//! Records are encrypted as a single blob and persisted in the shared KV
//! store under `token:{member_id}` with a TTL equal to `expires_in`, so an
//! expired credential is simply absent.
//!
//! Contract asymmetry, kept deliberately: `get_access_token` is fail-open
//! (`None` when no record), `get_domain` is fail-closed (authorization
//! error when no record).

use super::{encryption, TokenRecord};
use crate::error::ApiError;
use crate::kv::KvStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TOKEN_KEY_PREFIX: &str = "token:";

pub struct TokenStore {
    kv: Arc<dyn KvStore>,
    encryption_key: Vec<u8>,
}

impl TokenStore {
    /// Creates a token store over the shared KV adapter.
    ///
    /// # Arguments
    /// * `kv` - Shared KV store
    /// * `encryption_key_hex` - 64-hex-char master key (validated here)
    pub fn new(kv: Arc<dyn KvStore>, encryption_key_hex: &str) -> anyhow::Result<Self> {
        let encryption_key =
            encryption::validate_key(encryption_key_hex).context("Invalid encryption key")?;
        Ok(Self { kv, encryption_key })
    }

    fn key(member_id: &str) -> String {
        format!("{}{}", TOKEN_KEY_PREFIX, member_id)
    }

    /// Persists a token record, overwriting any prior record for the tenant.
    ///
    /// The whole record is encrypted as one opaque blob; the KV TTL equals
    /// the lifetime the provider granted.
    pub async fn save_token(&self, member_id: &str, record: &TokenRecord) -> Result<(), ApiError> {
        let plaintext = serde_json::to_string(record)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize token record: {}", e)))?;
        let blob = encryption::encrypt(&plaintext, &self.encryption_key)
            .context("Failed to encrypt token record")?;

        self.kv
            .set_ex(
                &Self::key(member_id),
                &blob,
                Duration::from_secs(record.expires_in),
            )
            .await
            .context("Failed to persist token record")?;

        info!(
            member_id = %member_id,
            domain = %record.domain,
            expires_in = record.expires_in,
            "Stored encrypted token record"
        );
        Ok(())
    }

    /// Returns the decrypted record, or `None` if absent (expired or never
    /// stored). Propagates only store or decryption failures.
    pub async fn get_token(&self, member_id: &str) -> Result<Option<TokenRecord>, ApiError> {
        let blob = self
            .kv
            .get(&Self::key(member_id))
            .await
            .context("Failed to read token record")?;

        let Some(blob) = blob else {
            debug!(member_id = %member_id, "No token record");
            return Ok(None);
        };

        let plaintext = encryption::decrypt(&blob, &self.encryption_key)
            .context("Failed to decrypt token record")?;
        let record: TokenRecord = serde_json::from_str(&plaintext)
            .map_err(|e| ApiError::Internal(format!("Corrupt token record: {}", e)))?;
        Ok(Some(record))
    }

    /// Fail-open: `None` when there is no live record.
    pub async fn get_access_token(&self, member_id: &str) -> Result<Option<String>, ApiError> {
        Ok(self
            .get_token(member_id)
            .await?
            .map(|record| record.access_token))
    }

    /// Fail-closed: absence of a record is an authorization error.
    pub async fn get_domain(&self, member_id: &str) -> Result<String, ApiError> {
        match self.get_token(member_id).await? {
            Some(record) => Ok(record.domain),
            None => Err(ApiError::Unauthorized(format!(
                "No stored credential for member '{}'",
                member_id
            ))),
        }
    }

    /// Removes the record outright (uninstall / forced logout).
    pub async fn delete_token(&self, member_id: &str) -> Result<(), ApiError> {
        self.kv
            .delete(&Self::key(member_id))
            .await
            .context("Failed to delete token record")?;
        Ok(())
    }
}
