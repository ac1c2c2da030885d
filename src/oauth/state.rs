//! OAuth anti-CSRF state, one in-flight value per portal domain.
//!
//! Saving overwrites any prior value for the domain. Validation is exact
//! string equality and never errors: absent and mismatched both mean false.

use crate::error::ApiError;
use crate::kv::KvStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const STATE_KEY_PREFIX: &str = "state:";

/// States expire after 10 minutes
const STATE_TTL: Duration = Duration::from_secs(600);

pub struct StateStore {
    kv: Arc<dyn KvStore>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(domain: &str) -> String {
        format!("{}{}", STATE_KEY_PREFIX, domain)
    }

    /// Generates a fresh state value (UUIDv4).
    pub fn generate() -> String {
        Uuid::new_v4().to_string()
    }

    /// Stores `state` for `domain`, replacing any in-flight value.
    pub async fn save(&self, domain: &str, state: &str) -> Result<(), ApiError> {
        self.kv
            .set_ex(&Self::key(domain), state, STATE_TTL)
            .await
            .context("Failed to store OAuth state")?;
        Ok(())
    }

    /// True only if a stored value exists for `domain` and exactly equals
    /// `incoming`. No stored value or a mismatch both validate to false.
    pub async fn validate(&self, domain: &str, incoming: &str) -> Result<bool, ApiError> {
        let stored = self
            .kv
            .get(&Self::key(domain))
            .await
            .context("Failed to read OAuth state")?;

        Ok(stored.as_deref() == Some(incoming))
    }
}
