//! Encrypted credential storage for Bitrix24 OAuth tokens.
//!
//! The token record for each tenant (member id) is encrypted as one opaque
//! blob with AES-256-GCM and persisted in the shared KV store with a TTL
//! equal to the lifetime the provider granted. After expiry the record is
//! absent, not stale.

mod encryption;
mod store;

pub use encryption::{decrypt, encrypt, validate_key};
pub use store::TokenStore;

use serde::{Deserialize, Serialize};

/// The OAuth credential bundle for one connected CRM portal.
///
/// Created on authorization-code exchange and replaced wholesale on refresh.
/// Never exposed raw through public API responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token for REST calls
    pub access_token: String,

    /// Used to obtain a replacement record before expiry
    pub refresh_token: String,

    /// Lifetime in seconds granted by the provider; doubles as the store TTL
    pub expires_in: u64,

    /// Portal domain the record is bound to (e.g. "acme.bitrix24.com")
    pub domain: String,
}
