//! Bitrix24 OAuth provider configuration.
//!
//! Portal domains are validated against the known hosting suffixes before
//! any URL is built from them; untrusted domain strings never reach an
//! outbound request unchecked.

use serde::{Deserialize, Serialize};

/// Hosting suffixes a tenant portal domain may end with
const PORTAL_SUFFIXES: &[&str] = &[
    ".bitrix24.com",
    ".bitrix24.ru",
    ".bitrix24.eu",
    ".bitrix24.de",
    ".bitrix24.fr",
    ".bitrix24.pl",
];

/// OAuth provider configuration (client credentials from environment)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Token endpoint base URL (e.g. "https://oauth.bitrix.info")
    pub oauth_base_url: String,

    /// Application client ID
    pub client_id: String,

    /// Application client secret
    pub client_secret: String,
}

impl ProviderConfig {
    /// Token exchange endpoint for both grant types.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token/", self.oauth_base_url.trim_end_matches('/'))
    }

    /// Authorization URL on the tenant's own portal, embedding client id and
    /// the anti-CSRF state. The domain must already be validated.
    pub fn build_authorize_url(&self, domain: &str, state: &str) -> String {
        format!(
            "https://{}/oauth/authorize/?client_id={}&state={}&response_type=code",
            domain,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(state)
        )
    }
}

/// Check that a tenant domain ends in a recognized hosting suffix and has a
/// non-empty portal name before it.
pub fn is_valid_portal_domain(domain: &str) -> bool {
    if domain.contains('/') || domain.contains('?') || domain.contains('#') {
        return false;
    }
    PORTAL_SUFFIXES.iter().any(|suffix| {
        domain.ends_with(suffix) && domain.len() > suffix.len()
    })
}
