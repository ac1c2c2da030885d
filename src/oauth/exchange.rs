//! Token endpoint calls: authorization-code exchange and refresh grant.

use crate::credentials::TokenRecord;
use crate::error::ApiError;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Token endpoint response (Bitrix returns the tenant id alongside the
/// standard OAuth fields)
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    pub member_id: String,
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

impl TokenResponse {
    /// Shapes the provider response into a stored record. `fallback_domain`
    /// covers providers that omit the domain field on refresh.
    pub fn into_record(self, fallback_domain: &str) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            domain: self.domain.unwrap_or_else(|| fallback_domain.to_string()),
        }
    }
}

/// Exchange an authorization code for a token record.
pub async fn exchange_code(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<TokenResponse, ApiError> {
    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);
    form.insert("code", code);

    debug!("Exchanging authorization code at {}", token_url);
    post_token_request(token_url, &form).await
}

/// Request a replacement token record using a refresh token.
pub async fn refresh_grant(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse, ApiError> {
    let mut form = HashMap::new();
    form.insert("grant_type", "refresh_token");
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);
    form.insert("refresh_token", refresh_token);

    debug!("Requesting token refresh at {}", token_url);
    post_token_request(token_url, &form).await
}

async fn post_token_request(
    token_url: &str,
    form: &HashMap<&str, &str>,
) -> Result<TokenResponse, ApiError> {
    let client = reqwest::Client::new();

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ApiError::Upstream(format!(
            "Token endpoint returned {}: {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Malformed token response: {}", e)))?;

    debug!(
        member_id = %token_response.member_id,
        expires_in = token_response.expires_in,
        "Token grant successful"
    );
    Ok(token_response)
}
