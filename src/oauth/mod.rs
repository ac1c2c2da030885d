//! OAuth 2.0 authorization-code flow for connecting Bitrix24 portals.
//!
//! 1. `GET /auth/redirect?domain=` → state saved, redirect to the portal's
//!    authorization page
//! 2. Portal redirects back to `GET /auth/callback?code=&domain=&state=`
//! 3. State validated (fail closed), code exchanged server-to-server,
//!    token record stored keyed by the provider-returned member id,
//!    browser session established
//! 4. Refresh on demand replaces the record wholesale, only after a
//!    successful provider response

mod exchange;
mod provider;
mod state;

pub use exchange::{exchange_code, refresh_grant, TokenResponse};
pub use provider::{is_valid_portal_domain, ProviderConfig};
pub use state::StateStore;

use crate::credentials::TokenStore;
use crate::error::ApiError;
use crate::session::SessionStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of a completed callback: the tenant and their browser session.
pub struct CallbackOutcome {
    pub member_id: String,
    pub session_token: String,
}

/// Composes the state, token, and session stores into the full
/// authorization-code and refresh flow.
pub struct OAuthFlow {
    provider: ProviderConfig,
    states: StateStore,
    tokens: Arc<TokenStore>,
    sessions: Arc<SessionStore>,
    // Single-flight refresh per tenant: concurrent expired-token requests
    // wait on the same lock instead of issuing duplicate upstream refreshes
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OAuthFlow {
    pub fn new(
        provider: ProviderConfig,
        states: StateStore,
        tokens: Arc<TokenStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            provider,
            states,
            tokens,
            sessions,
            refresh_locks: DashMap::new(),
        }
    }

    /// Step 1: generate and persist a state value, return the portal's
    /// authorization URL.
    pub async fn authorize_url(&self, domain: &str) -> Result<String, ApiError> {
        if !is_valid_portal_domain(domain) {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not a valid portal domain",
                domain
            )));
        }

        let state = StateStore::generate();
        self.states.save(domain, &state).await?;

        info!(domain = %domain, "OAuth authorization requested");
        Ok(self.provider.build_authorize_url(domain, &state))
    }

    /// Step 2: validate the callback, exchange the code, persist the token
    /// record and establish a browser session.
    ///
    /// No partial state is committed: the token record is only written after
    /// a successful exchange.
    pub async fn handle_callback(
        &self,
        code: &str,
        domain: &str,
        state: &str,
    ) -> Result<CallbackOutcome, ApiError> {
        if !is_valid_portal_domain(domain) {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not a valid portal domain",
                domain
            )));
        }

        if !self.states.validate(domain, state).await? {
            warn!(domain = %domain, "OAuth state mismatch");
            return Err(ApiError::Unauthorized(
                "Invalid or expired OAuth state".to_string(),
            ));
        }

        let response = exchange_code(
            &self.provider.token_url(),
            &self.provider.client_id,
            &self.provider.client_secret,
            code,
        )
        .await?;

        let member_id = response.member_id.clone();
        let record = response.into_record(domain);
        self.tokens.save_token(&member_id, &record).await?;

        let session_token = self.sessions.create(&member_id, None).await?;

        info!(
            member_id = %member_id,
            domain = %record.domain,
            "OAuth flow completed"
        );

        Ok(CallbackOutcome {
            member_id,
            session_token,
        })
    }

    /// Step 3: replace the stored record via the refresh grant.
    ///
    /// Returns the new access token. Single-flight per tenant: a concurrent
    /// caller that finds a live record after waiting reuses it.
    pub async fn refresh(&self, member_id: &str) -> Result<String, ApiError> {
        let lock = self
            .refresh_locks
            .entry(member_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let record = self.tokens.get_token(member_id).await?.ok_or_else(|| {
            ApiError::Unauthorized(format!("No stored credential for member '{}'", member_id))
        })?;

        let response = refresh_grant(
            &self.provider.token_url(),
            &self.provider.client_id,
            &self.provider.client_secret,
            &record.refresh_token,
        )
        .await?;

        // Old record survives any failure above; overwrite only now
        let new_record = response.into_record(&record.domain);
        let access_token = new_record.access_token.clone();
        self.tokens.save_token(member_id, &new_record).await?;

        info!(member_id = %member_id, "Token record refreshed");
        Ok(access_token)
    }

    /// Guard-facing lookup: the live access token or an authorization error.
    pub async fn ensure_access_token(&self, member_id: &str) -> Result<String, ApiError> {
        match self.tokens.get_access_token(member_id).await? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::Unauthorized(format!(
                "No live access token for member '{}'",
                member_id
            ))),
        }
    }
}
