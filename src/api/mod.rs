//! HTTP API surface.
//!
//! Each concern gets its own router; `create_app` merges them under one
//! shared state and the CORS layer.

pub mod analytics;
pub mod auth;
pub mod guard;
pub mod leads;
pub mod webhook;

pub use analytics::create_analytics_router;
pub use auth::create_auth_router;
pub use guard::{member_id_from_headers, TenantAccess, MEMBER_ID_HEADER};
pub use leads::create_leads_router;
pub use webhook::create_webhook_router;

use crate::credentials::TokenStore;
use crate::oauth::OAuthFlow;
use crate::services::{AnalyticsService, LeadService};
use crate::session::SessionStore;
use crate::webhook::{WebhookDispatcher, WebhookLogStore};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state for all routers
#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthFlow>,
    pub tokens: Arc<TokenStore>,
    pub sessions: Arc<SessionStore>,
    pub leads: Arc<LeadService>,
    pub analytics: Arc<AnalyticsService>,
    pub webhooks: Arc<WebhookDispatcher>,
    pub audit_log: Arc<WebhookLogStore>,
    /// Frontend base URL the OAuth callback redirects back to
    pub client_base_url: String,
}

/// Assemble the full application router.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(create_auth_router(state.clone()))
        .merge(create_leads_router(state.clone()))
        .merge(create_analytics_router(state.clone()))
        .merge(create_webhook_router(state))
        .layer(cors)
}
