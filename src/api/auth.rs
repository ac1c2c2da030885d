//! Auth endpoints: OAuth redirect/callback plus session and token lookups.

use crate::api::guard::member_id_from_headers;
use crate::api::AppState;
use crate::error::ApiError;
use crate::session::DEFAULT_SESSION_TTL_SECS;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

const SESSION_COOKIE: &str = "session_token";

#[derive(Deserialize)]
pub struct RedirectQuery {
    pub domain: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub domain: Option<String>,
    pub state: Option<String>,
}

#[derive(Serialize)]
struct SessionResponse {
    #[serde(rename = "memberId")]
    member_id: String,
}

pub fn create_auth_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/redirect", get(oauth_redirect))
        .route("/auth/callback", get(oauth_callback))
        .route("/auth/domain", get(get_domain))
        .route("/auth/token", get(get_token))
        .route(
            "/auth/session",
            get(get_session).delete(delete_session),
        )
        .with_state(state)
}

/// GET /auth/redirect?domain= - 302 to the portal's authorization page
async fn oauth_redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Result<Redirect, ApiError> {
    let domain = query
        .domain
        .ok_or_else(|| ApiError::BadRequest("domain query parameter is required".to_string()))?;

    let url = state.oauth.authorize_url(&domain).await?;
    Ok(Redirect::temporary(&url))
}

/// GET /auth/callback?code=&domain=&state= - complete the flow, set the
/// session cookie and send the browser back to the client app
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let code = query
        .code
        .ok_or_else(|| ApiError::BadRequest("code query parameter is required".to_string()))?;
    let domain = query
        .domain
        .ok_or_else(|| ApiError::BadRequest("domain query parameter is required".to_string()))?;
    let oauth_state = query
        .state
        .ok_or_else(|| ApiError::BadRequest("state query parameter is required".to_string()))?;

    let outcome = state
        .oauth
        .handle_callback(&code, &domain, &oauth_state)
        .await?;

    info!(member_id = %outcome.member_id, "Portal connected, session established");

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}",
        SESSION_COOKIE, outcome.session_token, DEFAULT_SESSION_TTL_SECS
    );
    let mut response = Redirect::temporary(&state.client_base_url).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::Internal(format!("Invalid session cookie: {}", e)))?,
    );
    Ok(response)
}

/// GET /auth/domain - the portal domain for the tenant header (fail closed)
async fn get_domain(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let member_id = member_id_from_headers(&headers)?;
    let domain = state.tokens.get_domain(&member_id).await?;
    Ok(Json(json!({ "domain": domain })))
}

/// GET /auth/token - the live access token for the tenant header, or null
/// when absent (fail open)
async fn get_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let member_id = member_id_from_headers(&headers)?;
    let token = state.tokens.get_access_token(&member_id).await?;
    Ok(Json(json!({ "accessToken": token })))
}

/// GET /auth/session - resolve the session cookie to its member id
async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = session_cookie_from_headers(&headers)?;
    let member_id = state.sessions.resolve(&token).await?;
    Ok(Json(SessionResponse { member_id }))
}

/// DELETE /auth/session - logout: destroy the session and clear the cookie
async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Ok(token) = session_cookie_from_headers(&headers) {
        state.sessions.destroy(&token).await?;
    }

    let mut response = Json(json!({ "success": true })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session_token=; HttpOnly; Path=/; Max-Age=0"),
    );
    Ok(response)
}

/// Pulls the session token out of the Cookie header.
fn session_cookie_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    let raw = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing session cookie".to_string()))?;

    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| ApiError::Unauthorized("Missing session cookie".to_string()))
}
