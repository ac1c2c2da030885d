//! Client-facing error taxonomy.
//!
//! Every failure that reaches the HTTP surface maps onto one of these
//! variants with a stable status code. Startup/configuration failures are
//! not represented here; those abort the process via `anyhow` in `main`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for all API endpoints
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: bad domain, bad body, bad query params (400)
    BadRequest(String),
    /// Missing/invalid tenant header, session, token, or webhook secret (401)
    Unauthorized(String),
    /// Resource not found (404)
    NotFound(String),
    /// The CRM provider returned a structured error or unexpected shape (502)
    Upstream(String),
    /// Cache store, queue, or other infrastructure failure (500)
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Upstream(msg) => write!(f, "Upstream API error: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
