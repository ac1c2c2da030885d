//! Tenant access guard for CRM routes.
//!
//! Requests carry the tenant in the `x-member-id` header. The guard resolves
//! a live access token for that tenant before the handler runs and stashes
//! the member id and the token in request extensions.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// Authenticated tenant plus the access token the guard resolved for it,
/// inserted into request extensions for downstream handlers.
#[derive(Clone, Debug)]
pub struct TenantAccess {
    pub member_id: String,
    pub access_token: String,
}

/// Extracts the tenant id from the headers. Missing or empty is an
/// authorization failure, detected before any upstream call.
pub fn member_id_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(MEMBER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", MEMBER_ID_HEADER)))
}

pub async fn tenant_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let member_id = member_id_from_headers(request.headers())?;
    let access_token = state.oauth.ensure_access_token(&member_id).await?;

    request.extensions_mut().insert(TenantAccess {
        member_id,
        access_token,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_member_id_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(MEMBER_ID_HEADER, HeaderValue::from_static("m1"));
        assert_eq!(member_id_from_headers(&headers).unwrap(), "m1");
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        let result = member_id_from_headers(&headers);
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_blank_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(MEMBER_ID_HEADER, HeaderValue::from_static("   "));
        assert!(member_id_from_headers(&headers).is_err());
    }
}
