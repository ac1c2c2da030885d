// Integration tests for the auth endpoints and the tenant guard.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{test_app, StubCrm};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_redirect_sends_browser_to_portal() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/redirect?domain=acme.bitrix24.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://acme.bitrix24.com/oauth/authorize/"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn test_redirect_rejects_unknown_domain() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/redirect?domain=evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_redirect_requires_domain_parameter() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/redirect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_bad_state_fails_closed() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=c&domain=acme.bitrix24.com&state=forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_domain_lookup_fails_closed_for_unknown_tenant() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/domain")
                .header("x-member-id", "unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_domain_lookup_returns_stored_domain() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/domain")
                .header("x-member-id", "m1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "domain": "acme.bitrix24.com" })
    );
}

#[tokio::test]
async fn test_token_lookup_fails_open_for_unknown_tenant() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/token")
                .header("x-member-id", "unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Asymmetric with /auth/domain: absence is a null token, not an error
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "accessToken": null }));
}

#[tokio::test]
async fn test_token_lookup_returns_live_token() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/token")
                .header("x-member-id", "m1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({ "accessToken": "live-token" })
    );
}

#[tokio::test]
async fn test_session_roundtrip_and_logout() {
    let ctx = test_app(StubCrm::empty()).await;
    let token = ctx.sessions.create("m1", None).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::COOKIE, format!("session_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "memberId": "m1" }));

    // Logout destroys the session and clears the cookie
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/auth/session")
                .header(header::COOKIE, format!("session_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::COOKIE, format!("session_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_without_cookie_is_unauthorized() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guard_rejects_missing_tenant_header() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/leads")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guard_rejects_tenant_without_token() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/leads")
                .header("x-member-id", "unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
