// Integration tests for the analytics endpoints.

use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

mod common;
use common::{deal, lead, test_app, StubCrm};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_lead_stats_aggregates_funnel() {
    let ctx = test_app(StubCrm::new(
        vec![
            lead("1", "NEW"),
            lead("2", "NEW"),
            lead("3", "IN_PROGRESS"),
            lead("4", "QUALIFIED"),
        ],
        vec![deal(Some("1"), "0"), deal(Some("3"), "0"), deal(None, "0")],
        vec![],
    ))
    .await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/analytics/leads?memberId=m1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "leadByStatus": { "NEW": 2, "IN_PROGRESS": 1, "QUALIFIED": 1 },
            "totalLeads": 4,
            "convertedLeads": 2,
            "conversionRate": 0.5,
        })
    );
}

#[tokio::test]
async fn test_lead_stats_are_cached() {
    let ctx = test_app(StubCrm::new(
        vec![lead("1", "NEW")],
        vec![],
        vec![],
    ))
    .await;

    for _ in 0..2 {
        let response = ctx
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/analytics/leads?memberId=m1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(ctx.crm.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deal_stats_with_no_deals_zero_fills_the_week() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/analytics/deals?memberId=m1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // Window anchored on the fixed test clock (2026-08-23)
    assert_eq!(
        body_json(response).await,
        json!({
            "totalRevenue": 0.0,
            "revenueByDate": {
                "2026-08-17": 0.0,
                "2026-08-18": 0.0,
                "2026-08-19": 0.0,
                "2026-08-20": 0.0,
                "2026-08-21": 0.0,
                "2026-08-22": 0.0,
                "2026-08-23": 0.0,
            },
        })
    );
}

#[tokio::test]
async fn test_task_stats_groups_by_status() {
    use b24_bridge::bitrix::TaskItem;

    let task = |id: &str, status: &str| TaskItem {
        id: id.to_string(),
        title: None,
        status: Some(status.to_string()),
        responsible_id: None,
    };
    let ctx = test_app(StubCrm::new(
        vec![],
        vec![],
        vec![task("1", "2"), task("2", "5"), task("3", "2")],
    ))
    .await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/analytics/task?memberId=m1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "totalTasks": 3,
            "tasksByStatus": { "2": 2, "5": 1 },
        })
    );
}

#[tokio::test]
async fn test_missing_member_id_is_bad_request() {
    let ctx = test_app(StubCrm::empty()).await;

    for uri in ["/analytics/leads", "/analytics/deals", "/analytics/task"] {
        let response = ctx
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_unknown_tenant_is_unauthorized() {
    let ctx = test_app(StubCrm::empty()).await;

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/analytics/leads?memberId=stranger")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
