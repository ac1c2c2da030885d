//! Inbound webhook endpoint and its audit-log listing.

use crate::api::AppState;
use crate::error::ApiError;
use crate::webhook::{Ack, WebhookLogEntry, WebhookPayload};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(rename = "memberId")]
    pub member_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub fn create_webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .route("/webhook/logs", get(list_logs))
        .with_state(state)
}

/// POST /webhook?token= - authenticate, enqueue, acknowledge
async fn receive_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<Ack>, ApiError> {
    let token = query.token.unwrap_or_default();
    let ack = state.webhooks.handle_event(payload, &token).await?;
    Ok(Json(ack))
}

/// GET /webhook/logs?memberId=&page=&limit= - audit records, newest first
async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<WebhookLogEntry>>, ApiError> {
    let page = query.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);

    let entries = state
        .audit_log
        .list(query.member_id.as_deref(), page, limit)?;
    Ok(Json(entries))
}
