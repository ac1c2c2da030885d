//! Analytics endpoints. The tenant comes from the `memberId` query
//! parameter; a missing parameter is a validation error, not an
//! authorization one.

use crate::api::AppState;
use crate::error::ApiError;
use crate::services::{DealStats, LeadStats, TaskStats};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    #[serde(rename = "memberId")]
    pub member_id: Option<String>,
}

impl AnalyticsQuery {
    fn member_id(self) -> Result<String, ApiError> {
        self.member_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("memberId query parameter is required".to_string())
            })
    }
}

pub fn create_analytics_router(state: AppState) -> Router {
    Router::new()
        .route("/analytics/leads", get(lead_stats))
        .route("/analytics/deals", get(deal_stats))
        .route("/analytics/task", get(task_stats))
        .with_state(state)
}

/// GET /analytics/leads?memberId=
async fn lead_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<LeadStats>, ApiError> {
    let member_id = query.member_id()?;
    Ok(Json(state.analytics.lead_stats(&member_id).await?))
}

/// GET /analytics/deals?memberId=
async fn deal_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<DealStats>, ApiError> {
    let member_id = query.member_id()?;
    Ok(Json(state.analytics.deal_stats(&member_id).await?))
}

/// GET /analytics/task?memberId=
async fn task_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<TaskStats>, ApiError> {
    let member_id = query.member_id()?;
    Ok(Json(state.analytics.task_stats(&member_id).await?))
}
