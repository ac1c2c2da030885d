//! Lead CRUD endpoints, all behind the tenant guard.

use crate::api::guard::{tenant_guard, TenantAccess};
use crate::api::AppState;
use crate::bitrix::LeadFields;
use crate::error::ApiError;
use crate::services::LeadsQuery;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, patch},
    Extension, Router,
};
use serde_json::json;

pub fn create_leads_router(state: AppState) -> Router {
    Router::new()
        .route("/leads", get(list_leads).post(create_lead))
        .route("/leads/:id", patch(update_lead).delete(delete_lead))
        .layer(middleware::from_fn_with_state(state.clone(), tenant_guard))
        .with_state(state)
}

/// GET /leads - cached, filtered lead page
async fn list_leads(
    State(state): State<AppState>,
    Extension(access): Extension<TenantAccess>,
    Query(query): Query<LeadsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (filters, page, limit) = query.into_parts();
    let result = state
        .leads
        .get_leads(
            &access.member_id,
            &access.access_token,
            &filters,
            page,
            limit,
        )
        .await?;
    Ok(Json(serde_json::to_value(result).map_err(|e| {
        ApiError::Internal(format!("Failed to serialize lead page: {}", e))
    })?))
}

/// POST /leads - create, invalidating the tenant's cache
async fn create_lead(
    State(state): State<AppState>,
    Extension(access): Extension<TenantAccess>,
    Json(fields): Json<LeadFields>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let id = state
        .leads
        .create_lead(&access.member_id, &access.access_token, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// PATCH /leads/:id
async fn update_lead(
    State(state): State<AppState>,
    Extension(access): Extension<TenantAccess>,
    Path(id): Path<i64>,
    Json(fields): Json<LeadFields>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .leads
        .update_lead(&access.member_id, &access.access_token, id, &fields)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /leads/:id
async fn delete_lead(
    State(state): State<AppState>,
    Extension(access): Extension<TenantAccess>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .leads
        .delete_lead(&access.member_id, &access.access_token, id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
