use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::replenishment::SubmitRequestCommand;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AlertFilters {
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestFilters {
    pub status: Option<String>,
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequestPayload {
    pub alert_id: Option<String>,
    #[validate(length(min = 1))]
    pub product_id: String,
    pub product_name: Option<String>,
    #[validate(length(min = 1))]
    pub vendor: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub delivery_date: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub warehouse_id: String,
    #[validate(length(min = 1))]
    pub warehouse_name: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub decision: String,
    pub remark: Option<String>,
}

/// Create the replenishment router
pub fn replenishment_router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/sweep", post(sweep_alerts))
        .route("/requests", get(list_requests).post(submit_request))
        .route("/requests/:request_id/decision", post(decide_request))
        .route("/progress", get(progress_feed))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(filters): Query<AlertFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let alerts = state
        .services
        .replenishment
        .list_alerts(filters.warehouse_id.as_deref())
        .await?;
    Ok(Json(alerts))
}

/// Reconciles alerts with current stock across the configured network.
async fn sweep_alerts(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let alerts = state.services.replenishment.sweep_low_stock().await?;
    Ok(Json(serde_json::json!({
        "message": "Inventory check completed",
        "alerts_live": alerts.len(),
        "alerts": alerts,
    })))
}

async fn submit_request(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequestPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let request = state
        .services
        .replenishment
        .submit_request(SubmitRequestCommand {
            alert_id: payload.alert_id,
            product_id: payload.product_id,
            product_name: payload.product_name,
            vendor: payload.vendor,
            quantity: payload.quantity,
            delivery_date: payload.delivery_date,
            remark: payload.remark,
            warehouse_id: payload.warehouse_id,
            warehouse_name: payload.warehouse_name,
            reason: payload.reason,
        })
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(request)))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(filters): Query<RequestFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = state
        .services
        .replenishment
        .list_requests(filters.status.as_deref(), filters.warehouse_id.as_deref())
        .await?;
    Ok(Json(requests))
}

async fn decide_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<DecisionPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = state
        .services
        .replenishment
        .decide(&request_id, &payload.decision, payload.remark)
        .await?;
    Ok(Json(request))
}

async fn progress_feed(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let feed = state.services.replenishment.progress_feed().await?;
    Ok(Json(feed))
}
