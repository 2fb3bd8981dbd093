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
use crate::services::transfers::{CreateTransferCommand, DispatchCommand};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferPayload {
    #[validate(length(min = 1))]
    pub product_sku: String,
    pub product_name: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1))]
    pub from_location_id: String,
    pub from_location_name: Option<String>,
    #[validate(length(min = 1))]
    pub to_location_id: String,
    pub to_location_name: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchPayload {
    pub carrier: String,
    pub departure: DateTime<Utc>,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferFilters {
    pub location_id: Option<String>,
    pub status: Option<String>,
}

/// Create the transfer-orders router
pub fn transfer_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_pending))
        .route("/allocate", post(create_dispatched))
        .route("/:transfer_id", get(get_transfer))
        .route("/:transfer_id/dispatch", post(dispatch_transfer))
}

impl CreateTransferPayload {
    fn into_command(self) -> CreateTransferCommand {
        CreateTransferCommand {
            product_sku: self.product_sku,
            product_name: self.product_name,
            quantity: self.quantity,
            from_location_id: self.from_location_id,
            from_location_name: self.from_location_name,
            to_location_id: self.to_location_id,
            to_location_name: self.to_location_name,
            request_id: self.request_id,
        }
    }
}

/// Books a transfer that waits for dispatch confirmation; inventory moves
/// later.
async fn create_pending(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let transfer = state
        .services
        .transfers
        .create_pending(payload.into_command())
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(transfer)))
}

/// Manual allocation: source debited and the order starts in transit.
async fn create_dispatched(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let transfer = state
        .services
        .transfers
        .create_dispatched(payload.into_command())
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(transfer)))
}

async fn dispatch_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Json(payload): Json<DispatchPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state
        .services
        .transfers
        .dispatch(
            &transfer_id,
            DispatchCommand {
                carrier: payload.carrier,
                departure: payload.departure,
                remark: payload.remark,
            },
        )
        .await?;
    Ok(Json(transfer))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.get(&transfer_id).await?;
    Ok(Json(transfer))
}

async fn list_transfers(
    State(state): State<AppState>,
    Query(filters): Query<TransferFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfers = state
        .services
        .transfers
        .list(filters.location_id.as_deref(), filters.status.as_deref())
        .await?;
    Ok(Json(transfers))
}
