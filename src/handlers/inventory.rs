use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::inventory::{AdjustInventoryCommand, TransferStockCommand};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustInventoryRequest {
    #[validate(length(min = 1))]
    pub product_sku: String,
    pub product_name: Option<String>,
    #[validate(length(min = 1))]
    pub location_id: String,
    pub location_name: Option<String>,
    pub delta: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferStockRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    pub product_name: Option<String>,
    #[validate(length(min = 1))]
    pub from_location_id: String,
    #[validate(length(min = 1))]
    pub to_location_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShipStockRequest {
    #[validate(length(min = 1))]
    pub product_sku: String,
    pub product_name: Option<String>,
    #[validate(length(min = 1))]
    pub store_id: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct ShipStockResponse {
    pub record: crate::entities::inventory_record::Model,
    pub shipped_from: String,
}

/// Create the inventory router
pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inventory))
        .route("/adjust", post(adjust_inventory))
        .route("/transfer", post(transfer_stock))
        .route("/ship", post(ship_stock))
        .route("/:location_id", get(list_by_location))
        .route("/:location_id/:product_id", get(get_record))
}

/// The sole external entry point for stock mutation.
async fn adjust_inventory(
    State(state): State<AppState>,
    Json(payload): Json<AdjustInventoryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let record = state
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: payload.product_sku,
            product_name: payload.product_name,
            location_id: payload.location_id,
            location_name: payload.location_name,
            delta: payload.delta,
        })
        .await?;

    Ok(Json(record))
}

/// Ad-hoc two-location atomic move, outside the transfer-order workflow.
async fn transfer_stock(
    State(state): State<AppState>,
    Json(payload): Json<TransferStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let transfer = state
        .services
        .inventory
        .transfer_stock(TransferStockCommand {
            product_id: payload.product_id,
            product_name: payload.product_name,
            from_location_id: payload.from_location_id,
            to_location_id: payload.to_location_id,
            quantity: payload.quantity,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "from": transfer.from,
        "to": transfer.to,
    })))
}

/// Shipment debit with sequential same-region fallback.
async fn ship_stock(
    State(state): State<AppState>,
    Json(payload): Json<ShipStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let outcome = state
        .services
        .inventory
        .ship_with_fallback(
            &payload.product_sku,
            payload.product_name.as_deref(),
            &payload.store_id,
            payload.quantity,
        )
        .await?;

    Ok(Json(ShipStockResponse {
        record: outcome.record,
        shipped_from: outcome.shipped_from,
    }))
}

async fn list_inventory(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state.services.inventory.list_inventory().await?;
    Ok(Json(records))
}

async fn list_by_location(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state
        .services
        .inventory
        .list_by_location(&location_id)
        .await?;
    Ok(Json(records))
}

async fn get_record(
    State(state): State<AppState>,
    Path((location_id, product_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state
        .services
        .inventory
        .get_inventory(&product_id, &location_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "no inventory for {} at {}",
                product_id, location_id
            ))
        })?;
    Ok(Json(record))
}
