use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::errors::ServiceError;
use crate::AppState;

/// Liveness/readiness probe: verifies the database answers.
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    state.db.ping().await.map_err(ServiceError::DatabaseError)?;

    Ok(Json(json!({
        "status": "ok",
        "service": "retailnet-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
