use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Replenishment request from a warehouse toward its supplying tier.
///
/// `progress` is an append-only JSON log of [`ProgressStep`] entries, ordered
/// by append order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replenishment_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub request_id: String,
    pub product_id: String,
    pub product_name: String,
    pub vendor: String,
    pub quantity: i32,
    pub warehouse_id: String,
    pub warehouse_name: String,
    pub delivery_date: DateTimeUtc,
    pub reason: Option<String>,
    pub remark: Option<String>,
    pub status: String,
    pub progress: Json,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    InTransit,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Processing => "PROCESSING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::InTransit => "IN_TRANSIT",
        }
    }

    /// Statuses counted as "open" for the one-open-request-per-warehouse
    /// invariant. Must match the partial unique index predicate in the
    /// migrator.
    pub fn open() -> [&'static str; 3] {
        ["PENDING", "PROCESSING", "APPROVED"]
    }
}

/// One entry in a request's progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStep {
    pub title: String,
    pub desc: String,
    /// "completed" or "processing"
    pub status: String,
    pub timestamp: DateTimeUtc,
}

pub fn decode_progress(value: &Json) -> Vec<ProgressStep> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

pub fn encode_progress(steps: &[ProgressStep]) -> Json {
    serde_json::to_value(steps).unwrap_or(Json::Array(Vec::new()))
}
