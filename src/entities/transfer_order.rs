use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Physical stock movement between two locations.
///
/// Two creation paths exist: PENDING (inventory untouched until dispatch) and
/// already-IN_TRANSIT (manual allocation, source debited at creation).
/// `inventory_updated` records whether the source debit has happened.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub transfer_id: String,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub from_location_id: String,
    pub from_location_name: String,
    pub to_location_id: String,
    pub to_location_name: String,
    pub status: String,
    pub history: Json,
    pub inventory_updated: bool,
    /// Originating replenishment request, when the transfer fulfils one
    pub request_id: Option<String>,
    pub carrier: Option<String>,
    pub departed_at: Option<DateTimeUtc>,
    pub dispatch_remark: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Received,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Received => "RECEIVED",
        }
    }

    /// Statuses counted as "open" for the one-open-transfer-per-route
    /// invariant. Must match the partial unique index predicate in the
    /// migrator.
    pub fn open() -> [&'static str; 2] {
        ["PENDING", "IN_TRANSIT"]
    }
}

/// One entry in a transfer order's history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: String,
    pub note: String,
    pub created_at: DateTimeUtc,
}

pub fn decode_history(value: &Json) -> Vec<HistoryEntry> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

pub fn encode_history(entries: &[HistoryEntry]) -> Json {
    serde_json::to_value(entries).unwrap_or(Json::Array(Vec::new()))
}
