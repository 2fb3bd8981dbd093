use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Advisory raised when a warehouse's stock breaches its reorder threshold.
///
/// Upserted on (product_id, warehouse_id) and deleted when stock recovers:
/// the registry reflects what is currently true, not an event log.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replenishment_alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub alert_id: String,
    pub product_id: String,
    pub product_name: String,
    pub warehouse_id: String,
    pub warehouse_name: String,
    /// Stock snapshot at evaluation time
    pub stock: i32,
    /// Suggested replenishment quantity (toward 90% capacity)
    pub suggested: i32,
    pub shortage_qty: i32,
    pub threshold: i32,
    pub trigger: String,
    pub level: String,
    pub level_label: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Alert severity stored in the `level` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }

    /// Display label shown to managers.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "Warning",
            Severity::Danger => "Urgent",
        }
    }
}
