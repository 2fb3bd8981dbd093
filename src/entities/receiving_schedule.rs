use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inbound handling plan created alongside a manually-allocated transfer so
/// the destination can schedule receiving.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receiving_schedules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Matches the transfer id of the originating transfer order
    pub plan_no: String,
    pub supplier: String,
    pub eta: DateTimeUtc,
    pub dock: String,
    pub items: i32,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub storage_location_id: String,
    pub quality_level: String,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
