use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-location stock counters, keyed by (product_id, location_id).
///
/// `available` is only ever mutated through the adjustment orchestrator and
/// satisfies `0 <= available <= total_stock` at all times.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: String,
    pub product_name: String,
    pub location_id: String,
    pub location_name: String,
    pub region: Option<String>,
    pub total_stock: i32,
    pub available: i32,
    pub min_threshold: i32,
    pub max_threshold: i32,
    pub last_updated: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
