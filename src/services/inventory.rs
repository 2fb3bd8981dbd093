//! Inventory ledger and the adjustment orchestrator.
//!
//! Every stock mutation in the system funnels through
//! [`InventoryService::adjust_inventory`] (or the helpers built on it), which
//! applies the delta and drives the replenishment cascade inside one
//! transaction.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, instrument};

use crate::config::NetworkConfig;
use crate::db::{is_unique_violation, DbPool};
use crate::entities::inventory_record::{self, Entity as InventoryRecords};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::replenishment::{self, AlertSpec, RequestSpec};
use crate::services::transfers::{self, OpenTransferOutcome, TransferSpec};

/// Command for the single external stock-mutation entry point.
#[derive(Debug, Clone)]
pub struct AdjustInventoryCommand {
    pub product_sku: String,
    pub product_name: Option<String>,
    pub location_id: String,
    pub location_name: Option<String>,
    pub delta: i32,
}

/// Command for an ad-hoc two-location stock move.
#[derive(Debug, Clone)]
pub struct TransferStockCommand {
    pub product_id: String,
    pub product_name: Option<String>,
    pub from_location_id: String,
    pub to_location_id: String,
    pub quantity: i32,
}

/// Result of a two-location move: both sides after the transfer.
#[derive(Debug, Clone)]
pub struct StockTransfer {
    pub from: inventory_record::Model,
    pub to: inventory_record::Model,
}

/// Result of a shipment debit, reporting where stock actually came from.
#[derive(Debug, Clone)]
pub struct ShipmentOutcome {
    pub record: inventory_record::Model,
    pub shipped_from: String,
}

/// Service owning the inventory ledger and the replenishment cascade.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    network: Arc<NetworkConfig>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>, network: Arc<NetworkConfig>, event_sender: EventSender) -> Self {
        Self {
            db,
            network,
            event_sender,
        }
    }

    /// Applies a stock delta to (product, location), creating the record with
    /// tier defaults when absent, then runs the replenishment cascade.
    ///
    /// The ledger update and every cascade step share one transaction: a
    /// failed delta leaves no cascade artifacts behind.
    #[instrument(skip(self))]
    pub async fn adjust_inventory(
        &self,
        command: AdjustInventoryCommand,
    ) -> Result<inventory_record::Model, ServiceError> {
        if command.product_sku.trim().is_empty() || command.location_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "product_sku and location_id are required for inventory adjustment".into(),
            ));
        }
        if command.delta == 0 {
            return Err(ServiceError::ValidationError(
                "delta must be non-zero".into(),
            ));
        }

        let network = self.network.clone();
        let cmd = command.clone();

        let (record, events) = self
            .db
            .transaction::<_, (inventory_record::Model, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = upsert_and_adjust(
                        txn,
                        &network,
                        &cmd.product_sku,
                        cmd.product_name.as_deref(),
                        &cmd.location_id,
                        cmd.location_name.as_deref(),
                        cmd.delta,
                    )
                    .await?;

                    let mut events = vec![Event::InventoryAdjusted {
                        product_id: record.product_id.clone(),
                        location_id: record.location_id.clone(),
                        delta: cmd.delta,
                        available: record.available,
                    }];
                    run_cascade(txn, &network, &record, &mut events).await?;

                    Ok((record, events))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(record)
    }

    /// Moves `quantity` units between two locations atomically, outside the
    /// transfer-order workflow. Both sides cascade.
    #[instrument(skip(self))]
    pub async fn transfer_stock(
        &self,
        command: TransferStockCommand,
    ) -> Result<StockTransfer, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than 0".into(),
            ));
        }
        if command.from_location_id == command.to_location_id {
            return Err(ServiceError::ValidationError(
                "from and to locations must differ".into(),
            ));
        }
        if command.product_id.trim().is_empty()
            || command.from_location_id.trim().is_empty()
            || command.to_location_id.trim().is_empty()
        {
            return Err(ServiceError::ValidationError(
                "product_id, from_location_id and to_location_id are required".into(),
            ));
        }

        let network = self.network.clone();
        let cmd = command.clone();

        let (transfer, mut events) = self
            .db
            .transaction::<_, (StockTransfer, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut events = Vec::new();

                    let from = upsert_and_adjust(
                        txn,
                        &network,
                        &cmd.product_id,
                        cmd.product_name.as_deref(),
                        &cmd.from_location_id,
                        None,
                        -cmd.quantity,
                    )
                    .await?;
                    run_cascade(txn, &network, &from, &mut events).await?;

                    let to = upsert_and_adjust(
                        txn,
                        &network,
                        &cmd.product_id,
                        cmd.product_name.as_deref(),
                        &cmd.to_location_id,
                        None,
                        cmd.quantity,
                    )
                    .await?;
                    run_cascade(txn, &network, &to, &mut events).await?;

                    Ok((StockTransfer { from, to }, events))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        events.insert(
            0,
            Event::StockTransferred {
                product_id: command.product_id.clone(),
                from_location_id: command.from_location_id.clone(),
                to_location_id: command.to_location_id.clone(),
                quantity: command.quantity,
            },
        );
        self.event_sender.send_all_logged(events).await;

        Ok(transfer)
    }

    /// Debits a store for an outbound shipment, falling back sequentially to
    /// sibling stores in the same region when the assigned store is short.
    ///
    /// The search stops at the first store with sufficient stock; each
    /// attempt is its own adjustment so a successful debit is never held
    /// while later stores are probed.
    #[instrument(skip(self))]
    pub async fn ship_with_fallback(
        &self,
        product_sku: &str,
        product_name: Option<&str>,
        store_id: &str,
        quantity: i32,
    ) -> Result<ShipmentOutcome, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than 0".into(),
            ));
        }

        let primary = self
            .adjust_inventory(AdjustInventoryCommand {
                product_sku: product_sku.to_string(),
                product_name: product_name.map(str::to_string),
                location_id: store_id.to_string(),
                location_name: None,
                delta: -quantity,
            })
            .await;

        let first_err = match primary {
            Ok(record) => {
                return Ok(ShipmentOutcome {
                    record,
                    shipped_from: store_id.to_string(),
                })
            }
            Err(err @ ServiceError::InsufficientStock(_)) => err,
            Err(other) => return Err(other),
        };

        for sibling in self.network.sibling_stores(store_id) {
            if sibling == store_id {
                continue;
            }

            // Probe before debiting so a short sibling is skipped without
            // burning an adjustment attempt.
            let has_stock = self
                .get_inventory(product_sku, &sibling)
                .await?
                .map(|r| r.available >= quantity)
                .unwrap_or(false);
            if !has_stock {
                continue;
            }

            info!(
                product_sku,
                store_id, fallback = %sibling, "Shipping from sibling store"
            );
            match self
                .adjust_inventory(AdjustInventoryCommand {
                    product_sku: product_sku.to_string(),
                    product_name: product_name.map(str::to_string),
                    location_id: sibling.clone(),
                    location_name: None,
                    delta: -quantity,
                })
                .await
            {
                Ok(record) => {
                    return Ok(ShipmentOutcome {
                        record,
                        shipped_from: sibling,
                    })
                }
                // Lost the stock to a concurrent shipment; keep searching.
                Err(ServiceError::InsufficientStock(_)) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(first_err)
    }

    #[instrument(skip(self))]
    pub async fn get_inventory(
        &self,
        product_id: &str,
        location_id: &str,
    ) -> Result<Option<inventory_record::Model>, ServiceError> {
        let record = InventoryRecords::find()
            .filter(inventory_record::Column::ProductId.eq(product_id))
            .filter(inventory_record::Column::LocationId.eq(location_id))
            .one(self.db.as_ref())
            .await?;
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn list_inventory(&self) -> Result<Vec<inventory_record::Model>, ServiceError> {
        let records = InventoryRecords::find()
            .order_by_asc(inventory_record::Column::ProductId)
            .order_by_asc(inventory_record::Column::LocationId)
            .all(self.db.as_ref())
            .await?;
        Ok(records)
    }

    #[instrument(skip(self))]
    pub async fn list_by_location(
        &self,
        location_id: &str,
    ) -> Result<Vec<inventory_record::Model>, ServiceError> {
        let records = InventoryRecords::find()
            .filter(inventory_record::Column::LocationId.eq(location_id))
            .order_by_asc(inventory_record::Column::ProductId)
            .all(self.db.as_ref())
            .await?;
        Ok(records)
    }
}

/// Atomically applies `delta` to the (product, location) counter, creating
/// the record with tier defaults when absent.
///
/// The increment is a single conditional UPDATE so concurrent adjustments
/// serialize at the storage layer instead of racing through stale reads.
/// Bounds violations reject the mutation and leave the row untouched.
pub(crate) async fn upsert_and_adjust<C: ConnectionTrait>(
    conn: &C,
    network: &NetworkConfig,
    product_id: &str,
    product_name: Option<&str>,
    location_id: &str,
    location_name: Option<&str>,
    delta: i32,
) -> Result<inventory_record::Model, ServiceError> {
    let now = Utc::now();

    // Two passes: the second only runs when an insert loses a creation race
    // and the adjustment must be retried against the winner's row.
    for _ in 0..2 {
        let mut update = InventoryRecords::update_many()
            .col_expr(
                inventory_record::Column::Available,
                Expr::col(inventory_record::Column::Available).add(delta),
            )
            .col_expr(inventory_record::Column::LastUpdated, Expr::value(now));
        // Names refresh only when the caller supplies them; an id-only
        // adjustment must not clobber a previously recorded display name.
        if let Some(name) = product_name {
            update = update.col_expr(inventory_record::Column::ProductName, Expr::value(name));
        }
        if let Some(name) = location_name {
            update = update.col_expr(inventory_record::Column::LocationName, Expr::value(name));
        }
        let result = update
            .filter(inventory_record::Column::ProductId.eq(product_id))
            .filter(inventory_record::Column::LocationId.eq(location_id))
            .filter(Expr::expr(Expr::col(inventory_record::Column::Available).add(delta)).gte(0))
            .filter(
                Expr::expr(Expr::col(inventory_record::Column::Available).add(delta))
                    .lte(Expr::col(inventory_record::Column::TotalStock)),
            )
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            return InventoryRecords::find()
                .filter(inventory_record::Column::ProductId.eq(product_id))
                .filter(inventory_record::Column::LocationId.eq(location_id))
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "inventory record for {} at {} vanished after update",
                        product_id, location_id
                    ))
                });
        }

        // No row matched: either the record is absent or the delta would
        // break a bound. Re-read to tell the cases apart.
        let existing = InventoryRecords::find()
            .filter(inventory_record::Column::ProductId.eq(product_id))
            .filter(inventory_record::Column::LocationId.eq(location_id))
            .one(conn)
            .await?;

        match existing {
            Some(record) => {
                return Err(if record.available + delta < 0 {
                    ServiceError::InsufficientStock(format!(
                        "{} at {}: available {}, requested change {}",
                        product_id, location_id, record.available, delta
                    ))
                } else {
                    ServiceError::CapacityExceeded(format!(
                        "{} at {}: total stock {}, available {}, requested change {}",
                        product_id, location_id, record.total_stock, record.available, delta
                    ))
                });
            }
            None => {
                let defaults = network.tier_defaults(location_id);
                if delta < 0 {
                    return Err(ServiceError::InsufficientStock(format!(
                        "{} at {}: no stock on record, requested change {}",
                        product_id, location_id, delta
                    )));
                }
                if delta > defaults.total_stock {
                    return Err(ServiceError::CapacityExceeded(format!(
                        "{} at {}: total stock {}, requested change {}",
                        product_id, location_id, defaults.total_stock, delta
                    )));
                }

                let model = inventory_record::ActiveModel {
                    product_id: Set(product_id.to_string()),
                    product_name: Set(product_name.unwrap_or(product_id).to_string()),
                    location_id: Set(location_id.to_string()),
                    location_name: Set(location_name.unwrap_or(location_id).to_string()),
                    region: Set(network.region_key(location_id)),
                    total_stock: Set(defaults.total_stock),
                    available: Set(delta),
                    min_threshold: Set(defaults.min_threshold),
                    max_threshold: Set(defaults.max_threshold),
                    last_updated: Set(now),
                    created_at: Set(now),
                    ..Default::default()
                };

                match model.insert(conn).await {
                    Ok(record) => return Ok(record),
                    // A concurrent creator won; loop and adjust their row.
                    Err(e) if is_unique_violation(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    Err(ServiceError::ConcurrencyConflict(format!(
        "inventory record for {} at {} kept changing during adjustment",
        product_id, location_id
    )))
}

/// Threshold cascade run after every ledger mutation, in the same
/// transaction.
///
/// Stores pull from their resident regional warehouse (transfer order) and
/// queue a replenishment request for that warehouse toward the central tier;
/// regional warehouses request from central directly. Alerts are upserted or
/// cleared to match the current breach state.
pub(crate) async fn run_cascade<C: ConnectionTrait>(
    conn: &C,
    network: &NetworkConfig,
    record: &inventory_record::Model,
    events: &mut Vec<Event>,
) -> Result<(), ServiceError> {
    let policy = &network.replenishment;

    if let Some(region) = network.region_for_store(&record.location_id) {
        let eval = policy.evaluate(record.total_stock, record.available);
        if !eval.breached {
            return Ok(());
        }

        if eval.suggested_qty > 0 {
            let outcome = transfers::ensure_open_transfer(
                conn,
                TransferSpec {
                    product_sku: &record.product_id,
                    product_name: &record.product_name,
                    quantity: eval.suggested_qty,
                    from_location_id: &region.warehouse_id,
                    from_location_name: &region.warehouse_name,
                    to_location_id: &record.location_id,
                    to_location_name: &record.location_name,
                    request_id: None,
                    note: format!(
                        "Auto-created transfer: replenish {} units for low stock at {} (current: {})",
                        eval.suggested_qty, record.location_id, record.available
                    ),
                },
            )
            .await?;
            if let OpenTransferOutcome::Created(transfer) = &outcome {
                events.push(Event::TransferCreated {
                    transfer_id: transfer.transfer_id.clone(),
                    product_sku: transfer.product_sku.clone(),
                    from_location_id: transfer.from_location_id.clone(),
                    to_location_id: transfer.to_location_id.clone(),
                    quantity: transfer.quantity,
                });
            }
        }

        if replenishment::find_open_request(conn, &record.product_id, &region.warehouse_id)
            .await?
            .is_none()
        {
            let quantity =
                (record.total_stock - record.available).max(network.store_defaults.min_threshold);
            let created = replenishment::create_open_request(
                conn,
                RequestSpec {
                    product_id: &record.product_id,
                    product_name: &record.product_name,
                    vendor: &network.central_warehouse_name,
                    quantity,
                    warehouse_id: &region.warehouse_id,
                    warehouse_name: &region.warehouse_name,
                    reason: format!(
                        "Store inventory below threshold at {}",
                        record.location_id
                    ),
                    remark: Some(format!("Auto request from {}", record.location_name)),
                    origin_name: &record.location_name,
                    lead_days: network.request_lead_days,
                    delivery_date: None,
                },
            )
            .await?;

            if let Some(request) = created {
                events.push(Event::RequestSubmitted {
                    request_id: request.request_id.clone(),
                    product_id: request.product_id.clone(),
                    warehouse_id: request.warehouse_id.clone(),
                    quantity: request.quantity,
                });

                let alert = replenishment::upsert_alert(
                    conn,
                    &AlertSpec {
                        product_id: &record.product_id,
                        product_name: &record.product_name,
                        warehouse_id: &region.warehouse_id,
                        warehouse_name: &region.warehouse_name,
                        stock: record.available,
                        eval,
                        trigger: "Store inventory below threshold".to_string(),
                    },
                )
                .await?;
                events.push(Event::AlertRaised {
                    product_id: alert.product_id,
                    warehouse_id: alert.warehouse_id,
                    severity: eval.severity,
                });
            }
        }
    } else if network.is_regional_warehouse(&record.location_id) {
        let eval = policy.evaluate(record.total_stock, record.available);

        if eval.breached {
            if replenishment::find_open_request(conn, &record.product_id, &record.location_id)
                .await?
                .is_none()
            {
                let created = replenishment::create_open_request(
                    conn,
                    RequestSpec {
                        product_id: &record.product_id,
                        product_name: &record.product_name,
                        vendor: &network.central_warehouse_name,
                        quantity: eval.suggested_qty.max(1),
                        warehouse_id: &record.location_id,
                        warehouse_name: &record.location_name,
                        reason: replenishment::warehouse_breach_trigger(
                            policy,
                            record.total_stock,
                            record.available,
                            eval.threshold_qty,
                        ),
                        remark: None,
                        origin_name: &record.location_name,
                        lead_days: network.request_lead_days,
                        delivery_date: None,
                    },
                )
                .await?;
                if let Some(request) = created {
                    events.push(Event::RequestSubmitted {
                        request_id: request.request_id.clone(),
                        product_id: request.product_id.clone(),
                        warehouse_id: request.warehouse_id.clone(),
                        quantity: request.quantity,
                    });
                }
            }

            let alert = replenishment::upsert_alert(
                conn,
                &AlertSpec {
                    product_id: &record.product_id,
                    product_name: &record.product_name,
                    warehouse_id: &record.location_id,
                    warehouse_name: &record.location_name,
                    stock: record.available,
                    eval,
                    trigger: replenishment::warehouse_breach_trigger(
                        policy,
                        record.total_stock,
                        record.available,
                        eval.threshold_qty,
                    ),
                },
            )
            .await?;
            events.push(Event::AlertRaised {
                product_id: alert.product_id,
                warehouse_id: alert.warehouse_id,
                severity: eval.severity,
            });
        } else if replenishment::clear_alert(conn, &record.product_id, &record.location_id).await? {
            events.push(Event::AlertCleared {
                product_id: record.product_id.clone(),
                warehouse_id: record.location_id.clone(),
            });
        }
    }

    Ok(())
}
