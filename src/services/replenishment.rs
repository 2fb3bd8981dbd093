//! Replenishment alerts and the request approval workflow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::instrument;

use crate::config::NetworkConfig;
use crate::db::{is_unique_violation, DbPool};
use crate::entities::inventory_record::{self, Entity as InventoryRecords};
use crate::entities::replenishment_alert::{self, Entity as ReplenishmentAlerts};
use crate::entities::replenishment_request::{
    self, decode_progress, encode_progress, Entity as ReplenishmentRequests, ProgressStep,
    RequestStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::ids;
use crate::services::threshold::{Evaluation, ThresholdPolicy};

/// Fields needed to upsert an alert for (product, warehouse).
pub(crate) struct AlertSpec<'a> {
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub warehouse_id: &'a str,
    pub warehouse_name: &'a str,
    pub stock: i32,
    pub eval: Evaluation,
    pub trigger: String,
}

/// Fields needed to create an open replenishment request.
pub(crate) struct RequestSpec<'a> {
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub vendor: &'a str,
    pub quantity: i32,
    pub warehouse_id: &'a str,
    pub warehouse_name: &'a str,
    pub reason: String,
    pub remark: Option<String>,
    /// Location named in the "alert generated" progress step
    pub origin_name: &'a str,
    pub lead_days: i64,
    pub delivery_date: Option<chrono::DateTime<Utc>>,
}

/// Manual request submission payload.
#[derive(Debug, Clone)]
pub struct SubmitRequestCommand {
    pub alert_id: Option<String>,
    pub product_id: String,
    pub product_name: Option<String>,
    pub vendor: String,
    pub quantity: i32,
    pub delivery_date: Option<chrono::DateTime<Utc>>,
    pub remark: Option<String>,
    pub warehouse_id: String,
    pub warehouse_name: String,
    pub reason: Option<String>,
}

/// One progress step flattened across recent requests.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressFeedEntry {
    pub title: String,
    pub desc: String,
    pub status: String,
    pub time: chrono::DateTime<Utc>,
    pub request_id: String,
}

/// Service owning the alert registry and the request lifecycle.
#[derive(Clone)]
pub struct ReplenishmentService {
    db: Arc<DbPool>,
    network: Arc<NetworkConfig>,
    event_sender: EventSender,
}

impl ReplenishmentService {
    pub fn new(db: Arc<DbPool>, network: Arc<NetworkConfig>, event_sender: EventSender) -> Self {
        Self {
            db,
            network,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_alerts(
        &self,
        warehouse_id: Option<&str>,
    ) -> Result<Vec<replenishment_alert::Model>, ServiceError> {
        let mut query = ReplenishmentAlerts::find();
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(replenishment_alert::Column::WarehouseId.eq(warehouse_id));
        }
        let alerts = query
            .order_by_desc(replenishment_alert::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(alerts)
    }

    /// Submits a replenishment request on behalf of a warehouse manager.
    ///
    /// Deletes the originating alert when one is named. The open-request
    /// dedup index rejects a second open request for the same (product,
    /// warehouse) with a `Conflict`.
    #[instrument(skip(self))]
    pub async fn submit_request(
        &self,
        command: SubmitRequestCommand,
    ) -> Result<replenishment_request::Model, ServiceError> {
        if command.product_id.trim().is_empty()
            || command.vendor.trim().is_empty()
            || command.warehouse_id.trim().is_empty()
            || command.warehouse_name.trim().is_empty()
        {
            return Err(ServiceError::ValidationError(
                "product_id, vendor, warehouse_id and warehouse_name are required".into(),
            ));
        }
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than 0".into(),
            ));
        }

        let network = self.network.clone();
        let cmd = command.clone();

        let request = self
            .db
            .transaction::<_, replenishment_request::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product_name = cmd
                        .product_name
                        .clone()
                        .or_else(|| network.product_name(&cmd.product_id).map(str::to_string))
                        .unwrap_or_else(|| cmd.product_id.clone());

                    let created = create_open_request(
                        txn,
                        RequestSpec {
                            product_id: &cmd.product_id,
                            product_name: &product_name,
                            vendor: &cmd.vendor,
                            quantity: cmd.quantity,
                            warehouse_id: &cmd.warehouse_id,
                            warehouse_name: &cmd.warehouse_name,
                            reason: cmd
                                .reason
                                .clone()
                                .unwrap_or_else(|| "Safety stock alert".to_string()),
                            remark: cmd.remark.clone(),
                            origin_name: &cmd.warehouse_name,
                            lead_days: network.request_lead_days,
                            delivery_date: cmd.delivery_date,
                        },
                    )
                    .await?;

                    let request = created.ok_or_else(|| {
                        ServiceError::Conflict(format!(
                            "an open replenishment request already exists for {} at {}",
                            cmd.product_id, cmd.warehouse_id
                        ))
                    })?;

                    if let Some(alert_id) = &cmd.alert_id {
                        ReplenishmentAlerts::delete_many()
                            .filter(replenishment_alert::Column::AlertId.eq(alert_id))
                            .exec(txn)
                            .await?;
                    }

                    Ok(request)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .send_all_logged(vec![Event::RequestSubmitted {
                request_id: request.request_id.clone(),
                product_id: request.product_id.clone(),
                warehouse_id: request.warehouse_id.clone(),
                quantity: request.quantity,
            }])
            .await;

        Ok(request)
    }

    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        status: Option<&str>,
        warehouse_id: Option<&str>,
    ) -> Result<Vec<replenishment_request::Model>, ServiceError> {
        let mut query = ReplenishmentRequests::find();
        if let Some(status) = status.filter(|s| !s.eq_ignore_ascii_case("ALL")) {
            let parsed: RequestStatus = status
                .parse()
                .map_err(|_| ServiceError::ValidationError(format!("unknown status {}", status)))?;
            query = query.filter(replenishment_request::Column::Status.eq(parsed.as_str()));
        }
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(replenishment_request::Column::WarehouseId.eq(warehouse_id));
        }
        let requests = query
            .order_by_desc(replenishment_request::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(requests)
    }

    /// Recent progress steps across the latest requests, newest first.
    #[instrument(skip(self))]
    pub async fn progress_feed(&self) -> Result<Vec<ProgressFeedEntry>, ServiceError> {
        let requests = ReplenishmentRequests::find()
            .order_by_desc(replenishment_request::Column::CreatedAt)
            .limit(10)
            .all(self.db.as_ref())
            .await?;

        let mut feed: Vec<ProgressFeedEntry> = requests
            .iter()
            .flat_map(|request| {
                decode_progress(&request.progress)
                    .into_iter()
                    .map(|step| ProgressFeedEntry {
                        title: step.title,
                        desc: step.desc,
                        status: step.status,
                        time: step.timestamp,
                        request_id: request.request_id.clone(),
                    })
            })
            .collect();
        feed.sort_by(|a, b| b.time.cmp(&a.time));
        feed.truncate(20);
        Ok(feed)
    }

    /// Approves or rejects a pending request.
    ///
    /// Rejection is not terminal: when the warehouse is still below its
    /// threshold the alert is re-raised with fresh numbers so the request
    /// can be resubmitted. Approval does not create a transfer order; the
    /// physical allocation is a separate manual action.
    #[instrument(skip(self))]
    pub async fn decide(
        &self,
        request_id: &str,
        decision: &str,
        remark: Option<String>,
    ) -> Result<replenishment_request::Model, ServiceError> {
        let approved = match decision {
            "APPROVED" => true,
            "REJECTED" => false,
            _ => {
                return Err(ServiceError::ValidationError(format!(
                    "invalid decision {}, expected APPROVED or REJECTED",
                    decision
                )))
            }
        };

        let network = self.network.clone();
        let request_id = request_id.to_string();

        let (request, events) = self
            .db
            .transaction::<_, (replenishment_request::Model, Vec<Event>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let request = ReplenishmentRequests::find()
                            .filter(replenishment_request::Column::RequestId.eq(&request_id))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "replenishment request {} not found",
                                    request_id
                                ))
                            })?;

                        let status = request.status.as_str();
                        if status != RequestStatus::Pending.as_str()
                            && status != RequestStatus::Processing.as_str()
                        {
                            return Err(ServiceError::InvalidStatus(format!(
                                "request {} is {}, only pending requests can be decided",
                                request_id, status
                            )));
                        }

                        let now = Utc::now();
                        let mut progress = decode_progress(&request.progress);
                        progress.push(ProgressStep {
                            title: if approved {
                                "Application Approved".to_string()
                            } else {
                                "Application Rejected".to_string()
                            },
                            desc: remark.clone().unwrap_or_else(|| {
                                if approved {
                                    "Approved by central manager".to_string()
                                } else {
                                    "Rejected by central manager".to_string()
                                }
                            }),
                            status: "completed".to_string(),
                            timestamp: now,
                        });

                        let new_status = if approved {
                            RequestStatus::Approved
                        } else {
                            RequestStatus::Rejected
                        };
                        let mut active: replenishment_request::ActiveModel = request.into();
                        active.status = Set(new_status.as_str().to_string());
                        active.progress = Set(encode_progress(&progress));
                        active.updated_at = Set(now);
                        let request = active.update(txn).await?;

                        let mut events = vec![Event::RequestDecided {
                            request_id: request.request_id.clone(),
                            decision: new_status.as_str().to_string(),
                        }];

                        // Rejection must not suppress future alerts: if the
                        // warehouse is still short, put the advisory back.
                        if !approved {
                            let inventory = InventoryRecords::find()
                                .filter(
                                    inventory_record::Column::ProductId.eq(&request.product_id),
                                )
                                .filter(
                                    inventory_record::Column::LocationId.eq(&request.warehouse_id),
                                )
                                .one(txn)
                                .await?;

                            if let Some(inventory) = inventory {
                                let policy = &network.replenishment;
                                let eval =
                                    policy.evaluate(inventory.total_stock, inventory.available);
                                if eval.breached {
                                    let alert = upsert_alert(
                                        txn,
                                        &AlertSpec {
                                            product_id: &request.product_id,
                                            product_name: &request.product_name,
                                            warehouse_id: &request.warehouse_id,
                                            warehouse_name: &request.warehouse_name,
                                            stock: inventory.available,
                                            eval,
                                            trigger: warehouse_breach_trigger(
                                                policy,
                                                inventory.total_stock,
                                                inventory.available,
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
                                }
                            }
                        }

                        Ok((request, events))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(request)
    }

    /// Sweeps the configured warehouses and products, reconciling alerts
    /// with current breach state. Returns the alerts that are live after
    /// the sweep.
    #[instrument(skip(self))]
    pub async fn sweep_low_stock(&self) -> Result<Vec<replenishment_alert::Model>, ServiceError> {
        let network = self.network.clone();

        let (alerts, events) = self
            .db
            .transaction::<_, (Vec<replenishment_alert::Model>, Vec<Event>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let mut alerts = Vec::new();
                        let mut events = Vec::new();
                        let policy = &network.replenishment;

                        for region in &network.regions {
                            for product in &network.products {
                                let inventory = InventoryRecords::find()
                                    .filter(inventory_record::Column::ProductId.eq(&product.id))
                                    .filter(
                                        inventory_record::Column::LocationId
                                            .eq(&region.warehouse_id),
                                    )
                                    .one(txn)
                                    .await?;

                                let Some(inventory) = inventory else {
                                    continue;
                                };
                                if inventory.total_stock <= 0 {
                                    continue;
                                }

                                let eval =
                                    policy.evaluate(inventory.total_stock, inventory.available);
                                if eval.breached {
                                    let alert = upsert_alert(
                                        txn,
                                        &AlertSpec {
                                            product_id: &product.id,
                                            product_name: &inventory.product_name,
                                            warehouse_id: &region.warehouse_id,
                                            warehouse_name: &region.warehouse_name,
                                            stock: inventory.available,
                                            eval,
                                            trigger: warehouse_breach_trigger(
                                                policy,
                                                inventory.total_stock,
                                                inventory.available,
                                                eval.threshold_qty,
                                            ),
                                        },
                                    )
                                    .await?;
                                    events.push(Event::AlertRaised {
                                        product_id: alert.product_id.clone(),
                                        warehouse_id: alert.warehouse_id.clone(),
                                        severity: eval.severity,
                                    });
                                    alerts.push(alert);
                                } else if clear_alert(txn, &product.id, &region.warehouse_id)
                                    .await?
                                {
                                    events.push(Event::AlertCleared {
                                        product_id: product.id.clone(),
                                        warehouse_id: region.warehouse_id.clone(),
                                    });
                                }
                            }
                        }

                        Ok((alerts, events))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(alerts)
    }
}

/// Trigger text for a warehouse-level breach, covering both the ratio rule
/// and the flat fallback for unknown capacity.
pub(crate) fn warehouse_breach_trigger(
    policy: &ThresholdPolicy,
    total_stock: i32,
    available: i32,
    threshold_qty: i32,
) -> String {
    if total_stock > 0 {
        format!(
            "Regional warehouse inventory below {:.0}% of total stock (current: {} < {})",
            policy.low_stock_ratio * 100.0,
            available,
            threshold_qty
        )
    } else {
        format!(
            "Inventory below safety threshold (current: {} < {})",
            available, policy.fallback_threshold
        )
    }
}

pub(crate) async fn find_open_request<C: ConnectionTrait>(
    conn: &C,
    product_id: &str,
    warehouse_id: &str,
) -> Result<Option<replenishment_request::Model>, ServiceError> {
    let request = ReplenishmentRequests::find()
        .filter(replenishment_request::Column::ProductId.eq(product_id))
        .filter(replenishment_request::Column::WarehouseId.eq(warehouse_id))
        .filter(replenishment_request::Column::Status.is_in(RequestStatus::open()))
        .one(conn)
        .await?;
    Ok(request)
}

/// Inserts a PENDING request with the seeded three-step progress log.
///
/// Returns `None` when the open-request dedup index reports another open
/// request already exists (a concurrent creator won). Display-id collisions
/// are retried with a fresh id.
pub(crate) async fn create_open_request<C: ConnectionTrait>(
    conn: &C,
    spec: RequestSpec<'_>,
) -> Result<Option<replenishment_request::Model>, ServiceError> {
    let now = Utc::now();
    let progress = vec![
        ProgressStep {
            title: "Replenishment Alert Generated".to_string(),
            desc: format!("{} below threshold at {}", spec.product_name, spec.origin_name),
            status: "completed".to_string(),
            timestamp: now,
        },
        ProgressStep {
            title: "Application Submitted".to_string(),
            desc: format!(
                "{} requested {} units from {}",
                spec.warehouse_name, spec.quantity, spec.vendor
            ),
            status: "completed".to_string(),
            timestamp: now,
        },
        ProgressStep {
            title: "Waiting for Approval".to_string(),
            desc: "Awaiting central approval".to_string(),
            status: "processing".to_string(),
            timestamp: now,
        },
    ];
    let delivery_date = spec
        .delivery_date
        .unwrap_or_else(|| now + Duration::days(spec.lead_days));

    for _ in 0..3 {
        let model = replenishment_request::ActiveModel {
            request_id: Set(ids::request_id()),
            product_id: Set(spec.product_id.to_string()),
            product_name: Set(spec.product_name.to_string()),
            vendor: Set(spec.vendor.to_string()),
            quantity: Set(spec.quantity),
            warehouse_id: Set(spec.warehouse_id.to_string()),
            warehouse_name: Set(spec.warehouse_name.to_string()),
            delivery_date: Set(delivery_date),
            reason: Set(Some(spec.reason.clone())),
            remark: Set(spec.remark.clone()),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            progress: Set(encode_progress(&progress)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(request) => return Ok(Some(request)),
            Err(e) if is_unique_violation(&e) => {
                if find_open_request(conn, spec.product_id, spec.warehouse_id)
                    .await?
                    .is_some()
                {
                    return Ok(None);
                }
                // Display-id collision; regenerate and retry.
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServiceError::ConcurrencyConflict(format!(
        "could not allocate a unique request id for {} at {}",
        spec.product_id, spec.warehouse_id
    )))
}

/// Creates or refreshes the alert for (product, warehouse).
///
/// Upsert semantics make reapplying the same evaluation idempotent: one
/// alert row per key, whatever the interleaving.
pub(crate) async fn upsert_alert<C: ConnectionTrait>(
    conn: &C,
    spec: &AlertSpec<'_>,
) -> Result<replenishment_alert::Model, ServiceError> {
    let now = Utc::now();

    for _ in 0..2 {
        let existing = ReplenishmentAlerts::find()
            .filter(replenishment_alert::Column::ProductId.eq(spec.product_id))
            .filter(replenishment_alert::Column::WarehouseId.eq(spec.warehouse_id))
            .one(conn)
            .await?;

        if let Some(existing) = existing {
            let mut active: replenishment_alert::ActiveModel = existing.into();
            active.product_name = Set(spec.product_name.to_string());
            active.warehouse_name = Set(spec.warehouse_name.to_string());
            active.stock = Set(spec.stock);
            active.suggested = Set(spec.eval.suggested_qty.max(0));
            active.shortage_qty = Set(spec.eval.shortage_qty.max(0));
            active.threshold = Set(spec.eval.threshold_qty);
            active.trigger = Set(spec.trigger.clone());
            active.level = Set(spec.eval.severity.as_str().to_string());
            active.level_label = Set(spec.eval.severity.label().to_string());
            active.updated_at = Set(now);
            return Ok(active.update(conn).await?);
        }

        let model = replenishment_alert::ActiveModel {
            alert_id: Set(ids::alert_id()),
            product_id: Set(spec.product_id.to_string()),
            product_name: Set(spec.product_name.to_string()),
            warehouse_id: Set(spec.warehouse_id.to_string()),
            warehouse_name: Set(spec.warehouse_name.to_string()),
            stock: Set(spec.stock),
            suggested: Set(spec.eval.suggested_qty.max(0)),
            shortage_qty: Set(spec.eval.shortage_qty.max(0)),
            threshold: Set(spec.eval.threshold_qty),
            trigger: Set(spec.trigger.clone()),
            level: Set(spec.eval.severity.as_str().to_string()),
            level_label: Set(spec.eval.severity.label().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(alert) => return Ok(alert),
            // A concurrent creator won the (product, warehouse) slot; loop
            // and update their row instead.
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServiceError::ConcurrencyConflict(format!(
        "alert for {} at {} kept changing during upsert",
        spec.product_id, spec.warehouse_id
    )))
}

/// Removes the alert for (product, warehouse), reporting whether one existed.
pub(crate) async fn clear_alert<C: ConnectionTrait>(
    conn: &C,
    product_id: &str,
    warehouse_id: &str,
) -> Result<bool, ServiceError> {
    let result = ReplenishmentAlerts::delete_many()
        .filter(replenishment_alert::Column::ProductId.eq(product_id))
        .filter(replenishment_alert::Column::WarehouseId.eq(warehouse_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Advances the named request to IN_TRANSIT, appending the supplied progress
/// entries. Returns false (and changes nothing) when the id is unknown.
pub(crate) async fn advance_request_to_in_transit<C: ConnectionTrait>(
    conn: &C,
    request_id: &str,
    steps: Vec<ProgressStep>,
) -> Result<bool, ServiceError> {
    let request = ReplenishmentRequests::find()
        .filter(replenishment_request::Column::RequestId.eq(request_id))
        .one(conn)
        .await?;

    let Some(request) = request else {
        return Ok(false);
    };

    let mut progress = decode_progress(&request.progress);
    progress.extend(steps);

    let mut active: replenishment_request::ActiveModel = request.into();
    active.status = Set(RequestStatus::InTransit.as_str().to_string());
    active.progress = Set(encode_progress(&progress));
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    Ok(true)
}
