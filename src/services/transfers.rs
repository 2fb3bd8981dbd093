//! Transfer order workflow.
//!
//! Two creation paths are deliberate and distinct: `create_pending` books
//! the movement without touching inventory (dispatch happens later, with
//! carrier details), while `create_dispatched` debits the source and starts
//! the transfer in one step (manual allocation by a manager).

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{instrument, warn};

use crate::config::NetworkConfig;
use crate::db::{is_unique_violation, DbPool};
use crate::entities::receiving_schedule;
use crate::entities::replenishment_request::ProgressStep;
use crate::entities::transfer_order::{
    self, decode_history, encode_history, Entity as TransferOrders, HistoryEntry, TransferStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::ids;
use crate::services::inventory::{run_cascade, upsert_and_adjust};
use crate::services::replenishment::advance_request_to_in_transit;

/// Payload for both transfer creation paths.
#[derive(Debug, Clone)]
pub struct CreateTransferCommand {
    pub product_sku: String,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub from_location_id: String,
    pub from_location_name: Option<String>,
    pub to_location_id: String,
    pub to_location_name: Option<String>,
    /// Replenishment request this transfer fulfils, if any
    pub request_id: Option<String>,
}

/// Carrier details supplied when dispatching a pending transfer.
#[derive(Debug, Clone)]
pub struct DispatchCommand {
    pub carrier: String,
    pub departure: chrono::DateTime<Utc>,
    pub remark: Option<String>,
}

/// Fields needed to create (or merge into) an open transfer on a route.
pub(crate) struct TransferSpec<'a> {
    pub product_sku: &'a str,
    pub product_name: &'a str,
    pub quantity: i32,
    pub from_location_id: &'a str,
    pub from_location_name: &'a str,
    pub to_location_id: &'a str,
    pub to_location_name: &'a str,
    pub request_id: Option<&'a str>,
    pub note: String,
}

/// What `ensure_open_transfer` found or did for a route.
pub(crate) enum OpenTransferOutcome {
    Created(transfer_order::Model),
    /// Existing PENDING transfer raised to the larger quantity
    Merged(transfer_order::Model),
    /// Existing PENDING transfer already covers the suggested quantity
    AlreadyPending(transfer_order::Model),
    AlreadyInTransit(transfer_order::Model),
}

impl OpenTransferOutcome {
    pub(crate) fn into_model(self) -> transfer_order::Model {
        match self {
            OpenTransferOutcome::Created(m)
            | OpenTransferOutcome::Merged(m)
            | OpenTransferOutcome::AlreadyPending(m)
            | OpenTransferOutcome::AlreadyInTransit(m) => m,
        }
    }
}

/// Service owning the transfer order lifecycle.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DbPool>,
    network: Arc<NetworkConfig>,
    event_sender: EventSender,
}

impl TransferService {
    pub fn new(db: Arc<DbPool>, network: Arc<NetworkConfig>, event_sender: EventSender) -> Self {
        Self {
            db,
            network,
            event_sender,
        }
    }

    /// Books a PENDING transfer without touching inventory.
    ///
    /// A PENDING transfer already open on the route absorbs the new signal
    /// (quantity raised to the larger of the two); an IN_TRANSIT one is a
    /// conflict, since the route's movement is already underway.
    #[instrument(skip(self))]
    pub async fn create_pending(
        &self,
        command: CreateTransferCommand,
    ) -> Result<transfer_order::Model, ServiceError> {
        validate_transfer_command(&command)?;

        let cmd = command.clone();

        let (transfer, events) = self
            .db
            .transaction::<_, (transfer_order::Model, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let product_name = cmd.product_name.as_deref().unwrap_or(&cmd.product_sku);
                    let outcome = ensure_open_transfer(
                        txn,
                        TransferSpec {
                            product_sku: &cmd.product_sku,
                            product_name,
                            quantity: cmd.quantity,
                            from_location_id: &cmd.from_location_id,
                            from_location_name: cmd
                                .from_location_name
                                .as_deref()
                                .unwrap_or(&cmd.from_location_id),
                            to_location_id: &cmd.to_location_id,
                            to_location_name: cmd
                                .to_location_name
                                .as_deref()
                                .unwrap_or(&cmd.to_location_id),
                            request_id: cmd.request_id.as_deref(),
                            note: "Transfer order created".to_string(),
                        },
                    )
                    .await?;

                    if let OpenTransferOutcome::AlreadyInTransit(transfer) = &outcome {
                        return Err(ServiceError::Conflict(format!(
                            "transfer {} is already in transit for {} from {} to {}",
                            transfer.transfer_id,
                            transfer.product_sku,
                            transfer.from_location_id,
                            transfer.to_location_id
                        )));
                    }

                    let mut events = Vec::new();
                    if let OpenTransferOutcome::Created(transfer) = &outcome {
                        events.push(Event::TransferCreated {
                            transfer_id: transfer.transfer_id.clone(),
                            product_sku: transfer.product_sku.clone(),
                            from_location_id: transfer.from_location_id.clone(),
                            to_location_id: transfer.to_location_id.clone(),
                            quantity: transfer.quantity,
                        });
                    }

                    Ok((outcome.into_model(), events))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(transfer)
    }

    /// Dispatches a PENDING transfer: debits the source, credits the
    /// destination and marks the order IN_TRANSIT, all in one transaction.
    /// The source warehouse's threshold state is re-evaluated after the
    /// debit via the cascade.
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        transfer_id: &str,
        command: DispatchCommand,
    ) -> Result<transfer_order::Model, ServiceError> {
        if command.carrier.trim().is_empty() {
            return Err(ServiceError::ValidationError("carrier is required".into()));
        }

        let network = self.network.clone();
        let transfer_id = transfer_id.to_string();
        let cmd = command.clone();

        let (transfer, events) = self
            .db
            .transaction::<_, (transfer_order::Model, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = TransferOrders::find()
                        .filter(transfer_order::Column::TransferId.eq(&transfer_id))
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "transfer order {} not found",
                                transfer_id
                            ))
                        })?;

                    if transfer.status != TransferStatus::Pending.as_str() {
                        return Err(ServiceError::InvalidStatus(format!(
                            "transfer {} is {}, only pending transfer orders can be dispatched",
                            transfer_id, transfer.status
                        )));
                    }

                    let now = Utc::now();
                    let mut history = decode_history(&transfer.history);
                    history.push(HistoryEntry {
                        status: TransferStatus::InTransit.as_str().to_string(),
                        note: format!("Dispatched via {}", cmd.carrier.trim()),
                        created_at: now,
                    });

                    // Mark in transit before moving stock so the credit-side
                    // cascade sees this route as already covered.
                    let mut active: transfer_order::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::InTransit.as_str().to_string());
                    active.history = Set(encode_history(&history));
                    active.carrier = Set(Some(cmd.carrier.trim().to_string()));
                    active.departed_at = Set(Some(cmd.departure));
                    active.dispatch_remark = Set(cmd.remark.clone());
                    active.inventory_updated = Set(true);
                    active.updated_at = Set(now);
                    let transfer = active.update(txn).await?;

                    let mut events = vec![
                        Event::TransferDispatched {
                            transfer_id: transfer.transfer_id.clone(),
                            carrier: cmd.carrier.trim().to_string(),
                        },
                        Event::StockTransferred {
                            product_id: transfer.product_sku.clone(),
                            from_location_id: transfer.from_location_id.clone(),
                            to_location_id: transfer.to_location_id.clone(),
                            quantity: transfer.quantity,
                        },
                    ];

                    let from = upsert_and_adjust(
                        txn,
                        &network,
                        &transfer.product_sku,
                        Some(&transfer.product_name),
                        &transfer.from_location_id,
                        Some(&transfer.from_location_name),
                        -transfer.quantity,
                    )
                    .await?;
                    run_cascade(txn, &network, &from, &mut events).await?;

                    let to = upsert_and_adjust(
                        txn,
                        &network,
                        &transfer.product_sku,
                        Some(&transfer.product_name),
                        &transfer.to_location_id,
                        Some(&transfer.to_location_name),
                        transfer.quantity,
                    )
                    .await?;
                    run_cascade(txn, &network, &to, &mut events).await?;

                    Ok((transfer, events))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(transfer)
    }

    /// Manual allocation: creates the transfer already IN_TRANSIT with the
    /// source debited at creation, books a receiving schedule for the
    /// destination, and advances the originating request when one is named.
    #[instrument(skip(self))]
    pub async fn create_dispatched(
        &self,
        command: CreateTransferCommand,
    ) -> Result<transfer_order::Model, ServiceError> {
        validate_transfer_command(&command)?;

        let network = self.network.clone();
        let cmd = command.clone();

        let (transfer, events) = self
            .db
            .transaction::<_, (transfer_order::Model, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut events = Vec::new();
                    let product_name = cmd
                        .product_name
                        .clone()
                        .or_else(|| network.product_name(&cmd.product_sku).map(str::to_string))
                        .unwrap_or_else(|| cmd.product_sku.clone());
                    let from_name = cmd
                        .from_location_name
                        .clone()
                        .unwrap_or_else(|| cmd.from_location_id.clone());
                    let to_name = cmd
                        .to_location_name
                        .clone()
                        .unwrap_or_else(|| cmd.to_location_id.clone());

                    let from = upsert_and_adjust(
                        txn,
                        &network,
                        &cmd.product_sku,
                        Some(&product_name),
                        &cmd.from_location_id,
                        Some(&from_name),
                        -cmd.quantity,
                    )
                    .await?;
                    run_cascade(txn, &network, &from, &mut events).await?;

                    let now = Utc::now();
                    let history = vec![
                        HistoryEntry {
                            status: TransferStatus::Pending.as_str().to_string(),
                            note: "Transfer order created".to_string(),
                            created_at: now,
                        },
                        HistoryEntry {
                            status: TransferStatus::InTransit.as_str().to_string(),
                            note: "Dispatched".to_string(),
                            created_at: now,
                        },
                    ];

                    let mut transfer = None;
                    for _ in 0..3 {
                        let model = transfer_order::ActiveModel {
                            transfer_id: Set(ids::transfer_id()),
                            product_sku: Set(cmd.product_sku.clone()),
                            product_name: Set(product_name.clone()),
                            quantity: Set(cmd.quantity),
                            from_location_id: Set(cmd.from_location_id.clone()),
                            from_location_name: Set(from_name.clone()),
                            to_location_id: Set(cmd.to_location_id.clone()),
                            to_location_name: Set(to_name.clone()),
                            status: Set(TransferStatus::InTransit.as_str().to_string()),
                            history: Set(encode_history(&history)),
                            inventory_updated: Set(true),
                            request_id: Set(cmd.request_id.clone()),
                            created_at: Set(now),
                            updated_at: Set(now),
                            ..Default::default()
                        };

                        match model.insert(txn).await {
                            Ok(created) => {
                                transfer = Some(created);
                                break;
                            }
                            Err(e) if is_unique_violation(&e) => {
                                let open = find_open_on_route(
                                    txn,
                                    &cmd.product_sku,
                                    &cmd.from_location_id,
                                    &cmd.to_location_id,
                                )
                                .await?;
                                if let Some(open) = open {
                                    return Err(ServiceError::Conflict(format!(
                                        "transfer {} is already open for {} from {} to {}",
                                        open.transfer_id,
                                        open.product_sku,
                                        open.from_location_id,
                                        open.to_location_id
                                    )));
                                }
                                // Display-id collision; regenerate and retry.
                                continue;
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    let transfer = transfer.ok_or_else(|| {
                        ServiceError::ConcurrencyConflict(format!(
                            "could not allocate a unique transfer id for {} from {} to {}",
                            cmd.product_sku, cmd.from_location_id, cmd.to_location_id
                        ))
                    })?;

                    events.push(Event::TransferCreated {
                        transfer_id: transfer.transfer_id.clone(),
                        product_sku: transfer.product_sku.clone(),
                        from_location_id: transfer.from_location_id.clone(),
                        to_location_id: transfer.to_location_id.clone(),
                        quantity: transfer.quantity,
                    });

                    let schedule = receiving_schedule::ActiveModel {
                        plan_no: Set(transfer.transfer_id.clone()),
                        supplier: Set(from_name.clone()),
                        eta: Set(now + Duration::days(network.receiving_eta_days)),
                        dock: Set(if cmd.from_location_id == network.central_warehouse_id {
                            "Central-Dock".to_string()
                        } else {
                            format!("{}-Dock", cmd.from_location_id)
                        }),
                        items: Set(1),
                        product_sku: Set(cmd.product_sku.clone()),
                        product_name: Set(product_name.clone()),
                        quantity: Set(cmd.quantity),
                        storage_location_id: Set(cmd.to_location_id.clone()),
                        quality_level: Set("A".to_string()),
                        status: Set(TransferStatus::InTransit.as_str().to_string()),
                        created_at: Set(now),
                        ..Default::default()
                    };
                    schedule.insert(txn).await?;

                    if let Some(request_id) = &cmd.request_id {
                        let steps = vec![
                            ProgressStep {
                                title: "Transfer Order Created".to_string(),
                                desc: format!(
                                    "{} units of {} allocated from {} to {}",
                                    cmd.quantity, cmd.product_sku, from_name, to_name
                                ),
                                status: "completed".to_string(),
                                timestamp: now,
                            },
                            ProgressStep {
                                title: "Transfer Order Dispatched".to_string(),
                                desc: format!(
                                    "Transfer order {} dispatched to {}",
                                    transfer.transfer_id, to_name
                                ),
                                status: "completed".to_string(),
                                timestamp: now,
                            },
                            ProgressStep {
                                title: "Replenishment In Transit".to_string(),
                                desc: format!(
                                    "SKU {} is en route to {}",
                                    cmd.product_sku, to_name
                                ),
                                status: "processing".to_string(),
                                timestamp: now,
                            },
                        ];
                        if !advance_request_to_in_transit(txn, request_id, steps).await? {
                            warn!(
                                request_id = %request_id,
                                transfer_id = %transfer.transfer_id,
                                "Transfer references an unknown replenishment request"
                            );
                        }
                    }

                    Ok((transfer, events))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender.send_all_logged(events).await;

        Ok(transfer)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, transfer_id: &str) -> Result<transfer_order::Model, ServiceError> {
        TransferOrders::find()
            .filter(transfer_order::Column::TransferId.eq(transfer_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("transfer order {} not found", transfer_id)))
    }

    /// Lists transfers, optionally restricted to those touching a location
    /// (either side) and/or a status.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        location_id: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<transfer_order::Model>, ServiceError> {
        let mut query = TransferOrders::find();
        if let Some(location_id) = location_id {
            query = query.filter(
                Condition::any()
                    .add(transfer_order::Column::FromLocationId.eq(location_id))
                    .add(transfer_order::Column::ToLocationId.eq(location_id)),
            );
        }
        if let Some(status) = status {
            let parsed: TransferStatus = status
                .parse()
                .map_err(|_| ServiceError::ValidationError(format!("unknown status {}", status)))?;
            query = query.filter(transfer_order::Column::Status.eq(parsed.as_str()));
        }
        let transfers = query
            .order_by_desc(transfer_order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(transfers)
    }
}

fn validate_transfer_command(command: &CreateTransferCommand) -> Result<(), ServiceError> {
    if command.product_sku.trim().is_empty()
        || command.from_location_id.trim().is_empty()
        || command.to_location_id.trim().is_empty()
    {
        return Err(ServiceError::ValidationError(
            "product_sku, from_location_id and to_location_id are required".into(),
        ));
    }
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
    Ok(())
}

pub(crate) async fn find_open_on_route<C: ConnectionTrait>(
    conn: &C,
    product_sku: &str,
    from_location_id: &str,
    to_location_id: &str,
) -> Result<Option<transfer_order::Model>, ServiceError> {
    let transfer = TransferOrders::find()
        .filter(transfer_order::Column::ProductSku.eq(product_sku))
        .filter(transfer_order::Column::FromLocationId.eq(from_location_id))
        .filter(transfer_order::Column::ToLocationId.eq(to_location_id))
        .filter(transfer_order::Column::Status.is_in(TransferStatus::open()))
        .one(conn)
        .await?;
    Ok(transfer)
}

/// Creates a PENDING transfer for the route, or folds a duplicate low-stock
/// signal into the transfer already open there.
///
/// An existing PENDING order absorbs the larger quantity (with a history
/// entry); an IN_TRANSIT order is left untouched. Insert races on the
/// open-route dedup index resolve by re-reading; display-id collisions
/// retry with a fresh id.
pub(crate) async fn ensure_open_transfer<C: ConnectionTrait>(
    conn: &C,
    spec: TransferSpec<'_>,
) -> Result<OpenTransferOutcome, ServiceError> {
    let now = Utc::now();

    for _ in 0..3 {
        let existing = find_open_on_route(
            conn,
            spec.product_sku,
            spec.from_location_id,
            spec.to_location_id,
        )
        .await?;

        if let Some(open) = existing {
            if open.status != TransferStatus::Pending.as_str() {
                return Ok(OpenTransferOutcome::AlreadyInTransit(open));
            }
            if spec.quantity <= open.quantity {
                return Ok(OpenTransferOutcome::AlreadyPending(open));
            }

            let mut history = decode_history(&open.history);
            history.push(HistoryEntry {
                status: TransferStatus::Pending.as_str().to_string(),
                note: format!(
                    "Quantity raised from {} to {} after repeated low-stock signal",
                    open.quantity, spec.quantity
                ),
                created_at: now,
            });
            let mut active: transfer_order::ActiveModel = open.into();
            active.quantity = Set(spec.quantity);
            active.history = Set(encode_history(&history));
            active.updated_at = Set(now);
            return Ok(OpenTransferOutcome::Merged(active.update(conn).await?));
        }

        let model = transfer_order::ActiveModel {
            transfer_id: Set(ids::transfer_id()),
            product_sku: Set(spec.product_sku.to_string()),
            product_name: Set(spec.product_name.to_string()),
            quantity: Set(spec.quantity),
            from_location_id: Set(spec.from_location_id.to_string()),
            from_location_name: Set(spec.from_location_name.to_string()),
            to_location_id: Set(spec.to_location_id.to_string()),
            to_location_name: Set(spec.to_location_name.to_string()),
            status: Set(TransferStatus::Pending.as_str().to_string()),
            history: Set(encode_history(&[HistoryEntry {
                status: TransferStatus::Pending.as_str().to_string(),
                note: spec.note.clone(),
                created_at: now,
            }])),
            inventory_updated: Set(false),
            request_id: Set(spec.request_id.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(transfer) => return Ok(OpenTransferOutcome::Created(transfer)),
            // Either a concurrent creator took the route (next read finds
            // it) or the display id collided (retry regenerates it).
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServiceError::ConcurrencyConflict(format!(
        "open transfer for {} from {} to {} kept changing",
        spec.product_sku, spec.from_location_id, spec.to_location_id
    )))
}
