mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use retailnet_api::entities::receiving_schedule;
use retailnet_api::entities::replenishment_request::decode_progress;
use retailnet_api::entities::transfer_order::{decode_history, TransferStatus};
use retailnet_api::entities::{ReceivingSchedule, ReplenishmentAlert};
use retailnet_api::entities::replenishment_alert;
use retailnet_api::errors::ServiceError;
use retailnet_api::services::replenishment::SubmitRequestCommand;
use retailnet_api::services::transfers::{CreateTransferCommand, DispatchCommand};

fn transfer_cmd(
    product: &str,
    from: &str,
    to: &str,
    quantity: i32,
    request_id: Option<String>,
) -> CreateTransferCommand {
    CreateTransferCommand {
        product_sku: product.to_string(),
        product_name: None,
        quantity,
        from_location_id: from.to_string(),
        from_location_name: None,
        to_location_id: to.to_string(),
        to_location_name: None,
        request_id,
    }
}

#[tokio::test]
async fn create_pending_validates_input() {
    let app = common::setup().await;

    let err = app
        .services
        .transfers
        .create_pending(transfer_cmd("PROD-001", "WH-EAST", "STORE-EAST-01", 0, None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .transfers
        .create_pending(transfer_cmd("PROD-001", "WH-EAST", "WH-EAST", 10, None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn create_pending_does_not_touch_inventory() {
    let app = common::setup().await;

    app.adjust("PROD-001", "WH-EAST", 500).await;

    let transfer = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-001",
            "WH-EAST",
            "STORE-OUTLET-01",
            50,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Pending.as_str());
    assert!(!transfer.inventory_updated);
    assert!(transfer.transfer_id.starts_with("TRF-"));

    let history = decode_history(&transfer.history);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].note, "Transfer order created");

    let warehouse = app
        .services
        .inventory
        .get_inventory("PROD-001", "WH-EAST")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(warehouse.available, 500);
}

/// Dispatch moves the full quantity source -> destination atomically and
/// re-evaluates the source warehouse's alert.
#[tokio::test]
async fn dispatch_moves_stock_and_reevaluates_source() {
    let app = common::setup().await;

    // WH-EAST at 295 (breached: alert + open request exist from the cascade)
    app.adjust("PROD-002", "WH-EAST", 310).await;
    app.adjust("PROD-002", "WH-EAST", -15).await;
    // Destination store outside the configured regions, at 45
    app.adjust("PROD-002", "STORE-OUTLET-01", 45).await;

    let transfer = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-002",
            "WH-EAST",
            "STORE-OUTLET-01",
            50,
            None,
        ))
        .await
        .unwrap();

    let dispatched = app
        .services
        .transfers
        .dispatch(
            &transfer.transfer_id,
            DispatchCommand {
                carrier: "SF Express".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(dispatched.status, TransferStatus::InTransit.as_str());
    assert!(dispatched.inventory_updated);
    assert_eq!(dispatched.carrier.as_deref(), Some("SF Express"));

    let history = decode_history(&dispatched.history);
    assert_eq!(history.last().unwrap().note, "Dispatched via SF Express");

    let warehouse = app
        .services
        .inventory
        .get_inventory("PROD-002", "WH-EAST")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(warehouse.available, 245);

    let store = app
        .services
        .inventory
        .get_inventory("PROD-002", "STORE-OUTLET-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.available, 95);

    // Source alert refreshed against the post-debit stock
    let alert = ReplenishmentAlert::find()
        .filter(replenishment_alert::Column::ProductId.eq("PROD-002"))
        .filter(replenishment_alert::Column::WarehouseId.eq("WH-EAST"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.stock, 245);
    assert_eq!(alert.suggested, 655); // ceil(900 - 245)
}

/// A credit that would overflow the destination rolls the whole dispatch
/// back: debit undone, order still pending.
#[tokio::test]
async fn dispatch_is_all_or_nothing() {
    let app = common::setup().await;

    app.adjust("PROD-003", "WH-EAST", 500).await;
    app.adjust("PROD-003", "STORE-OUTLET-01", 180).await; // capacity 200

    let transfer = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-003",
            "WH-EAST",
            "STORE-OUTLET-01",
            50,
            None,
        ))
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .dispatch(
            &transfer.transfer_id,
            DispatchCommand {
                carrier: "SF Express".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::CapacityExceeded(_));

    let warehouse = app
        .services
        .inventory
        .get_inventory("PROD-003", "WH-EAST")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(warehouse.available, 500, "debit must be rolled back");

    let store = app
        .services
        .inventory
        .get_inventory("PROD-003", "STORE-OUTLET-01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.available, 180, "credit must not apply");

    let reloaded = app
        .services
        .transfers
        .get(&transfer.transfer_id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, TransferStatus::Pending.as_str());
    assert!(!reloaded.inventory_updated);
}

#[tokio::test]
async fn dispatch_requires_pending_status_and_known_id() {
    let app = common::setup().await;

    let err = app
        .services
        .transfers
        .dispatch(
            "TRF-19700101-000",
            DispatchCommand {
                carrier: "SF Express".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    app.adjust("PROD-004", "WH-EAST", 500).await;
    let transfer = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-004",
            "WH-EAST",
            "STORE-OUTLET-01",
            30,
            None,
        ))
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .dispatch(
            &transfer.transfer_id,
            DispatchCommand {
                carrier: "  ".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    app.services
        .transfers
        .dispatch(
            &transfer.transfer_id,
            DispatchCommand {
                carrier: "SF Express".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap();

    // Second dispatch hits the state machine
    let err = app
        .services
        .transfers
        .dispatch(
            &transfer.transfer_id,
            DispatchCommand {
                carrier: "SF Express".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

/// The manual-allocation path debits the source at creation, starts the
/// order in transit and books a receiving schedule; the destination is
/// credited only on receipt, which is outside this workflow.
#[tokio::test]
async fn create_dispatched_debits_source_immediately() {
    let app = common::setup().await;

    app.adjust("PROD-005", "WH-WEST", 500).await;

    let transfer = app
        .services
        .transfers
        .create_dispatched(transfer_cmd(
            "PROD-005",
            "WH-WEST",
            "STORE-WEST-01",
            50,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::InTransit.as_str());
    assert!(transfer.inventory_updated);

    let history = decode_history(&transfer.history);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, TransferStatus::Pending.as_str());
    assert_eq!(history[1].status, TransferStatus::InTransit.as_str());

    let warehouse = app
        .services
        .inventory
        .get_inventory("PROD-005", "WH-WEST")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(warehouse.available, 450);

    assert!(app
        .services
        .inventory
        .get_inventory("PROD-005", "STORE-WEST-01")
        .await
        .unwrap()
        .is_none());

    let schedule = ReceivingSchedule::find()
        .filter(receiving_schedule::Column::PlanNo.eq(&transfer.transfer_id))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("manual allocation must book a receiving schedule");
    assert_eq!(schedule.quantity, 50);
    assert_eq!(schedule.storage_location_id, "STORE-WEST-01");
    assert_eq!(schedule.dock, "WH-WEST-Dock");
    assert_eq!(schedule.quality_level, "A");
}

/// Allocating against an approved request advances it to IN_TRANSIT with
/// three progress entries.
#[tokio::test]
async fn create_dispatched_advances_linked_request() {
    let app = common::setup().await;

    app.adjust("PROD-005", "WH-CENTRAL", 200).await;

    let request = app
        .services
        .replenishment
        .submit_request(SubmitRequestCommand {
            alert_id: None,
            product_id: "PROD-005".to_string(),
            product_name: None,
            vendor: "Central Warehouse".to_string(),
            quantity: 100,
            delivery_date: None,
            remark: None,
            warehouse_id: "WH-WEST".to_string(),
            warehouse_name: "West Warehouse".to_string(),
            reason: None,
        })
        .await
        .unwrap();

    app.services
        .replenishment
        .decide(&request.request_id, "APPROVED", None)
        .await
        .unwrap();

    let transfer = app
        .services
        .transfers
        .create_dispatched(transfer_cmd(
            "PROD-005",
            "WH-CENTRAL",
            "WH-WEST",
            100,
            Some(request.request_id.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(transfer.request_id.as_deref(), Some(request.request_id.as_str()));

    let requests = app
        .services
        .replenishment
        .list_requests(Some("IN_TRANSIT"), Some("WH-WEST"))
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request_id, request.request_id);

    let progress = decode_progress(&requests[0].progress);
    // 3 seeded + 1 approval + 3 allocation entries
    assert_eq!(progress.len(), 7);
    assert_eq!(progress[4].title, "Transfer Order Created");
    assert_eq!(progress[5].title, "Transfer Order Dispatched");
    assert_eq!(progress[6].title, "Replenishment In Transit");
}

/// Duplicate low-stock signals fold into the open PENDING transfer on the
/// route; an in-transit route rejects new bookings.
#[tokio::test]
async fn open_route_merges_or_conflicts() {
    let app = common::setup().await;

    let first = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-006",
            "WH-SOUTH",
            "STORE-SOUTH-01",
            40,
            None,
        ))
        .await
        .unwrap();

    // Larger signal raises the quantity in place
    let merged = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-006",
            "WH-SOUTH",
            "STORE-SOUTH-01",
            55,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(merged.transfer_id, first.transfer_id);
    assert_eq!(merged.quantity, 55);
    let history = decode_history(&merged.history);
    assert_eq!(history.len(), 2);
    assert!(history[1].note.contains("raised from 40 to 55"));

    // Smaller signal is absorbed without change
    let unchanged = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-006",
            "WH-SOUTH",
            "STORE-SOUTH-01",
            30,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(unchanged.transfer_id, first.transfer_id);
    assert_eq!(unchanged.quantity, 55);

    let all = app.services.transfers.list(None, None).await.unwrap();
    assert_eq!(all.len(), 1);

    // Once in transit, the route refuses new bookings
    app.adjust("PROD-006", "WH-SOUTH", 500).await;
    app.services
        .transfers
        .dispatch(
            &first.transfer_id,
            DispatchCommand {
                carrier: "JD Logistics".to_string(),
                departure: Utc::now(),
                remark: None,
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-006",
            "WH-SOUTH",
            "STORE-SOUTH-01",
            20,
            None,
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn list_filters_by_location_and_status() {
    let app = common::setup().await;

    app.services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-001",
            "WH-EAST",
            "STORE-OUTLET-01",
            10,
            None,
        ))
        .await
        .unwrap();
    app.services
        .transfers
        .create_pending(transfer_cmd(
            "PROD-001",
            "WH-WEST",
            "STORE-OUTLET-02",
            10,
            None,
        ))
        .await
        .unwrap();

    let east = app
        .services
        .transfers
        .list(Some("WH-EAST"), None)
        .await
        .unwrap();
    assert_eq!(east.len(), 1);

    let outlet = app
        .services
        .transfers
        .list(Some("STORE-OUTLET-02"), None)
        .await
        .unwrap();
    assert_eq!(outlet.len(), 1);

    let pending = app
        .services
        .transfers
        .list(None, Some("PENDING"))
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let err = app
        .services
        .transfers
        .list(None, Some("TELEPORTED"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
