mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use retailnet_api::entities::replenishment_request::{decode_progress, RequestStatus};
use retailnet_api::entities::transfer_order::TransferStatus;
use retailnet_api::entities::{ReplenishmentAlert, ReplenishmentRequest, TransferOrder};
use retailnet_api::entities::{replenishment_alert, replenishment_request, transfer_order};
use retailnet_api::errors::ServiceError;
use retailnet_api::services::inventory::AdjustInventoryCommand;

#[tokio::test]
async fn creates_records_lazily_with_tier_defaults() {
    let app = common::setup().await;

    let store = app.adjust("PROD-001", "STORE-EAST-01", 100).await;
    assert_eq!(store.total_stock, 200);
    assert_eq!(store.min_threshold, 60);
    assert_eq!(store.max_threshold, 200);
    assert_eq!(store.available, 100);
    assert_eq!(store.region.as_deref(), Some("EAST"));

    let warehouse = app.adjust("PROD-001", "WH-WEST", 400).await;
    assert_eq!(warehouse.total_stock, 1000);
    assert_eq!(warehouse.min_threshold, 100);
    assert_eq!(warehouse.max_threshold, 2000);
    assert_eq!(warehouse.region.as_deref(), Some("WEST"));

    let central = app.adjust("PROD-001", "WH-CENTRAL", 150).await;
    assert_eq!(central.total_stock, 200);
    assert_eq!(central.min_threshold, 0);
    assert_eq!(central.max_threshold, 500);
    assert_eq!(central.region.as_deref(), Some("ALL"));
}

#[tokio::test]
async fn names_persist_once_recorded() {
    let app = common::setup().await;

    app.services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "PROD-001".into(),
            product_name: Some("Casual T-Shirt".into()),
            location_id: "WH-CENTRAL".into(),
            location_name: Some("Central Warehouse".into()),
            delta: 50,
        })
        .await
        .unwrap();

    // An id-only follow-up keeps the recorded display names
    let record = app.adjust("PROD-001", "WH-CENTRAL", -10).await;
    assert_eq!(record.product_name, "Casual T-Shirt");
    assert_eq!(record.location_name, "Central Warehouse");
    assert_eq!(record.available, 40);
}

#[tokio::test]
async fn rejects_zero_delta_and_missing_fields() {
    let app = common::setup().await;

    let err = app
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "PROD-001".into(),
            product_name: None,
            location_id: "WH-CENTRAL".into(),
            location_name: None,
            delta: 0,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "".into(),
            product_name: None,
            location_id: "WH-CENTRAL".into(),
            location_name: None,
            delta: 5,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn insufficient_stock_leaves_record_unchanged() {
    let app = common::setup().await;

    let before = app.adjust("PROD-001", "WH-CENTRAL", 10).await;

    let err = app
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "PROD-001".into(),
            product_name: None,
            location_id: "WH-CENTRAL".into(),
            location_name: None,
            delta: -30,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let after = app
        .services
        .inventory
        .get_inventory("PROD-001", "WH-CENTRAL")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn capacity_exceeded_leaves_record_unchanged() {
    let app = common::setup().await;

    let before = app.adjust("PROD-001", "WH-CENTRAL", 150).await;

    let err = app
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "PROD-001".into(),
            product_name: None,
            location_id: "WH-CENTRAL".into(),
            location_name: None,
            delta: 100,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::CapacityExceeded(_));

    let after = app
        .services
        .inventory
        .get_inventory("PROD-001", "WH-CENTRAL")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn negative_delta_on_unseen_location_is_insufficient() {
    let app = common::setup().await;

    let err = app
        .services
        .inventory
        .adjust_inventory(AdjustInventoryCommand {
            product_sku: "PROD-009".into(),
            product_name: None,
            location_id: "WH-CENTRAL".into(),
            location_name: None,
            delta: -1,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert!(app
        .services
        .inventory
        .get_inventory("PROD-009", "WH-CENTRAL")
        .await
        .unwrap()
        .is_none());
}

/// Store breach creates a pending transfer from the resident warehouse plus
/// an open request toward central; a repeated signal raises the transfer
/// quantity instead of duplicating it.
#[tokio::test]
async fn store_breach_cascades_into_transfer_and_request() {
    let app = common::setup().await;

    app.adjust("PROD-001", "STORE-EAST-01", 200).await;
    app.adjust("PROD-001", "STORE-EAST-01", -150).await; // 50 < 60: breach

    let transfers = TransferOrder::find()
        .filter(transfer_order::Column::ProductSku.eq("PROD-001"))
        .filter(transfer_order::Column::FromLocationId.eq("WH-EAST"))
        .filter(transfer_order::Column::ToLocationId.eq("STORE-EAST-01"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].status, TransferStatus::Pending.as_str());
    assert_eq!(transfers[0].quantity, 130); // ceil(180 - 50)

    // Second breach signal merges into the same transfer
    app.adjust("PROD-001", "STORE-EAST-01", -5).await; // 45

    let transfers = TransferOrder::find()
        .filter(transfer_order::Column::ProductSku.eq("PROD-001"))
        .filter(transfer_order::Column::ToLocationId.eq("STORE-EAST-01"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1, "duplicate signal must not duplicate the transfer");
    assert_eq!(transfers[0].quantity, 135); // raised to ceil(180 - 45)

    let requests = ReplenishmentRequest::find()
        .filter(replenishment_request::Column::ProductId.eq("PROD-001"))
        .filter(replenishment_request::Column::WarehouseId.eq("WH-EAST"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, RequestStatus::Pending.as_str());
    assert_eq!(requests[0].vendor, "Central Warehouse");

    let progress = decode_progress(&requests[0].progress);
    assert_eq!(progress.len(), 3);
    assert_eq!(progress[0].title, "Replenishment Alert Generated");
    assert_eq!(progress[1].title, "Application Submitted");
    assert_eq!(progress[2].title, "Waiting for Approval");

    let alert = ReplenishmentAlert::find()
        .filter(replenishment_alert::Column::ProductId.eq("PROD-001"))
        .filter(replenishment_alert::Column::WarehouseId.eq("WH-EAST"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("store breach should raise an alert for the resident warehouse");
    assert_eq!(alert.trigger, "Store inventory below threshold");
}

/// Warehouse crossing its 30% threshold raises a warning alert sized toward
/// 90% capacity and queues a request toward central.
#[tokio::test]
async fn warehouse_breach_raises_alert_and_request() {
    let app = common::setup().await;

    app.adjust("PROD-002", "WH-WEST", 310).await; // above 300, no breach
    assert_eq!(
        ReplenishmentAlert::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );

    let record = app.adjust("PROD-002", "WH-WEST", -15).await; // 295 < 300
    assert_eq!(record.available, 295);

    let alert = ReplenishmentAlert::find()
        .filter(replenishment_alert::Column::ProductId.eq("PROD-002"))
        .filter(replenishment_alert::Column::WarehouseId.eq("WH-WEST"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("breach should raise an alert");
    assert_eq!(alert.level, "warning"); // 295 >= 150
    assert_eq!(alert.level_label, "Warning");
    assert_eq!(alert.stock, 295);
    assert_eq!(alert.suggested, 605); // ceil(900 - 295)
    assert_eq!(alert.threshold, 300);

    let requests = ReplenishmentRequest::find()
        .filter(replenishment_request::Column::ProductId.eq("PROD-002"))
        .filter(replenishment_request::Column::WarehouseId.eq("WH-WEST"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].quantity, 605);
}

/// Re-running the cascade with no stock change keeps exactly one alert row.
#[tokio::test]
async fn alert_upsert_is_idempotent() {
    let app = common::setup().await;

    app.adjust("PROD-002", "WH-WEST", 310).await;
    app.adjust("PROD-002", "WH-WEST", -15).await; // 295, breach
    app.adjust("PROD-002", "WH-WEST", -1).await; // 294, still breached
    app.adjust("PROD-002", "WH-WEST", -1).await; // 293

    let alerts = ReplenishmentAlert::find()
        .filter(replenishment_alert::Column::ProductId.eq("PROD-002"))
        .filter(replenishment_alert::Column::WarehouseId.eq("WH-WEST"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].stock, 293);
}

/// Stock recovery above the threshold retracts the advisory.
#[tokio::test]
async fn recovery_clears_warehouse_alert() {
    let app = common::setup().await;

    app.adjust("PROD-003", "WH-NORTH", 310).await;
    app.adjust("PROD-003", "WH-NORTH", -15).await; // breach
    assert_eq!(
        ReplenishmentAlert::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        1
    );

    app.adjust("PROD-003", "WH-NORTH", 500).await; // 795, recovered
    assert_eq!(
        ReplenishmentAlert::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );
}

/// Deep breaches are urgent.
#[tokio::test]
async fn deep_warehouse_breach_is_urgent() {
    let app = common::setup().await;

    app.adjust("PROD-004", "WH-SOUTH", 310).await;
    app.adjust("PROD-004", "WH-SOUTH", -190).await; // 120 < 150

    let alert = ReplenishmentAlert::find()
        .filter(replenishment_alert::Column::ProductId.eq("PROD-004"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.level, "danger");
    assert_eq!(alert.level_label, "Urgent");
}
