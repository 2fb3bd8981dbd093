//! Embedded schema migrations.
//!
//! The partial unique indexes in the last migration are load-bearing: they
//! are what turns the cascade's existence-check-then-create patterns into
//! safe upserts under concurrent writers.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240501_000001_create_inventory_records_table::Migration),
            Box::new(m20240501_000002_create_replenishment_tables::Migration),
            Box::new(m20240501_000003_create_transfer_tables::Migration),
            Box::new(m20240501_000004_add_open_work_dedup_indexes::Migration),
        ]
    }
}

// Migration implementations

mod m20240501_000001_create_inventory_records_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000001_create_inventory_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryRecords::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::ProductId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::LocationId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::LocationName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryRecords::Region).string().null())
                        .col(
                            ColumnDef::new(InventoryRecords::TotalStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Available)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::MinThreshold)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::MaxThreshold)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::LastUpdated)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One ledger row per (product, location); upsert_and_adjust
            // relies on this to resolve creation races.
            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_records_product_location")
                        .table(InventoryRecords::Table)
                        .col(InventoryRecords::ProductId)
                        .col(InventoryRecords::LocationId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryRecords {
        Table,
        Id,
        ProductId,
        ProductName,
        LocationId,
        LocationName,
        Region,
        TotalStock,
        Available,
        MinThreshold,
        MaxThreshold,
        LastUpdated,
        CreatedAt,
    }
}

mod m20240501_000002_create_replenishment_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000002_create_replenishment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReplenishmentAlerts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::AlertId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::ProductId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::WarehouseId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::WarehouseName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Stock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Suggested)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::ShortageQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Threshold)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Trigger)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::Level)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::LevelLabel)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentAlerts::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Upsert key: at most one live alert per (product, warehouse)
            manager
                .create_index(
                    Index::create()
                        .name("idx_replenishment_alerts_product_warehouse")
                        .table(ReplenishmentAlerts::Table)
                        .col(ReplenishmentAlerts::ProductId)
                        .col(ReplenishmentAlerts::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReplenishmentRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReplenishmentRequests::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::RequestId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::ProductId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::Vendor)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::WarehouseId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::WarehouseName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::DeliveryDate)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReplenishmentRequests::Reason).string().null())
                        .col(ColumnDef::new(ReplenishmentRequests::Remark).string().null())
                        .col(
                            ColumnDef::new(ReplenishmentRequests::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::Progress)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReplenishmentRequests::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Display id lookups; also the regenerate-on-conflict backstop
            manager
                .create_index(
                    Index::create()
                        .name("idx_replenishment_requests_request_id")
                        .table(ReplenishmentRequests::Table)
                        .col(ReplenishmentRequests::RequestId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReplenishmentRequests::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ReplenishmentAlerts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReplenishmentAlerts {
        Table,
        Id,
        AlertId,
        ProductId,
        ProductName,
        WarehouseId,
        WarehouseName,
        Stock,
        Suggested,
        ShortageQty,
        Threshold,
        Trigger,
        Level,
        LevelLabel,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ReplenishmentRequests {
        Table,
        Id,
        RequestId,
        ProductId,
        ProductName,
        Vendor,
        Quantity,
        WarehouseId,
        WarehouseName,
        DeliveryDate,
        Reason,
        Remark,
        Status,
        Progress,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240501_000003_create_transfer_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000003_create_transfer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TransferOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferOrders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::TransferId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::ProductSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::FromLocationId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::FromLocationName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::ToLocationId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::ToLocationName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferOrders::Status).string().not_null())
                        .col(ColumnDef::new(TransferOrders::History).json().not_null())
                        .col(
                            ColumnDef::new(TransferOrders::InventoryUpdated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(TransferOrders::RequestId).string().null())
                        .col(ColumnDef::new(TransferOrders::Carrier).string().null())
                        .col(ColumnDef::new(TransferOrders::DepartedAt).timestamp().null())
                        .col(
                            ColumnDef::new(TransferOrders::DispatchRemark)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_transfer_orders_transfer_id")
                        .table(TransferOrders::Table)
                        .col(TransferOrders::TransferId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceivingSchedules::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceivingSchedules::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::PlanNo)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::Supplier)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceivingSchedules::Eta).timestamp().not_null())
                        .col(ColumnDef::new(ReceivingSchedules::Dock).string().not_null())
                        .col(
                            ColumnDef::new(ReceivingSchedules::Items)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::ProductSku)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::StorageLocationId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::QualityLevel)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceivingSchedules::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceivingSchedules::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransferOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TransferOrders {
        Table,
        Id,
        TransferId,
        ProductSku,
        ProductName,
        Quantity,
        FromLocationId,
        FromLocationName,
        ToLocationId,
        ToLocationName,
        Status,
        History,
        InventoryUpdated,
        RequestId,
        Carrier,
        DepartedAt,
        DispatchRemark,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ReceivingSchedules {
        Table,
        Id,
        PlanNo,
        Supplier,
        Eta,
        Dock,
        Items,
        ProductSku,
        ProductName,
        Quantity,
        StorageLocationId,
        QualityLevel,
        Status,
        CreatedAt,
    }
}

mod m20240501_000004_add_open_work_dedup_indexes {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000004_add_open_work_dedup_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Partial unique indexes enforcing the "no duplicate open work
            // items" invariant. sea-query's index builder cannot express a
            // WHERE clause, so these are raw SQL; the predicate lists must
            // stay in sync with RequestStatus::open() / TransferStatus::open().
            let conn = manager.get_connection();

            conn.execute_unprepared(
                "CREATE UNIQUE INDEX idx_replenishment_requests_open \
                 ON replenishment_requests (product_id, warehouse_id) \
                 WHERE status IN ('PENDING', 'PROCESSING', 'APPROVED')",
            )
            .await?;

            conn.execute_unprepared(
                "CREATE UNIQUE INDEX idx_transfer_orders_open_route \
                 ON transfer_orders (product_sku, from_location_id, to_location_id) \
                 WHERE status IN ('PENDING', 'IN_TRANSIT')",
            )
            .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let conn = manager.get_connection();
            conn.execute_unprepared("DROP INDEX idx_transfer_orders_open_route")
                .await?;
            conn.execute_unprepared("DROP INDEX idx_replenishment_requests_open")
                .await?;
            Ok(())
        }
    }
}
