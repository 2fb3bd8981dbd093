pub mod inventory_record;
pub mod receiving_schedule;
pub mod replenishment_alert;
pub mod replenishment_request;
pub mod transfer_order;

pub use inventory_record::Entity as InventoryRecord;
pub use receiving_schedule::Entity as ReceivingSchedule;
pub use replenishment_alert::Entity as ReplenishmentAlert;
pub use replenishment_request::Entity as ReplenishmentRequest;
pub use transfer_order::Entity as TransferOrder;
