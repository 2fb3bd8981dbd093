pub mod health;
pub mod inventory;
pub mod replenishment;
pub mod transfers;

use std::sync::Arc;

use crate::config::NetworkConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::inventory::InventoryService;
use crate::services::replenishment::ReplenishmentService;
use crate::services::transfers::TransferService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub replenishment: Arc<ReplenishmentService>,
    pub transfers: Arc<TransferService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, network: Arc<NetworkConfig>, event_sender: EventSender) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(
                db.clone(),
                network.clone(),
                event_sender.clone(),
            )),
            replenishment: Arc::new(ReplenishmentService::new(
                db.clone(),
                network.clone(),
                event_sender.clone(),
            )),
            transfers: Arc::new(TransferService::new(db, network, event_sender)),
        }
    }
}
