use std::sync::Arc;

use tokio::sync::mpsc;

use retailnet_api::config::NetworkConfig;
use retailnet_api::db::{self, DbConfig, DbPool};
use retailnet_api::events::{process_events, EventSender};
use retailnet_api::handlers::AppServices;
use retailnet_api::services::inventory::AdjustInventoryCommand;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub network: Arc<NetworkConfig>,
    pub services: AppServices,
}

/// Boots an isolated in-memory database with the full schema and the service
/// stack wired the way the binary wires it.
///
/// A single pooled connection keeps `sqlite::memory:` pointing at one
/// database across the whole test.
pub async fn setup() -> TestApp {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .expect("failed to connect to sqlite memory db");
    db::run_migrations(&pool).await.expect("migrations failed");

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(256);
    let event_sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let network = Arc::new(NetworkConfig::default());
    let services = AppServices::new(db.clone(), network.clone(), event_sender);

    TestApp {
        db,
        network,
        services,
    }
}

impl TestApp {
    /// Applies a delta through the orchestrator, panicking on failure.
    pub async fn adjust(
        &self,
        product: &str,
        location: &str,
        delta: i32,
    ) -> retailnet_api::entities::inventory_record::Model {
        self.services
            .inventory
            .adjust_inventory(AdjustInventoryCommand {
                product_sku: product.to_string(),
                product_name: None,
                location_id: location.to_string(),
                location_name: None,
                delta,
            })
            .await
            .unwrap_or_else(|e| panic!("adjust {} at {} by {} failed: {}", product, location, delta, e))
    }
}
