use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::replenishment_alert::Severity;

/// Events emitted by the inventory and replenishment services.
///
/// Events are broadcast after the owning transaction commits; consumers see
/// only state that is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryAdjusted {
        product_id: String,
        location_id: String,
        delta: i32,
        available: i32,
    },
    StockTransferred {
        product_id: String,
        from_location_id: String,
        to_location_id: String,
        quantity: i32,
    },
    AlertRaised {
        product_id: String,
        warehouse_id: String,
        severity: Severity,
    },
    AlertCleared {
        product_id: String,
        warehouse_id: String,
    },
    RequestSubmitted {
        request_id: String,
        product_id: String,
        warehouse_id: String,
        quantity: i32,
    },
    RequestDecided {
        request_id: String,
        decision: String,
    },
    TransferCreated {
        transfer_id: String,
        product_sku: String,
        from_location_id: String,
        to_location_id: String,
        quantity: i32,
    },
    TransferDispatched {
        transfer_id: String,
        carrier: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends a batch of events, logging (not surfacing) delivery failures.
    ///
    /// Used after a transaction commits: a failed advisory broadcast must not
    /// fail a committed mutation.
    pub async fn send_all_logged(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.send(event).await {
                warn!("Dropping domain event: {}", e);
            }
        }
    }
}

/// Consumes events from the channel and logs them.
///
/// External delivery (webhooks, notifications) is out of scope; the consumer
/// exists so every cascade step leaves an observable trace.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::InventoryAdjusted {
                product_id,
                location_id,
                delta,
                available,
            } => {
                info!(
                    product_id,
                    location_id, delta, available, "Inventory adjusted"
                );
            }
            Event::StockTransferred {
                product_id,
                from_location_id,
                to_location_id,
                quantity,
            } => {
                info!(
                    product_id,
                    from = from_location_id,
                    to = to_location_id,
                    quantity,
                    "Stock transferred"
                );
            }
            Event::AlertRaised {
                product_id,
                warehouse_id,
                severity,
            } => {
                warn!(
                    product_id,
                    warehouse_id,
                    severity = severity.as_str(),
                    "Replenishment alert raised"
                );
            }
            Event::AlertCleared {
                product_id,
                warehouse_id,
            } => {
                info!(product_id, warehouse_id, "Replenishment alert cleared");
            }
            Event::RequestSubmitted {
                request_id,
                product_id,
                warehouse_id,
                quantity,
            } => {
                info!(
                    request_id,
                    product_id, warehouse_id, quantity, "Replenishment request submitted"
                );
            }
            Event::RequestDecided {
                request_id,
                decision,
            } => {
                info!(request_id, decision, "Replenishment request decided");
            }
            Event::TransferCreated {
                transfer_id,
                product_sku,
                from_location_id,
                to_location_id,
                quantity,
            } => {
                info!(
                    transfer_id,
                    product_sku,
                    from = from_location_id,
                    to = to_location_id,
                    quantity,
                    "Transfer order created"
                );
            }
            Event::TransferDispatched {
                transfer_id,
                carrier,
            } => {
                info!(transfer_id, carrier, "Transfer order dispatched");
            }
        }
    }

    warn!("Event processing loop has ended");
}
