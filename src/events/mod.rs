use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Sending half of the in-process event bus.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging (never propagating) failure. Domain events are
    /// best-effort side channels, not part of any transaction.
    pub async fn send_logged(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Failed to publish domain event");
        }
    }
}

// The events that can occur in the ordering/inventory engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle events
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        tenant_id: Uuid,
    },
    OrderCancelled {
        order_id: Uuid,
        order_number: String,
    },
    OrderCompleted {
        order_id: Uuid,
        order_number: String,
    },
    OrderConfirmed {
        order_id: Uuid,
        order_number: String,
        adjusted: bool,
    },
    OrderRejected {
        order_id: Uuid,
        order_number: String,
    },
    OrderSplit {
        original_order_id: Uuid,
        completed_order_number: String,
        remainder_order_number: Option<String>,
    },
    OrderDeleted(Uuid),

    // Draft events
    DraftConverted {
        tenant_id: Uuid,
        session_id: String,
        order_count: usize,
    },

    // Stock events
    StockDeducted {
        tenant_id: Uuid,
        product_id: Uuid,
        batch_id: Uuid,
        quantity: i32,
        new_aggregate: i32,
    },

    // Return events
    ReturnCreated {
        return_id: Uuid,
        return_no: String,
    },
    ReturnCompleted {
        return_id: Uuid,
        return_no: String,
    },

    // Operator alert channel for failed best-effort notifications
    NotificationFailed {
        order_number: String,
        channel: String,
        reason: String,
    },
}

// Processes incoming events and fans them out to side-effect handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated {
                order_id,
                ref order_number,
                tenant_id,
            } => {
                info!(%order_id, %order_number, %tenant_id, "Order created");
            }
            Event::OrderConfirmed {
                order_id,
                ref order_number,
                adjusted,
            } => {
                info!(%order_id, %order_number, adjusted, "Order confirmed by supplier");
            }
            Event::OrderRejected {
                order_id,
                ref order_number,
            } => {
                warn!(%order_id, %order_number, "Order rejected by supplier");
            }
            Event::OrderSplit {
                original_order_id,
                ref completed_order_number,
                ref remainder_order_number,
            } => {
                info!(
                    %original_order_id,
                    %completed_order_number,
                    remainder = remainder_order_number.as_deref().unwrap_or("-"),
                    "Order split on partial inbound"
                );
            }
            Event::StockDeducted {
                product_id,
                batch_id,
                quantity,
                new_aggregate,
                ..
            } => {
                info!(%product_id, %batch_id, quantity, new_aggregate, "Stock deducted");
                if new_aggregate < 10 {
                    warn!(
                        %product_id,
                        remaining = new_aggregate,
                        "Low stock after outbound"
                    );
                }
            }
            Event::NotificationFailed {
                ref order_number,
                ref channel,
                ref reason,
            } => {
                // Operator alert channel: the primary operation has already
                // committed, this is the only place the failure surfaces.
                error!(%order_number, %channel, %reason, "Best-effort notification failed");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_logged_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out even though the receiver is gone
        sender.send_logged(Event::OrderDeleted(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender
            .send(Event::OrderCancelled {
                order_id,
                order_number: "20260807-ABC123".into(),
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::OrderCancelled { order_id: got, .. }) => assert_eq!(got, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
