use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::events::{Event, EventSender};
use crate::notifications::NotificationOutcome;

/// Header carrying the shared static API key on both directions of the
/// supplier integration.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// One line of a newly placed order, as the remote system sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLinePayload {
    pub item_id: Uuid,
    pub product_name: String,
    pub brand: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub order_no: String,
    pub clinic_tenant_id: Uuid,
    pub supplier_tenant_id: Uuid,
    pub total_amount: Decimal,
    pub items: Vec<OrderLinePayload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderPayload {
    pub order_no: String,
    pub clinic_tenant_id: Uuid,
    pub reason: Option<String>,
}

/// Received quantity per line, so the remote system can reconcile its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub item_id: Uuid,
    pub received_quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteOrderPayload {
    /// Base order number: any splitting suffix must already be stripped so
    /// the remote system recognizes the original order.
    pub order_no: String,
    pub clinic_tenant_id: Uuid,
    pub received: Vec<ReceivedLine>,
}

/// Webhook events pushed to the remote supplier system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupplierEvent {
    OrderCreated(NewOrderPayload),
    OrderCancelled(CancelOrderPayload),
    OrderCompleted(CompleteOrderPayload),
}

impl SupplierEvent {
    fn path(&self) -> &'static str {
        match self {
            SupplierEvent::OrderCreated(_) => "/supplier/orders",
            SupplierEvent::OrderCancelled(_) => "/supplier/orders/cancel",
            SupplierEvent::OrderCompleted(_) => "/supplier/orders/complete",
        }
    }

    pub fn order_no(&self) -> &str {
        match self {
            SupplierEvent::OrderCreated(p) => &p.order_no,
            SupplierEvent::OrderCancelled(p) => &p.order_no,
            SupplierEvent::OrderCompleted(p) => &p.order_no,
        }
    }

    fn channel(&self) -> &'static str {
        match self {
            SupplierEvent::OrderCreated(_) => "webhook:order_created",
            SupplierEvent::OrderCancelled(_) => "webhook:order_cancelled",
            SupplierEvent::OrderCompleted(_) => "webhook:order_completed",
        }
    }
}

/// Fire-and-forget webhook delivery to the remote supplier platform. There is
/// no retry queue: the receiving side is idempotent on (order number, event
/// type) and a lost delivery is surfaced on the operator alert channel only.
#[derive(Clone)]
pub struct SupplierWebhookClient {
    client: reqwest::Client,
    api_key: String,
}

impl SupplierWebhookClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
            api_key,
        }
    }

    /// Delivers one event, single attempt, bounded by the client timeout.
    #[instrument(skip(self, event), fields(order_no = %event.order_no()))]
    pub async fn send(&self, base_url: &str, event: &SupplierEvent) -> NotificationOutcome {
        let url = format!("{}{}", base_url.trim_end_matches('/'), event.path());

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(event)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!(%url, "Supplier webhook delivered");
                NotificationOutcome::Sent
            }
            Ok(response) => {
                let reason = format!("supplier responded {}", response.status());
                warn!(%url, %reason, "Supplier webhook rejected");
                NotificationOutcome::Failed(reason)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%url, error = %reason, "Supplier webhook delivery error");
                NotificationOutcome::Failed(reason)
            }
        }
    }

    /// Sends without blocking the caller. The local transaction has already
    /// committed; a failure here is logged and forwarded to the operator
    /// alert channel, never propagated.
    pub fn send_async(&self, base_url: String, event: SupplierEvent, events: Option<EventSender>) {
        let client = self.clone();

        tokio::spawn(async move {
            let outcome = client.send(&base_url, &event).await;
            if let NotificationOutcome::Failed(reason) = outcome {
                error!(
                    order_no = %event.order_no(),
                    %reason,
                    "Async supplier webhook delivery failed"
                );
                if let Some(events) = events {
                    events
                        .send_logged(Event::NotificationFailed {
                            order_number: event.order_no().to_string(),
                            channel: event.channel().to_string(),
                            reason,
                        })
                        .await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order_event() -> SupplierEvent {
        SupplierEvent::OrderCreated(NewOrderPayload {
            order_no: "20260807-AB12CD".into(),
            clinic_tenant_id: Uuid::new_v4(),
            supplier_tenant_id: Uuid::new_v4(),
            total_amount: dec!(240.00),
            items: vec![OrderLinePayload {
                item_id: Uuid::new_v4(),
                product_name: "Saline 0.9% 1L".into(),
                brand: Some("CJ".into()),
                quantity: 12,
                unit_price: dec!(20.00),
                total_price: dec!(240.00),
            }],
            created_at: Utc::now(),
        })
    }

    #[test]
    fn event_paths_follow_supplier_contract() {
        assert_eq!(new_order_event().path(), "/supplier/orders");
        assert_eq!(
            SupplierEvent::OrderCancelled(CancelOrderPayload {
                order_no: "x".into(),
                clinic_tenant_id: Uuid::new_v4(),
                reason: None,
            })
            .path(),
            "/supplier/orders/cancel"
        );
        assert_eq!(
            SupplierEvent::OrderCompleted(CompleteOrderPayload {
                order_no: "x".into(),
                clinic_tenant_id: Uuid::new_v4(),
                received: vec![],
            })
            .path(),
            "/supplier/orders/complete"
        );
    }

    #[test]
    fn event_serialization_is_tagged() {
        let json = serde_json::to_string(&new_order_event()).unwrap();
        assert!(json.contains(r#""type":"order_created""#));
        assert!(json.contains("20260807-AB12CD"));
        assert!(json.contains("Saline 0.9% 1L"));
    }

    #[tokio::test]
    async fn unreachable_supplier_reports_failed_outcome() {
        let client = SupplierWebhookClient::new(
            "test-key-test-key-test".into(),
            Duration::from_millis(200),
        );
        // Reserved TEST-NET address: connection will fail fast
        let outcome = client
            .send("http://192.0.2.1:9", &new_order_event())
            .await;
        assert!(outcome.is_failed());
    }
}
