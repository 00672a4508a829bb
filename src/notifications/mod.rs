//! Notification port for manual-supplier contact channels (SMS/email).
//!
//! Delivery providers live outside this system; the port is injected into the
//! order lifecycle so failure handling stays uniform and testable without a
//! real network. All sends are best-effort: outcomes are reported, never
//! propagated as errors into the primary operation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Outcome of a best-effort notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationOutcome {
    Sent,
    Skipped(String),
    Failed(String),
}

impl NotificationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, NotificationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactEvent {
    OrderCreated,
    OrderCancelled,
}

/// Message handed to the contact channels for a manually-entered supplier.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub event: ContactEvent,
    pub order_number: String,
    pub supplier_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub total_amount: Decimal,
    pub item_count: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &ContactMessage) -> NotificationOutcome;
}

/// Default notifier: hands the message to the external SMS/email gateways.
/// The gateways themselves are out of scope; this implementation records the
/// handoff and reports `Skipped` when the contact has no reachable channel.
#[derive(Debug, Clone, Default)]
pub struct ContactNotifier;

#[async_trait]
impl Notifier for ContactNotifier {
    #[instrument(skip(self, message), fields(order_number = %message.order_number))]
    async fn notify(&self, message: &ContactMessage) -> NotificationOutcome {
        if message.phone.is_none() && message.email.is_none() {
            let reason = format!(
                "supplier '{}' has neither phone nor email on file",
                message.supplier_name
            );
            warn!(%reason, "Skipping contact notification");
            return NotificationOutcome::Skipped(reason);
        }

        info!(
            event = ?message.event,
            supplier = %message.supplier_name,
            phone = message.phone.as_deref().unwrap_or("-"),
            email = message.email.as_deref().unwrap_or("-"),
            items = message.item_count,
            total = %message.total_amount,
            "Contact notification dispatched"
        );
        NotificationOutcome::Sent
    }
}
