/// Webhook delivery to the remote supplier platform.
pub mod supplier;

pub use supplier::{
    CancelOrderPayload, CompleteOrderPayload, NewOrderPayload, OrderLinePayload, ReceivedLine,
    SupplierEvent, SupplierWebhookClient,
};
