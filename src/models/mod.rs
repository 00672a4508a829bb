use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub mod order_number;

pub use order_number::{OrderNumber, OrderVariant};

/// Enum representing the possible statuses of an order.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "supplier_confirmed")]
    SupplierConfirmed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "confirmed_rejected")]
    ConfirmedRejected,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Cancelled
                | OrderStatus::Archived
                | OrderStatus::ConfirmedRejected
        )
    }

    /// Cancellation is only legal before goods move.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::SupplierConfirmed)
    }

    /// Validates a state-machine transition.
    pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Pending, SupplierConfirmed) => true,
            (Pending, Rejected) => true,
            (Pending, Cancelled) => true,
            (Pending, Archived) => true,

            (SupplierConfirmed, Completed) => true,
            (SupplierConfirmed, Cancelled) => true,
            (SupplierConfirmed, Archived) => true,

            (Rejected, ConfirmedRejected) => true,
            (Rejected, Archived) => true,

            // Re-delivery of the same webhook lands on the same status
            _ if self == to => true,

            _ => false,
        }
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(OrderStatus::Pending),
            "supplier_confirmed" => Some(OrderStatus::SupplierConfirmed),
            "rejected" => Some(OrderStatus::Rejected),
            "confirmed_rejected" => Some(OrderStatus::ConfirmedRejected),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            "archived" => Some(OrderStatus::Archived),
            _ => None,
        }
    }
}

/// Enum representing the possible statuses of a supplier return.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Enum representing the kind of an outbound (dispensing) transaction.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    #[sea_orm(string_value = "plain")]
    Plain,
    #[sea_orm(string_value = "package")]
    Package,
    #[sea_orm(string_value = "unified")]
    Unified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_only_legal_before_goods_move() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::SupplierConfirmed.can_cancel());
        assert!(!OrderStatus::Completed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
        assert!(!OrderStatus::Archived.can_cancel());
    }

    #[test]
    fn transition_table_rejects_backward_moves() {
        assert!(OrderStatus::Pending.can_transition_to(&OrderStatus::SupplierConfirmed));
        assert!(OrderStatus::SupplierConfirmed.can_transition_to(&OrderStatus::Completed));
        assert!(OrderStatus::Rejected.can_transition_to(&OrderStatus::ConfirmedRejected));
        assert!(!OrderStatus::Completed.can_transition_to(&OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(&OrderStatus::SupplierConfirmed));
        assert!(!OrderStatus::SupplierConfirmed.can_transition_to(&OrderStatus::Rejected));
    }

    #[test]
    fn duplicate_delivery_is_a_noop_transition() {
        assert!(
            OrderStatus::SupplierConfirmed.can_transition_to(&OrderStatus::SupplierConfirmed)
        );
        assert!(OrderStatus::Rejected.can_transition_to(&OrderStatus::Rejected));
    }

    #[test]
    fn status_parse_accepts_both_spellings_of_cancelled() {
        assert_eq!(OrderStatus::parse("cancelled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("bogus"), None);
    }
}
