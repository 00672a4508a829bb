use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    cache::{views, ViewCache},
    db::DbPool,
    entities::{order, order_item, supplier_contact},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderNumber, OrderStatus, OrderVariant},
    services::drafts::unwrap_txn_err,
    services::orders::{OrderResponse, OrderService},
    services::reconciliation::{match_item, ItemAdjustment},
    webhooks::{CompleteOrderPayload, ReceivedLine, SupplierEvent, SupplierWebhookClient},
};

/// Per-item classification of a partial receipt.
#[derive(Debug, Clone)]
pub struct ItemSplit {
    pub item: order_item::Model,
    /// Quantity physically received; may exceed the ordered quantity.
    pub received: i32,
    /// Ordered quantity still outstanding.
    pub remainder: i32,
}

/// Classifies each order line against the received map: full receipt,
/// partial receipt (split into received and remaining portions), or fully
/// remaining when absent or zero.
pub fn classify_receipts(
    items: &[order_item::Model],
    received: &HashMap<Uuid, i32>,
) -> Vec<ItemSplit> {
    items
        .iter()
        .map(|item| {
            let received_qty = received.get(&item.id).copied().unwrap_or(0);
            let remainder = (item.quantity - received_qty).max(0);
            ItemSplit {
                item: item.clone(),
                received: received_qty,
                remainder,
            }
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SplitOutcome {
    pub completed: OrderResponse,
    pub remainder: Option<OrderResponse>,
    pub archived_order_number: String,
}

/// Inbound order-split callback: the remote side split the order and reports
/// exactly two derivative orders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoteSplitPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub original_order_no: String,
    pub clinic_tenant_id: Uuid,
    pub orders: Vec<RemoteSplitOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoteSplitOrder {
    pub order_no: String,
    pub status: String,
    pub total_amount: Option<Decimal>,
    pub items: Vec<RemoteSplitItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoteSplitItem {
    pub item_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity: i32,
}

/// Splits an order on partial receipt of goods: a completed sub-order for
/// the received portions, an optional supplier_confirmed sub-order for the
/// remainder, and the original archived with a cross-referencing memo —
/// all in one transaction.
#[derive(Clone)]
pub struct InboundService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    webhooks: SupplierWebhookClient,
    cache: ViewCache,
}

impl InboundService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        webhooks: SupplierWebhookClient,
        cache: ViewCache,
    ) -> Self {
        Self {
            db,
            event_sender,
            webhooks,
            cache,
        }
    }

    /// Applies a partial receipt to an order.
    #[instrument(skip(self, received), fields(tenant_id = %tenant_id, order_id = %order_id))]
    pub async fn split_receive(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        received: HashMap<Uuid, i32>,
    ) -> Result<SplitOutcome, ServiceError> {
        if received.values().any(|&qty| qty < 0) {
            return Err(ServiceError::ValidationError(
                "Received quantities must not be negative".to_string(),
            ));
        }
        if !received.values().any(|&qty| qty > 0) {
            return Err(ServiceError::ValidationError(
                "Nothing received; at least one line must have a positive quantity".to_string(),
            ));
        }

        let received_for_txn = received.clone();
        let (completed, remainder, original) = self
            .db
            .transaction::<_, SplitResult, ServiceError>(move |txn| {
                let received = received_for_txn.clone();
                Box::pin(async move {
                    let original = order::Entity::find_by_id(order_id)
                        .filter(order::Column::TenantId.eq(tenant_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    if !original.status.can_transition_to(&OrderStatus::Archived) {
                        return Err(ServiceError::Conflict(format!(
                            "Cannot receive against order {} in status {}",
                            original.order_number, original.status
                        )));
                    }

                    let items = order_item::Entity::find()
                        .filter(order_item::Column::OrderId.eq(order_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    let splits = classify_receipts(&items, &received);
                    let number = OrderNumber::parse(&original.order_number);

                    let received_portions: Vec<(order_item::Model, i32)> = splits
                        .iter()
                        .filter(|s| s.received > 0)
                        .map(|s| (s.item.clone(), s.received))
                        .collect();
                    let remaining_portions: Vec<(order_item::Model, i32)> = splits
                        .iter()
                        .filter(|s| s.remainder > 0)
                        .map(|s| (s.item.clone(), s.remainder))
                        .collect();

                    let completed = Self::insert_derived(
                        txn,
                        &original,
                        &number.with_variant(OrderVariant::Completed),
                        OrderStatus::Completed,
                        &received_portions,
                    )
                    .await?;

                    let remainder = if remaining_portions.is_empty() {
                        None
                    } else {
                        Some(
                            Self::insert_derived(
                                txn,
                                &original,
                                &number.with_variant(OrderVariant::Pending),
                                OrderStatus::SupplierConfirmed,
                                &remaining_portions,
                            )
                            .await?,
                        )
                    };

                    let mut memo = format!("Split into {}", completed.0.order_number);
                    if let Some((remainder_order, _)) = &remainder {
                        memo.push_str(&format!(" and {}", remainder_order.order_number));
                    }

                    let version = original.version;
                    let original_id = original.id;
                    let mut active: order::ActiveModel = original.into();
                    active.status = Set(OrderStatus::Archived);
                    active.memo = Set(Some(memo));
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));
                    let archived =
                        active.update(txn).await.map_err(ServiceError::DatabaseError)?;

                    info!(
                        original_order_id = %original_id,
                        completed = %completed.0.order_number,
                        "Order split on partial inbound"
                    );

                    Ok((completed, remainder, archived))
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        self.event_sender
            .send_logged(Event::OrderSplit {
                original_order_id: original.id,
                completed_order_number: completed.0.order_number.clone(),
                remainder_order_number: remainder.as_ref().map(|(o, _)| o.order_number.clone()),
            })
            .await;

        self.notify_received(tenant_id, &original, &received).await;

        Ok(SplitOutcome {
            completed: OrderService::to_response(completed.0, completed.1),
            remainder: remainder.map(|(o, i)| OrderService::to_response(o, i)),
            archived_order_number: original.order_number,
        })
    }

    /// Mirrors a remote-initiated split locally. Idempotent: if the original
    /// is already archived and both derivatives exist, the duplicate delivery
    /// is a logged no-op.
    #[instrument(skip(self, payload), fields(original = %payload.original_order_no))]
    pub async fn apply_remote_split(
        &self,
        payload: RemoteSplitPayload,
    ) -> Result<(), ServiceError> {
        if payload.orders.len() != 2 {
            return Err(ServiceError::ValidationError(format!(
                "Order split callback must carry exactly two orders, got {}",
                payload.orders.len()
            )));
        }

        let tenant_id = payload.clinic_tenant_id;
        let base = OrderNumber::parse(&payload.original_order_no).base;

        let original = order::Entity::find()
            .filter(order::Column::TenantId.eq(tenant_id))
            .filter(order::Column::OrderNumber.eq(base.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", base)))?;

        if original.status == OrderStatus::Archived {
            info!(order_number = %base, "Original already archived, duplicate split callback ignored");
            return Ok(());
        }

        let original_id = original.id;
        let payload_for_txn = payload.clone();
        let (completed_no, remainder_no) = self
            .db
            .transaction::<_, (String, Option<String>), ServiceError>(move |txn| {
                let payload = payload_for_txn.clone();
                Box::pin(async move {
                    let original = order::Entity::find_by_id(original_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", original_id))
                        })?;

                    let items = order_item::Entity::find()
                        .filter(order_item::Column::OrderId.eq(original_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    let mut derived_numbers: Vec<(String, OrderStatus)> = Vec::new();
                    for remote_order in &payload.orders {
                        let status = OrderStatus::parse(&remote_order.status).ok_or_else(|| {
                            ServiceError::InvalidStatus(format!(
                                "Unknown status in split callback: {}",
                                remote_order.status
                            ))
                        })?;

                        let portions = Self::resolve_remote_portions(&items, remote_order);
                        if portions.is_empty() {
                            warn!(
                                order_no = %remote_order.order_no,
                                "No split callback line matched a local item"
                            );
                        }

                        let number = OrderNumber::parse(&remote_order.order_no);
                        Self::insert_derived(txn, &original, &number, status.clone(), &portions)
                            .await?;
                        derived_numbers.push((remote_order.order_no.clone(), status));
                    }

                    let completed_no = derived_numbers
                        .iter()
                        .find(|(_, s)| *s == OrderStatus::Completed)
                        .map(|(n, _)| n.clone())
                        .unwrap_or_else(|| derived_numbers[0].0.clone());
                    let remainder_no = derived_numbers
                        .iter()
                        .find(|(n, _)| *n != completed_no)
                        .map(|(n, _)| n.clone());

                    let mut memo = format!("Split into {}", completed_no);
                    if let Some(remainder) = &remainder_no {
                        memo.push_str(&format!(" and {}", remainder));
                    }

                    let version = original.version;
                    let mut active: order::ActiveModel = original.into();
                    active.status = Set(OrderStatus::Archived);
                    active.memo = Set(Some(memo));
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::DatabaseError)?;

                    Ok((completed_no, remainder_no))
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        self.event_sender
            .send_logged(Event::OrderSplit {
                original_order_id: original_id,
                completed_order_number: completed_no,
                remainder_order_number: remainder_no,
            })
            .await;

        Ok(())
    }

    // ---- internals ----

    async fn insert_derived<C: ConnectionTrait>(
        txn: &C,
        original: &order::Model,
        number: &OrderNumber,
        status: OrderStatus,
        portions: &[(order_item::Model, i32)],
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let total: Decimal = portions
            .iter()
            .map(|(item, qty)| item.unit_price * Decimal::from(*qty))
            .sum();

        let confirmed_at = match status {
            OrderStatus::Completed | OrderStatus::SupplierConfirmed => {
                original.confirmed_at.or_else(|| Some(Utc::now()))
            }
            _ => original.confirmed_at,
        };

        let derived = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(original.tenant_id),
            order_number: Set(number.to_string()),
            status: Set(status),
            supplier_id: Set(original.supplier_id),
            total_amount: Set(total),
            confirmed_at: Set(confirmed_at),
            adjustments: Set(None),
            memo: Set(Some(format!("Derived from {}", original.order_number))),
            created_by: Set(original.created_by.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        let mut items = Vec::with_capacity(portions.len());
        for (source, quantity) in portions {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(derived.id),
                product_id: Set(source.product_id),
                batch_id: Set(source.batch_id),
                product_name: Set(source.product_name.clone()),
                brand: Set(source.brand.clone()),
                quantity: Set(*quantity),
                unit_price: Set(source.unit_price),
                total_price: Set(source.unit_price * Decimal::from(*quantity)),
                memo: Set(source.memo.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            items.push(item);
        }

        Ok((derived, items))
    }

    /// Correlates remote split lines with local items through the same
    /// fallback chain the reconciler uses. Unmatched lines are dropped from
    /// the derivative with a warning.
    fn resolve_remote_portions(
        items: &[order_item::Model],
        remote_order: &RemoteSplitOrder,
    ) -> Vec<(order_item::Model, i32)> {
        let mut portions = Vec::with_capacity(remote_order.items.len());
        for remote_item in &remote_order.items {
            let probe = ItemAdjustment {
                item_id: remote_item.item_id,
                product_id: remote_item.product_id,
                product_name: remote_item.product_name.clone(),
                brand: remote_item.brand.clone(),
                unit_price: remote_item.unit_price,
                adjusted_quantity: None,
                adjusted_unit_price: None,
                reason: None,
            };
            match match_item(items, &probe) {
                Some((item, _)) => portions.push((item.clone(), remote_item.quantity)),
                None => warn!(
                    product_name = remote_item.product_name.as_deref().unwrap_or("-"),
                    "Split callback line did not match any local item"
                ),
            }
        }
        portions
    }

    async fn notify_received(
        &self,
        tenant_id: Uuid,
        original: &order::Model,
        received: &HashMap<Uuid, i32>,
    ) {
        let Some(supplier_id) = original.supplier_id else {
            return;
        };
        let supplier = supplier_contact::Entity::find_by_id(supplier_id)
            .filter(supplier_contact::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .ok()
            .flatten();
        let Some(contact) = supplier else { return };
        if !contact.is_platform_linked() {
            return;
        }
        let Some(base_url) = contact.base_url.clone() else {
            return;
        };

        // Report received quantities keyed by the ORIGINAL item ids: that is
        // the identity the remote system saw at order time
        let payload = CompleteOrderPayload {
            order_no: OrderNumber::parse(&original.order_number).base,
            clinic_tenant_id: tenant_id,
            received: received
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(item_id, qty)| ReceivedLine {
                    item_id: *item_id,
                    received_quantity: *qty,
                })
                .collect(),
        };

        self.webhooks.send_async(
            base_url,
            SupplierEvent::OrderCompleted(payload),
            Some(self.event_sender.clone()),
        );
    }
}

type SplitResult = (
    (order::Model, Vec<order_item::Model>),
    Option<(order::Model, Vec<order_item::Model>)>,
    order::Model,
);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: i32) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_id: None,
            product_name: "Syringe 5ml".into(),
            brand: None,
            quantity,
            unit_price: dec!(1.50),
            total_price: dec!(1.50) * Decimal::from(quantity),
            memo: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn full_receipt_leaves_no_remainder() {
        let items = vec![item(100)];
        let received = HashMap::from([(items[0].id, 100)]);

        let splits = classify_receipts(&items, &received);
        assert_eq!(splits[0].received, 100);
        assert_eq!(splits[0].remainder, 0);
    }

    #[test]
    fn partial_receipt_splits_the_line() {
        let items = vec![item(100)];
        let received = HashMap::from([(items[0].id, 80)]);

        let splits = classify_receipts(&items, &received);
        assert_eq!(splits[0].received, 80);
        assert_eq!(splits[0].remainder, 20);
    }

    #[test]
    fn absent_line_is_fully_remaining() {
        let items = vec![item(100), item(40)];
        let received = HashMap::from([(items[0].id, 100)]);

        let splits = classify_receipts(&items, &received);
        assert_eq!(splits[1].received, 0);
        assert_eq!(splits[1].remainder, 40);
    }

    #[test]
    fn over_receipt_counts_as_fully_received() {
        let items = vec![item(100)];
        let received = HashMap::from([(items[0].id, 120)]);

        let splits = classify_receipts(&items, &received);
        assert_eq!(splits[0].received, 120);
        assert_eq!(splits[0].remainder, 0);
    }

    #[test]
    fn split_payload_requires_snake_case_fields() {
        let json = r#"{
            "type": "order_split",
            "original_order_no": "20260807-AB12CD",
            "clinic_tenant_id": "7f1a0d7e-5f3f-4a2b-9f67-2f2d35c7a001",
            "orders": [
                {"order_no": "20260807-AB12CD-C", "status": "completed", "total_amount": "80", "items": []},
                {"order_no": "20260807-AB12CD-P", "status": "supplier_confirmed", "total_amount": "20", "items": []}
            ]
        }"#;

        let payload: RemoteSplitPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.kind, "order_split");
        assert_eq!(payload.orders.len(), 2);
        assert_eq!(payload.orders[0].order_no, "20260807-AB12CD-C");
    }
}
