use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    cache::{views, ViewCache},
    db::DbPool,
    entities::{order, order_item, rejected_order_line, supplier_contact},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderNumber, OrderStatus},
    services::drafts::unwrap_txn_err,
};

/// Inbound supplier confirmation callback payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplierConfirmationPayload {
    pub order_no: String,
    pub clinic_tenant_id: Uuid,
    /// `supplier_confirmed` or `rejected`
    pub status: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub adjustments: Vec<ItemAdjustment>,
    #[serde(default)]
    pub updated_items: Vec<RemoteItemSnapshot>,
    pub total_amount: Option<Decimal>,
}

/// One supplier-side adjustment to a line item. The remote system keys lines
/// independently, so correlation data is a mix of echoed local ids and
/// denormalized product attributes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemAdjustment {
    /// Local item id, when the remote system echoed it back.
    pub item_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    /// Unit price as ordered, used for attribute matching.
    pub unit_price: Option<Decimal>,
    pub adjusted_quantity: Option<i32>,
    pub adjusted_unit_price: Option<Decimal>,
    pub reason: Option<String>,
}

/// Remote denormalized snapshot of a line after supplier edits, carried for
/// audit display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItemSnapshot {
    pub remote_item_id: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

/// Which tier of the fallback chain produced a match. Logged on every
/// fallback-tier hit for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    LocalId,
    NameBrandPrice,
    ProductRef,
}

/// Ordered fallback matching chain across the two independently-keyed
/// systems: exact local item id, then (product name, brand, unit price),
/// then product reference. Each tier returns either a unique match or
/// nothing; an ambiguous tier falls through rather than guessing.
pub fn match_item<'a>(
    items: &'a [order_item::Model],
    adjustment: &ItemAdjustment,
) -> Option<(&'a order_item::Model, MatchTier)> {
    if let Some(item_id) = adjustment.item_id {
        if let Some(item) = items.iter().find(|i| i.id == item_id) {
            return Some((item, MatchTier::LocalId));
        }
    }

    if let (Some(name), Some(price)) = (&adjustment.product_name, adjustment.unit_price) {
        let candidates: Vec<&order_item::Model> = items
            .iter()
            .filter(|i| {
                i.product_name == *name
                    && i.brand == adjustment.brand
                    && i.unit_price == price
            })
            .collect();
        match candidates.as_slice() {
            [single] => return Some((single, MatchTier::NameBrandPrice)),
            [] => {}
            many => {
                // Two lines sharing product+price: a latent mis-match risk,
                // flagged instead of silently resolved
                warn!(
                    product_name = %name,
                    candidates = many.len(),
                    "Ambiguous name/brand/price match, falling through"
                );
            }
        }
    }

    if let Some(product_id) = adjustment.product_id {
        let candidates: Vec<&order_item::Model> =
            items.iter().filter(|i| i.product_id == product_id).collect();
        match candidates.as_slice() {
            [single] => return Some((single, MatchTier::ProductRef)),
            [] => {}
            many => {
                warn!(
                    %product_id,
                    candidates = many.len(),
                    "Ambiguous product reference match, falling through"
                );
            }
        }
    }

    None
}

/// Consumes supplier confirmation/rejection callbacks and reconciles local
/// order state against supplier-reported adjustments. Safe under duplicate
/// delivery: re-applying an identical payload is an effective no-op.
#[derive(Clone)]
pub struct ConfirmationReconciler {
    db: Arc<DbPool>,
    event_sender: EventSender,
    cache: ViewCache,
}

impl ConfirmationReconciler {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, cache: ViewCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Applies one confirmation callback. Returns the local order id.
    #[instrument(skip(self, payload), fields(order_no = %payload.order_no, status = %payload.status))]
    pub async fn process_confirmation(
        &self,
        payload: SupplierConfirmationPayload,
    ) -> Result<Uuid, ServiceError> {
        let new_status = OrderStatus::parse(&payload.status).ok_or_else(|| {
            ServiceError::InvalidStatus(format!(
                "Unknown supplier confirmation status: {}",
                payload.status
            ))
        })?;

        if !matches!(
            new_status,
            OrderStatus::SupplierConfirmed | OrderStatus::Rejected
        ) {
            return Err(ServiceError::InvalidStatus(format!(
                "Supplier confirmation cannot set status {}",
                new_status
            )));
        }

        let tenant_id = payload.clinic_tenant_id;
        let base = OrderNumber::parse(&payload.order_no).base;

        let order_model = order::Entity::find()
            .filter(order::Column::TenantId.eq(tenant_id))
            .filter(order::Column::OrderNumber.eq(base.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", base)))?;

        let order_id = order_model.id;
        let supplier = self
            .load_supplier(tenant_id, order_model.supplier_id)
            .await;
        let payload_clone = payload.clone();
        let status_for_txn = new_status.clone();

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                let payload = payload_clone.clone();
                let new_status = status_for_txn.clone();
                let supplier = supplier.clone();
                Box::pin(async move {
                    let current = order::Entity::find_by_id(order_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    if !current.status.can_transition_to(&new_status) {
                        // The remote system is the source of truth for its
                        // own confirmation decision: last-write-wins, flagged
                        warn!(
                            order_number = %current.order_number,
                            from = %current.status,
                            to = %new_status,
                            "Out-of-band supplier status transition applied last-write-wins"
                        );
                    }

                    let items = order_item::Entity::find()
                        .filter(order_item::Column::OrderId.eq(order_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    let adjustments_snapshot = if payload.adjustments.is_empty() {
                        None
                    } else {
                        Some(
                            serde_json::to_string(&payload.adjustments)
                                .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
                        )
                    };

                    let version = current.version;
                    let order_number = current.order_number.clone();
                    let mut active: order::ActiveModel = current.into();
                    active.status = Set(new_status.clone());
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));
                    if let Some(confirmed_at) = payload.confirmed_at {
                        active.confirmed_at = Set(Some(confirmed_at));
                    } else if new_status == OrderStatus::SupplierConfirmed {
                        active.confirmed_at = Set(Some(Utc::now()));
                    }
                    if let Some(total) = payload.total_amount {
                        active.total_amount = Set(total);
                    }
                    if adjustments_snapshot.is_some() {
                        active.adjustments = Set(adjustments_snapshot);
                    }
                    active.update(txn).await.map_err(ServiceError::DatabaseError)?;

                    match new_status {
                        OrderStatus::SupplierConfirmed => {
                            Self::apply_adjustments(txn, &order_number, &items, &payload.adjustments)
                                .await?;
                        }
                        OrderStatus::Rejected => {
                            Self::record_rejections(
                                txn,
                                tenant_id,
                                order_id,
                                &order_number,
                                supplier.as_ref(),
                                &items,
                                &payload.adjustments,
                            )
                            .await?;
                        }
                        _ => unreachable!("status restricted above"),
                    }

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        match new_status {
            OrderStatus::SupplierConfirmed => {
                self.event_sender
                    .send_logged(Event::OrderConfirmed {
                        order_id,
                        order_number: base,
                        adjusted: !payload.adjustments.is_empty(),
                    })
                    .await;
            }
            OrderStatus::Rejected => {
                self.event_sender
                    .send_logged(Event::OrderRejected {
                        order_id,
                        order_number: base,
                    })
                    .await;
            }
            _ => {}
        }

        Ok(order_id)
    }

    /// Overwrites matched items' quantity/price with the supplier-adjusted
    /// values. Unmatched adjustments are warnings, never errors: the order
    /// stays confirmed and the unreconciled line keeps its original values.
    async fn apply_adjustments<C: sea_orm::ConnectionTrait>(
        txn: &C,
        order_number: &str,
        items: &[order_item::Model],
        adjustments: &[ItemAdjustment],
    ) -> Result<(), ServiceError> {
        for adjustment in adjustments {
            match match_item(items, adjustment) {
                Some((item, tier)) => {
                    if tier != MatchTier::LocalId {
                        info!(
                            %order_number,
                            item_id = %item.id,
                            ?tier,
                            "Adjustment matched via fallback tier"
                        );
                    }

                    let new_quantity = adjustment.adjusted_quantity.unwrap_or(item.quantity);
                    let new_price = adjustment.adjusted_unit_price.unwrap_or(item.unit_price);
                    let new_total = new_price * Decimal::from(new_quantity);

                    // Unchanged values are skipped so duplicate deliveries
                    // are effective no-ops
                    if item.quantity == new_quantity
                        && item.unit_price == new_price
                        && item.total_price == new_total
                    {
                        continue;
                    }

                    let mut active: order_item::ActiveModel = item.clone().into();
                    active.quantity = Set(new_quantity);
                    active.unit_price = Set(new_price);
                    active.total_price = Set(new_total);
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                }
                None => {
                    warn!(
                        %order_number,
                        product_name = adjustment.product_name.as_deref().unwrap_or("-"),
                        "Unmatched supplier adjustment, keeping original line"
                    );
                }
            }
        }
        Ok(())
    }

    /// Attaches rejection reasons to the matched items' memos and rewrites
    /// the denormalized audit rows for the order. The rewrite keeps duplicate
    /// webhook deliveries from duplicating history lines.
    async fn record_rejections<C: sea_orm::ConnectionTrait>(
        txn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
        order_number: &str,
        supplier: Option<&supplier_contact::Model>,
        items: &[order_item::Model],
        adjustments: &[ItemAdjustment],
    ) -> Result<(), ServiceError> {
        rejected_order_line::Entity::delete_many()
            .filter(rejected_order_line::Column::OrderId.eq(order_id))
            .exec(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        for adjustment in adjustments {
            let matched = match_item(items, adjustment);

            match matched {
                Some((item, tier)) => {
                    if tier != MatchTier::LocalId {
                        info!(%order_number, item_id = %item.id, ?tier, "Rejection matched via fallback tier");
                    }

                    if let Some(reason) = &adjustment.reason {
                        if item.memo.as_deref() != Some(reason.as_str()) {
                            let mut active: order_item::ActiveModel = item.clone().into();
                            active.memo = Set(Some(reason.clone()));
                            active.updated_at = Set(Some(Utc::now()));
                            active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                        }
                    }

                    rejected_order_line::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        order_id: Set(order_id),
                        order_number: Set(order_number.to_string()),
                        supplier_name: Set(supplier.map(|s| s.name.clone())),
                        manager_name: Set(supplier.and_then(|s| s.manager_name.clone())),
                        product_name: Set(item.product_name.clone()),
                        quantity: Set(item.quantity),
                        reason: Set(adjustment.reason.clone()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                }
                None => {
                    // The rejection reason is human-auditable but never
                    // blocks the status transition
                    warn!(
                        %order_number,
                        product_name = adjustment.product_name.as_deref().unwrap_or("-"),
                        "Unmatched rejection line, audit row recorded without item link"
                    );

                    rejected_order_line::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        order_id: Set(order_id),
                        order_number: Set(order_number.to_string()),
                        supplier_name: Set(supplier.map(|s| s.name.clone())),
                        manager_name: Set(supplier.and_then(|s| s.manager_name.clone())),
                        product_name: Set(adjustment
                            .product_name
                            .clone()
                            .unwrap_or_else(|| "(unmatched)".to_string())),
                        quantity: Set(adjustment.adjusted_quantity.unwrap_or(0)),
                        reason: Set(adjustment.reason.clone()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                }
            }
        }
        Ok(())
    }

    async fn load_supplier(
        &self,
        tenant_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> Option<supplier_contact::Model> {
        let supplier_id = supplier_id?;
        supplier_contact::Entity::find_by_id(supplier_id)
            .filter(supplier_contact::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(name: &str, brand: Option<&str>, price: Decimal) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_id: None,
            product_name: name.to_string(),
            brand: brand.map(str::to_string),
            quantity: 10,
            unit_price: price,
            total_price: price * Decimal::from(10),
            memo: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn empty_adjustment() -> ItemAdjustment {
        ItemAdjustment {
            item_id: None,
            product_id: None,
            product_name: None,
            brand: None,
            unit_price: None,
            adjusted_quantity: None,
            adjusted_unit_price: None,
            reason: None,
        }
    }

    #[test]
    fn local_id_match_wins_over_attributes() {
        let items = vec![
            item("Saline 0.9%", Some("CJ"), dec!(20)),
            item("Saline 0.9%", Some("CJ"), dec!(20)),
        ];
        let adjustment = ItemAdjustment {
            item_id: Some(items[1].id),
            product_name: Some("Saline 0.9%".into()),
            brand: Some("CJ".into()),
            unit_price: Some(dec!(20)),
            ..empty_adjustment()
        };

        let (matched, tier) = match_item(&items, &adjustment).unwrap();
        assert_eq!(matched.id, items[1].id);
        assert_eq!(tier, MatchTier::LocalId);
    }

    #[test]
    fn attribute_match_requires_uniqueness() {
        // Two lines share product+brand+price: the tier must fall through
        let items = vec![
            item("Saline 0.9%", Some("CJ"), dec!(20)),
            item("Saline 0.9%", Some("CJ"), dec!(20)),
        ];
        let adjustment = ItemAdjustment {
            product_name: Some("Saline 0.9%".into()),
            brand: Some("CJ".into()),
            unit_price: Some(dec!(20)),
            ..empty_adjustment()
        };

        assert!(match_item(&items, &adjustment).is_none());
    }

    #[test]
    fn attribute_match_on_unique_line() {
        let items = vec![
            item("Saline 0.9%", Some("CJ"), dec!(20)),
            item("Gauze 10x10", None, dec!(3)),
        ];
        let adjustment = ItemAdjustment {
            product_name: Some("Gauze 10x10".into()),
            brand: None,
            unit_price: Some(dec!(3)),
            ..empty_adjustment()
        };

        let (matched, tier) = match_item(&items, &adjustment).unwrap();
        assert_eq!(matched.product_name, "Gauze 10x10");
        assert_eq!(tier, MatchTier::NameBrandPrice);
    }

    #[test]
    fn product_ref_is_the_last_resort() {
        let items = vec![
            item("Saline 0.9%", Some("CJ"), dec!(20)),
            item("Gauze 10x10", None, dec!(3)),
        ];
        let adjustment = ItemAdjustment {
            product_id: Some(items[0].product_id),
            product_name: Some("renamed upstream".into()),
            unit_price: Some(dec!(999)),
            ..empty_adjustment()
        };

        let (matched, tier) = match_item(&items, &adjustment).unwrap();
        assert_eq!(matched.id, items[0].id);
        assert_eq!(tier, MatchTier::ProductRef);
    }

    #[test]
    fn no_tier_matches_returns_none() {
        let items = vec![item("Saline 0.9%", Some("CJ"), dec!(20))];
        let adjustment = ItemAdjustment {
            product_name: Some("Unknown product".into()),
            unit_price: Some(dec!(1)),
            product_id: Some(Uuid::new_v4()),
            ..empty_adjustment()
        };

        assert!(match_item(&items, &adjustment).is_none());
    }

    #[test]
    fn confirmation_payload_uses_webhook_field_names() {
        let json = r#"{
            "orderNo": "20260807-AB12CD",
            "clinicTenantId": "7f1a0d7e-5f3f-4a2b-9f67-2f2d35c7a001",
            "status": "supplier_confirmed",
            "adjustments": [{"productName": "Saline 0.9%", "adjustedQuantity": 8}],
            "totalAmount": "160.00"
        }"#;

        let payload: SupplierConfirmationPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.order_no, "20260807-AB12CD");
        assert_eq!(payload.adjustments.len(), 1);
        assert_eq!(payload.adjustments[0].adjusted_quantity, Some(8));
        assert_eq!(payload.total_amount, Some(dec!(160.00)));
    }
}
