//! Confirmation reconciler integration tests: last-write-wins status
//! application, the fallback matching chain against real rows, idempotency
//! under duplicate delivery, and rejection audit rows.

mod common;

use common::{seed_product, seed_supplier, setup};
use medistock_api::entities::rejected_order_line;
use medistock_api::models::OrderStatus;
use medistock_api::services::orders::{CreateOrderItemRequest, CreateOrderRequest};
use medistock_api::services::reconciliation::{ItemAdjustment, SupplierConfirmationPayload};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

async fn pending_order(
    ctx: &common::TestCtx,
) -> medistock_api::services::orders::OrderResponse {
    let platform = seed_supplier(ctx, "Daewoong Link", true).await;
    let product = seed_product(ctx, "Saline 0.9% 1L", dec!(20.00), Some(platform.id)).await;

    let mut orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 10,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();
    orders.remove(0)
}

fn confirmation(
    order_no: &str,
    tenant: uuid::Uuid,
    adjustments: Vec<ItemAdjustment>,
) -> SupplierConfirmationPayload {
    SupplierConfirmationPayload {
        order_no: order_no.to_string(),
        clinic_tenant_id: tenant,
        status: "supplier_confirmed".to_string(),
        confirmed_at: Some(chrono::Utc::now()),
        adjustments,
        updated_items: vec![],
        total_amount: None,
    }
}

#[tokio::test]
async fn confirmation_applies_adjustment_and_is_idempotent() {
    let ctx = setup().await;
    let order = pending_order(&ctx).await;
    assert_eq!(order.status, OrderStatus::Pending);

    let adjustment = ItemAdjustment {
        item_id: Some(order.items[0].id),
        product_id: None,
        product_name: None,
        brand: None,
        unit_price: None,
        adjusted_quantity: Some(8),
        adjusted_unit_price: Some(dec!(19.00)),
        reason: None,
    };
    let payload = confirmation(&order.order_number, ctx.tenant, vec![adjustment]);

    ctx.services
        .reconciler
        .process_confirmation(payload.clone())
        .await
        .unwrap();

    let after_first = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(after_first.status, OrderStatus::SupplierConfirmed);
    assert!(after_first.confirmed_at.is_some());
    assert_eq!(after_first.items[0].quantity, 8);
    assert_eq!(after_first.items[0].unit_price, dec!(19.00));
    assert_eq!(after_first.items[0].total_price, dec!(152.00));

    // Duplicate delivery: identical payload leaves items unchanged
    ctx.services
        .reconciler
        .process_confirmation(payload)
        .await
        .unwrap();

    let after_second = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(after_second.items[0].quantity, 8);
    assert_eq!(after_second.items[0].unit_price, dec!(19.00));
    assert_eq!(after_second.items[0].total_price, dec!(152.00));
}

#[tokio::test]
async fn adjustment_matches_by_attributes_when_id_is_missing() {
    let ctx = setup().await;
    let order = pending_order(&ctx).await;

    let adjustment = ItemAdjustment {
        item_id: None,
        product_id: None,
        product_name: Some("Saline 0.9% 1L".to_string()),
        brand: None,
        unit_price: Some(dec!(20.00)),
        adjusted_quantity: Some(6),
        adjusted_unit_price: None,
        reason: None,
    };

    ctx.services
        .reconciler
        .process_confirmation(confirmation(
            &order.order_number,
            ctx.tenant,
            vec![adjustment],
        ))
        .await
        .unwrap();

    let updated = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(updated.items[0].quantity, 6);
    // Unadjusted price is preserved
    assert_eq!(updated.items[0].unit_price, dec!(20.00));
}

#[tokio::test]
async fn unmatched_adjustment_keeps_original_line_and_still_confirms() {
    let ctx = setup().await;
    let order = pending_order(&ctx).await;

    let adjustment = ItemAdjustment {
        item_id: None,
        product_id: Some(uuid::Uuid::new_v4()),
        product_name: Some("Completely different product".to_string()),
        brand: None,
        unit_price: Some(dec!(999.00)),
        adjusted_quantity: Some(1),
        adjusted_unit_price: None,
        reason: None,
    };

    ctx.services
        .reconciler
        .process_confirmation(confirmation(
            &order.order_number,
            ctx.tenant,
            vec![adjustment],
        ))
        .await
        .unwrap();

    let updated = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::SupplierConfirmed);
    assert_eq!(updated.items[0].quantity, 10);
}

#[tokio::test]
async fn rejection_attaches_reason_and_writes_audit_rows() {
    let ctx = setup().await;
    let order = pending_order(&ctx).await;

    let payload = SupplierConfirmationPayload {
        order_no: order.order_number.clone(),
        clinic_tenant_id: ctx.tenant,
        status: "rejected".to_string(),
        confirmed_at: None,
        adjustments: vec![ItemAdjustment {
            item_id: Some(order.items[0].id),
            product_id: None,
            product_name: None,
            brand: None,
            unit_price: None,
            adjusted_quantity: None,
            adjusted_unit_price: None,
            reason: Some("Out of production".to_string()),
        }],
        updated_items: vec![],
        total_amount: None,
    };

    ctx.services
        .reconciler
        .process_confirmation(payload.clone())
        .await
        .unwrap();

    let rejected = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);
    assert_eq!(
        rejected.items[0].memo.as_deref(),
        Some("Out of production")
    );

    let audit_rows = rejected_order_line::Entity::find()
        .filter(rejected_order_line::Column::OrderId.eq(order.id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(audit_rows.len(), 1);
    assert_eq!(audit_rows[0].supplier_name.as_deref(), Some("Daewoong Link"));
    assert_eq!(audit_rows[0].reason.as_deref(), Some("Out of production"));

    // Duplicate rejection delivery does not duplicate audit rows
    ctx.services
        .reconciler
        .process_confirmation(payload)
        .await
        .unwrap();
    let audit_rows = rejected_order_line::Entity::find()
        .filter(rejected_order_line::Column::OrderId.eq(order.id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(audit_rows.len(), 1);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let ctx = setup().await;

    let result = ctx
        .services
        .reconciler
        .process_confirmation(confirmation("19990101-NOSUCH", ctx.tenant, vec![]))
        .await;

    assert!(matches!(
        result,
        Err(medistock_api::errors::ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn suffixed_order_number_correlates_to_the_base_order() {
    let ctx = setup().await;
    let order = pending_order(&ctx).await;

    // The remote system may echo a derivative-suffixed number back
    let suffixed = format!("{}-C", order.order_number);
    ctx.services
        .reconciler
        .process_confirmation(confirmation(&suffixed, ctx.tenant, vec![]))
        .await
        .unwrap();

    let updated = ctx
        .services
        .orders
        .get_order(ctx.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::SupplierConfirmed);
}
