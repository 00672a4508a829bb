//! Order lifecycle integration tests: supplier splitting, the status
//! bifurcation between manual and platform-linked suppliers, and the
//! cancel/complete/delete transitions.

mod common;

use common::{seed_product, seed_supplier, setup};
use medistock_api::errors::ServiceError;
use medistock_api::models::OrderStatus;
use medistock_api::services::drafts::AddDraftItemRequest;
use medistock_api::services::orders::{CreateOrderItemRequest, CreateOrderRequest};
use rust_decimal_macros::dec;

const SESSION: &str = "session-orders";

#[tokio::test]
async fn draft_with_two_suppliers_splits_into_two_orders() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Hanmi Pharm", false).await;
    let platform = seed_supplier(&ctx, "Daewoong Link", true).await;
    let product_a = seed_product(&ctx, "Saline 0.9% 1L", dec!(20.00), Some(manual.id)).await;
    let product_b = seed_product(&ctx, "Lidocaine 2%", dec!(8.00), Some(platform.id)).await;

    for (product, qty) in [(product_a.id, 2), (product_b.id, 5)] {
        ctx.services
            .drafts
            .add_item(
                ctx.tenant,
                SESSION,
                AddDraftItemRequest {
                    product_id: product,
                    batch_id: None,
                    quantity: qty,
                    unit_price: None,
                },
            )
            .await
            .unwrap();
    }

    let orders = ctx
        .services
        .orders
        .create_from_draft(ctx.tenant, SESSION, Some("dr.kim".to_string()))
        .await
        .unwrap();

    assert_eq!(orders.len(), 2);

    let manual_order = orders
        .iter()
        .find(|o| o.supplier_id == Some(manual.id))
        .expect("manual supplier order");
    assert_eq!(manual_order.status, OrderStatus::SupplierConfirmed);
    assert!(manual_order.confirmed_at.is_some());
    assert_eq!(manual_order.total_amount, dec!(40.00));

    let platform_order = orders
        .iter()
        .find(|o| o.supplier_id == Some(platform.id))
        .expect("platform supplier order");
    assert_eq!(platform_order.status, OrderStatus::Pending);
    assert!(platform_order.confirmed_at.is_none());
    assert_eq!(platform_order.total_amount, dec!(40.00));

    // Totals are conserved across the partition
    let sum: rust_decimal::Decimal = orders.iter().map(|o| o.total_amount).sum();
    assert_eq!(sum, dec!(80.00));

    // The draft is consumed by the conversion
    let draft = ctx
        .services
        .drafts
        .get_or_create(ctx.tenant, SESSION)
        .await
        .unwrap();
    assert!(draft.items.is_empty());
}

#[tokio::test]
async fn direct_create_resolves_supplier_from_product() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Green Cross", false).await;
    let product = seed_product(&ctx, "Gauze 10x10", dec!(3.00), Some(manual.id)).await;

    let orders = ctx
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

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].supplier_id, Some(manual.id));
    assert_eq!(orders[0].total_amount, dec!(30.00));
    assert_eq!(orders[0].items.len(), 1);
    assert!(!orders[0].order_number.is_empty());
}

#[tokio::test]
async fn unresolved_items_land_in_the_unknown_bucket() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Misc item", dec!(5.00), None).await;

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 1,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].supplier_id, None);
    // Unknown suppliers are treated as manual: confirmed instantly
    assert_eq!(orders[0].status, OrderStatus::SupplierConfirmed);
}

#[tokio::test]
async fn cancelling_a_pending_order_succeeds() {
    let ctx = setup().await;
    let platform = seed_supplier(&ctx, "Linked Supply", true).await;
    let product = seed_product(&ctx, "Syringe 5ml", dec!(1.50), Some(platform.id)).await;

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 4,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();

    let cancelled = ctx
        .services
        .orders
        .cancel_order(ctx.tenant, orders[0].id, Some("wrong item".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_completed_order_is_a_conflict() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Hanmi Pharm", false).await;
    let product = seed_product(&ctx, "Saline 0.9% 1L", dec!(20.00), Some(manual.id)).await;

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 1,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();
    let order_id = orders[0].id;

    // Manual orders are supplier_confirmed, so completion is legal
    let completed = ctx
        .services
        .orders
        .complete_order(ctx.tenant, order_id, None)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);

    let result = ctx
        .services
        .orders
        .cancel_order(ctx.tenant, order_id, None)
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    // Status is unchanged by the rejected transition
    let order = ctx
        .services
        .orders
        .get_order(ctx.tenant, order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    // Cancelling twice is likewise rejected
    let cancelled_again = ctx
        .services
        .orders
        .cancel_order(ctx.tenant, order_id, None)
        .await;
    assert!(matches!(cancelled_again, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn delete_requires_a_terminal_status() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Hanmi Pharm", false).await;
    let product = seed_product(&ctx, "Gauze 10x10", dec!(3.00), Some(manual.id)).await;

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 1,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();
    let order_id = orders[0].id;

    // Still active: delete must be refused
    let refused = ctx.services.orders.delete_order(ctx.tenant, order_id).await;
    assert!(matches!(refused, Err(ServiceError::Conflict(_))));

    ctx.services
        .orders
        .cancel_order(ctx.tenant, order_id, None)
        .await
        .unwrap();
    ctx.services
        .orders
        .delete_order(ctx.tenant, order_id)
        .await
        .unwrap();

    let gone = ctx.services.orders.get_order(ctx.tenant, order_id).await;
    assert!(matches!(gone, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn pending_inbound_view_reflects_mutations_through_invalidation() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Hanmi Pharm", false).await;
    let product = seed_product(&ctx, "Saline 0.9% 1L", dec!(20.00), Some(manual.id)).await;

    // Cold view: nothing pending
    let view = ctx
        .services
        .orders
        .pending_inbound_view(ctx.tenant)
        .await
        .unwrap();
    assert_eq!(view, serde_json::json!({}));

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 2,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();

    // Order creation invalidated the view synchronously, so the reload sees
    // the new order well inside the cache TTL
    let view = ctx
        .services
        .orders
        .pending_inbound_view(ctx.tenant)
        .await
        .unwrap();
    let group = view
        .get(manual.id.to_string())
        .and_then(|v| v.as_array())
        .expect("supplier group present");
    assert_eq!(group.len(), 1);
    assert_eq!(
        group[0]["order_number"].as_str().unwrap(),
        orders[0].order_number
    );

    ctx.services
        .orders
        .cancel_order(ctx.tenant, orders[0].id, None)
        .await
        .unwrap();

    let view = ctx
        .services
        .orders
        .pending_inbound_view(ctx.tenant)
        .await
        .unwrap();
    assert_eq!(view, serde_json::json!({}));
}

#[tokio::test]
async fn orders_are_scoped_to_their_tenant() {
    let ctx = setup().await;
    let manual = seed_supplier(&ctx, "Hanmi Pharm", false).await;
    let product = seed_product(&ctx, "Saline 0.9% 1L", dec!(20.00), Some(manual.id)).await;

    let orders = ctx
        .services
        .orders
        .create_direct(
            ctx.tenant,
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    batch_id: None,
                    quantity: 1,
                    unit_price: None,
                }],
                created_by: None,
            },
        )
        .await
        .unwrap();

    let other_tenant = uuid::Uuid::new_v4();
    let result = ctx
        .services
        .orders
        .get_order(other_tenant, orders[0].id)
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}
