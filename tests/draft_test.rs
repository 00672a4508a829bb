//! Order draft store integration tests: merge-by-set semantics, rolling
//! expiry, and total recomputation.

mod common;

use std::sync::Arc;

use common::{seed_product, setup};
use medistock_api::services::drafts::{AddDraftItemRequest, DraftService};
use rust_decimal_macros::dec;

const SESSION: &str = "session-abc123";

fn add(product_id: uuid::Uuid, quantity: i32) -> AddDraftItemRequest {
    AddDraftItemRequest {
        product_id,
        batch_id: None,
        quantity,
        unit_price: None,
    }
}

#[tokio::test]
async fn adding_the_same_product_twice_sets_the_quantity() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Saline 0.9% 1L", dec!(20.00), None).await;

    ctx.services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product.id, 3))
        .await
        .unwrap();
    let draft = ctx
        .services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product.id, 7))
        .await
        .unwrap();

    // One line at quantity 7, not 10: set, not summed
    assert_eq!(draft.items.len(), 1);
    assert_eq!(draft.items[0].quantity, 7);
    assert_eq!(draft.items[0].total_price, dec!(140.00));
    assert_eq!(draft.total_amount, dec!(140.00));
}

#[tokio::test]
async fn distinct_batches_of_one_product_stay_separate_lines() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Lidocaine 2%", dec!(8.00), None).await;
    let batch_id = uuid::Uuid::new_v4();

    ctx.services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product.id, 2))
        .await
        .unwrap();
    let draft = ctx
        .services
        .drafts
        .add_item(
            ctx.tenant,
            SESSION,
            AddDraftItemRequest {
                product_id: product.id,
                batch_id: Some(batch_id),
                quantity: 4,
                unit_price: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(draft.items.len(), 2);
    assert_eq!(draft.total_amount, dec!(48.00));
}

#[tokio::test]
async fn update_item_with_zero_removes_it() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Gauze 10x10", dec!(3.00), None).await;

    let draft = ctx
        .services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product.id, 5))
        .await
        .unwrap();
    let item_id = draft.items[0].id;

    let draft = ctx
        .services
        .drafts
        .update_item(ctx.tenant, SESSION, item_id, 0)
        .await
        .unwrap();

    assert!(draft.items.is_empty());
    assert_eq!(draft.total_amount, dec!(0));
}

#[tokio::test]
async fn replace_all_collapses_duplicate_pairs() {
    let ctx = setup().await;
    let product_a = seed_product(&ctx, "Syringe 5ml", dec!(1.50), None).await;
    let product_b = seed_product(&ctx, "Alcohol swab", dec!(0.10), None).await;

    ctx.services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product_a.id, 1))
        .await
        .unwrap();

    let draft = ctx
        .services
        .drafts
        .replace_all(
            ctx.tenant,
            SESSION,
            vec![add(product_a.id, 2), add(product_b.id, 10), add(product_a.id, 6)],
        )
        .await
        .unwrap();

    // Later duplicate wins, earlier line dropped
    assert_eq!(draft.items.len(), 2);
    let line_a = draft
        .items
        .iter()
        .find(|i| i.product_id == product_a.id)
        .unwrap();
    assert_eq!(line_a.quantity, 6);
}

#[tokio::test]
async fn expired_draft_is_transparently_replaced() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Bandage roll", dec!(2.00), None).await;

    // A service with a negative TTL writes drafts that are already expired
    let expiring = DraftService::new(Arc::clone(&ctx.db), chrono::Duration::hours(-1));
    let stale = expiring
        .add_item(ctx.tenant, SESSION, add(product.id, 3))
        .await
        .unwrap();
    assert_eq!(stale.items.len(), 1);

    let fresh = ctx
        .services
        .drafts
        .get_or_create(ctx.tenant, SESSION)
        .await
        .unwrap();

    assert!(fresh.items.is_empty());
    assert_ne!(fresh.id, stale.id);
    assert_eq!(fresh.total_amount, dec!(0));
}

#[tokio::test]
async fn delete_clears_the_session_draft() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "Cotton balls", dec!(1.00), None).await;

    ctx.services
        .drafts
        .add_item(ctx.tenant, SESSION, add(product.id, 2))
        .await
        .unwrap();
    ctx.services.drafts.delete(ctx.tenant, SESSION).await.unwrap();

    let draft = ctx
        .services
        .drafts
        .get_or_create(ctx.tenant, SESSION)
        .await
        .unwrap();
    assert!(draft.items.is_empty());
}
