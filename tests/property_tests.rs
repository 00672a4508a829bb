//! Property-based tests for the pure cores: supplier partitioning, order
//! number grammar, and receipt classification.

use std::collections::HashMap;

use medistock_api::entities::order_item;
use medistock_api::models::{OrderNumber, OrderVariant};
use medistock_api::services::inbound::classify_receipts;
use medistock_api::services::splitter::{partition_by_supplier, SplitLine};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn supplier_pool() -> Vec<Option<Uuid>> {
    vec![
        None,
        Some(Uuid::from_u128(1)),
        Some(Uuid::from_u128(2)),
        Some(Uuid::from_u128(3)),
    ]
}

fn arb_line() -> impl Strategy<Value = SplitLine> {
    (0usize..4, 1i32..500, 1i64..10_000).prop_map(|(supplier_idx, quantity, cents)| SplitLine {
        product_id: Uuid::new_v4(),
        batch_id: None,
        product_name: "item".to_string(),
        brand: None,
        quantity,
        unit_price: Decimal::new(cents, 2),
        supplier_id: supplier_pool()[supplier_idx],
    })
}

proptest! {
    #[test]
    fn partition_is_exhaustive_and_conserves_totals(lines in prop::collection::vec(arb_line(), 0..40)) {
        let input_count = lines.len();
        let input_total: Decimal = lines.iter().map(SplitLine::line_total).sum();

        let groups = partition_by_supplier(lines);

        // Every line appears in exactly one group
        let grouped_count: usize = groups.iter().map(|(_, g)| g.len()).sum();
        prop_assert_eq!(grouped_count, input_count);

        // No two groups share a supplier key
        for (i, (key_a, _)) in groups.iter().enumerate() {
            for (key_b, _) in groups.iter().skip(i + 1) {
                prop_assert_ne!(key_a, key_b);
            }
        }

        // Every line sits in the group matching its own supplier
        for (key, group) in &groups {
            for line in group {
                prop_assert_eq!(&line.supplier_id, key);
            }
        }

        let grouped_total: Decimal = groups
            .iter()
            .flat_map(|(_, g)| g.iter())
            .map(SplitLine::line_total)
            .sum();
        prop_assert_eq!(grouped_total, input_total);
    }

    #[test]
    fn order_number_round_trips(date in "[0-9]{8}", suffix in "[A-Z0-9]{6}", variant_idx in 0usize..4) {
        let variant = [
            OrderVariant::None,
            OrderVariant::Completed,
            OrderVariant::Pending,
            OrderVariant::Return,
        ][variant_idx];

        let original = OrderNumber::new(format!("{}-{}", date, suffix), variant);
        let rendered = original.to_string();
        let parsed = OrderNumber::parse(&rendered);

        prop_assert_eq!(parsed, original);
    }

    #[test]
    fn receipt_classification_never_loses_quantity(
        ordered in prop::collection::vec(1i32..1000, 1..10),
        received_fracs in prop::collection::vec(0i32..1200, 1..10),
    ) {
        let items: Vec<order_item::Model> = ordered
            .iter()
            .map(|qty| order_item::Model {
                id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                batch_id: None,
                product_name: "item".to_string(),
                brand: None,
                quantity: *qty,
                unit_price: Decimal::ONE,
                total_price: Decimal::from(*qty),
                memo: None,
                created_at: chrono::Utc::now(),
                updated_at: None,
            })
            .collect();

        let received: HashMap<Uuid, i32> = items
            .iter()
            .zip(received_fracs.iter())
            .map(|(item, frac)| (item.id, *frac))
            .collect();

        let splits = classify_receipts(&items, &received);
        prop_assert_eq!(splits.len(), items.len());

        for split in &splits {
            prop_assert!(split.remainder >= 0);
            let received_qty = received.get(&split.item.id).copied().unwrap_or(0);
            prop_assert_eq!(split.received, received_qty);
            // The received and remaining portions cover the whole ordered
            // quantity; over-receipt only ever shrinks the remainder to zero
            prop_assert_eq!(
                split.received + split.remainder,
                split.item.quantity.max(received_qty)
            );
        }
    }
}
