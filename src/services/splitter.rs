use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool, entities::supplier_contact, errors::ServiceError, models::OrderStatus,
};

/// One flat cart line entering the split. Supplier is already resolved
/// (item override falling back to the product's default); `None` lands in
/// the unknown-supplier bucket.
#[derive(Debug, Clone)]
pub struct SplitLine {
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub product_name: String,
    pub brand: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub supplier_id: Option<Uuid>,
}

impl SplitLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One per-supplier order candidate produced by the split.
#[derive(Debug, Clone)]
pub struct SupplierGroup {
    pub supplier: Option<supplier_contact::Model>,
    pub initial_status: OrderStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub subtotal: Decimal,
    pub items: Vec<SplitLine>,
}

/// Partitions lines into one group per distinct resolved supplier, preserving
/// first-seen order. Every input line lands in exactly one group and group
/// subtotals sum to the input total.
pub fn partition_by_supplier(lines: Vec<SplitLine>) -> Vec<(Option<Uuid>, Vec<SplitLine>)> {
    let mut groups: Vec<(Option<Uuid>, Vec<SplitLine>)> = Vec::new();

    for line in lines {
        match groups.iter_mut().find(|(key, _)| *key == line.supplier_id) {
            Some((_, group)) => group.push(line),
            None => groups.push((line.supplier_id, vec![line])),
        }
    }

    groups
}

/// Initial order status for a resolved supplier. Manually-entered suppliers
/// (no remote platform identity) are assumed to confirm instantly, out of
/// band; platform-linked suppliers await an asynchronous webhook.
pub fn initial_status(
    supplier: Option<&supplier_contact::Model>,
) -> (OrderStatus, Option<DateTime<Utc>>) {
    match supplier {
        Some(contact) if contact.is_platform_linked() => (OrderStatus::Pending, None),
        _ => (OrderStatus::SupplierConfirmed, Some(Utc::now())),
    }
}

/// Resolves partition groups against the supplier contacts of a tenant and
/// decides each group's initial status. This bifurcation is the entry point
/// into the two downstream notification paths.
#[derive(Clone)]
pub struct OrderSplitter {
    db: Arc<DbPool>,
}

impl OrderSplitter {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, lines), fields(tenant_id = %tenant_id, line_count = lines.len()))]
    pub async fn split(
        &self,
        tenant_id: Uuid,
        lines: Vec<SplitLine>,
    ) -> Result<Vec<SupplierGroup>, ServiceError> {
        let partitions = partition_by_supplier(lines);
        let mut groups = Vec::with_capacity(partitions.len());

        for (supplier_id, items) in partitions {
            let supplier = match supplier_id {
                Some(id) => {
                    let found = supplier_contact::Entity::find_by_id(id)
                        .filter(supplier_contact::Column::TenantId.eq(tenant_id))
                        .one(&*self.db)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    if found.is_none() {
                        warn!(supplier_id = %id, "Referenced supplier contact missing, treating group as unknown");
                    }
                    found
                }
                None => None,
            };

            let (status, confirmed_at) = initial_status(supplier.as_ref());
            let subtotal = items.iter().map(SplitLine::line_total).sum();

            groups.push(SupplierGroup {
                supplier,
                initial_status: status,
                confirmed_at,
                subtotal,
                items,
            });
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(supplier: Option<Uuid>, quantity: i32, unit_price: Decimal) -> SplitLine {
        SplitLine {
            product_id: Uuid::new_v4(),
            batch_id: None,
            product_name: "Lidocaine 2%".into(),
            brand: None,
            quantity,
            unit_price,
            supplier_id: supplier,
        }
    }

    fn contact(remote: bool) -> supplier_contact::Model {
        supplier_contact::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Daewoong".into(),
            manager_name: None,
            phone: Some("02-555-0101".into()),
            email: None,
            remote_manager_id: remote.then(Uuid::new_v4),
            remote_tenant_id: remote.then(Uuid::new_v4),
            base_url: remote.then(|| "https://supplier.example.com".into()),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn partition_covers_every_line_exactly_once() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = vec![
            line(Some(a), 1, dec!(10)),
            line(Some(b), 2, dec!(20)),
            line(Some(a), 3, dec!(30)),
            line(None, 4, dec!(40)),
        ];
        let input_total: Decimal = lines.iter().map(SplitLine::line_total).sum();

        let groups = partition_by_supplier(lines);

        assert_eq!(groups.len(), 3);
        let line_count: usize = groups.iter().map(|(_, g)| g.len()).sum();
        assert_eq!(line_count, 4);

        let group_total: Decimal = groups
            .iter()
            .flat_map(|(_, g)| g.iter())
            .map(SplitLine::line_total)
            .sum();
        assert_eq!(group_total, input_total);
    }

    #[test]
    fn partition_preserves_first_seen_group_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let groups = partition_by_supplier(vec![
            line(Some(b), 1, dec!(5)),
            line(Some(a), 1, dec!(5)),
            line(Some(b), 1, dec!(5)),
        ]);

        assert_eq!(groups[0].0, Some(b));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, Some(a));
    }

    #[test]
    fn unknown_bucket_collects_unresolved_lines() {
        let groups = partition_by_supplier(vec![line(None, 1, dec!(5)), line(None, 2, dec!(5))]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, None);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn manual_supplier_confirms_instantly() {
        let manual = contact(false);
        let (status, confirmed_at) = initial_status(Some(&manual));
        assert_eq!(status, OrderStatus::SupplierConfirmed);
        assert!(confirmed_at.is_some());
    }

    #[test]
    fn platform_supplier_awaits_webhook() {
        let linked = contact(true);
        let (status, confirmed_at) = initial_status(Some(&linked));
        assert_eq!(status, OrderStatus::Pending);
        assert!(confirmed_at.is_none());
    }

    #[test]
    fn unknown_supplier_is_treated_as_manual() {
        let (status, confirmed_at) = initial_status(None);
        assert_eq!(status, OrderStatus::SupplierConfirmed);
        assert!(confirmed_at.is_some());
    }
}
