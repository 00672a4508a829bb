use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::NullOrdering;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{batch, product},
    errors::ServiceError,
};

/// The stock ledger: owns per-batch quantity and the derived per-product
/// aggregate. All mutations run on the caller's transaction so that a batch
/// decrement and the aggregate recompute commit or roll back together.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
}

impl StockService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Validates an outbound request against a batch. Rejects non-positive
    /// quantities, quantities exceeding the batch, and expired batches; a
    /// rejected validation leaves the batch untouched.
    pub fn validate_outbound(batch: &batch::Model, quantity: i32) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Outbound quantity must be positive, got {}",
                quantity
            )));
        }

        if let Some(expiry) = batch.expiry_date {
            if expiry < Utc::now().date_naive() {
                return Err(ServiceError::ValidationError(format!(
                    "Batch {} (lot {}) expired on {}",
                    batch.id, batch.lot_number, expiry
                )));
            }
        }

        if batch.quantity < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "batch {} has {}, requested {}",
                batch.id, batch.quantity, quantity
            )));
        }

        Ok(())
    }

    /// Loads a batch scoped to a tenant.
    pub async fn find_batch<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        batch_id: Uuid,
    ) -> Result<batch::Model, ServiceError> {
        batch::Entity::find_by_id(batch_id)
            .filter(batch::Column::TenantId.eq(tenant_id))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))
    }

    /// Decrements a batch and re-derives the owning product's aggregate stock
    /// inside the caller's transaction. The aggregate is always recomputed as
    /// the sum of the product's batch quantities, never incremented, so it
    /// cannot drift. Returns the new aggregate.
    #[instrument(skip(conn), fields(batch_id = %batch_id, quantity = quantity))]
    pub async fn deduct<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        batch_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<i32, ServiceError> {
        let batch = Self::find_batch(conn, tenant_id, batch_id).await?;
        Self::validate_outbound(&batch, quantity)?;

        let remaining = batch.quantity - quantity;
        let mut active: batch::ActiveModel = batch.into();
        active.quantity = Set(remaining);
        active.update(conn).await.map_err(ServiceError::DatabaseError)?;

        let aggregate = Self::recompute_aggregate(conn, tenant_id, product_id).await?;

        info!(remaining, aggregate, "Batch decremented");
        Ok(aggregate)
    }

    /// Re-derives a product's cached aggregate stock from its batches and
    /// persists it. Must run on the same transaction as the batch mutation.
    pub async fn recompute_aggregate<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<i32, ServiceError> {
        let batches = batch::Entity::find()
            .filter(batch::Column::TenantId.eq(tenant_id))
            .filter(batch::Column::ProductId.eq(product_id))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let total: i32 = batches.iter().map(|b| b.quantity).sum();

        let product = product::Entity::find_by_id(product_id)
            .filter(product::Column::TenantId.eq(tenant_id))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", product_id))
            })?;

        if product.stock != total {
            let mut active: product::ActiveModel = product.into();
            active.stock = Set(total);
            active
                .update(conn)
                .await
                .map_err(ServiceError::DatabaseError)?;
        }

        Ok(total)
    }

    /// Batches of a product in FEFO picking order: earliest expiry first,
    /// batches without an expiry last. Zero-quantity batches are skipped.
    #[instrument(skip(self))]
    pub async fn fefo_batches(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<batch::Model>, ServiceError> {
        let batches = batch::Entity::find()
            .filter(batch::Column::TenantId.eq(tenant_id))
            .filter(batch::Column::ProductId.eq(product_id))
            .filter(batch::Column::Quantity.gt(0))
            .order_by_with_nulls(batch::Column::ExpiryDate, Order::Asc, NullOrdering::Last)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if batches.is_empty() {
            warn!(%product_id, "No stocked batches for product");
        }

        Ok(batches)
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn batch_with(quantity: i32, expiry: Option<NaiveDate>) -> batch::Model {
        batch::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            lot_number: "LOT-001".into(),
            quantity,
            expiry_date: expiry,
            storage_location: Some("A-3".into()),
            unit_cost: dec!(4.20),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let batch = batch_with(10, None);
        assert!(matches!(
            StockService::validate_outbound(&batch, 0),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            StockService::validate_outbound(&batch, -3),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_outbound_exceeding_batch() {
        let batch = batch_with(5, None);
        assert!(matches!(
            StockService::validate_outbound(&batch, 6),
            Err(ServiceError::InsufficientStock(_))
        ));
        // The full remaining quantity is allowed
        assert!(StockService::validate_outbound(&batch, 5).is_ok());
    }

    #[test]
    fn rejects_expired_batch() {
        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        let batch = batch_with(10, Some(yesterday));
        assert!(matches!(
            StockService::validate_outbound(&batch, 1),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn accepts_batch_expiring_today() {
        let today = Utc::now().date_naive();
        let batch = batch_with(10, Some(today));
        assert!(StockService::validate_outbound(&batch, 1).is_ok());
    }
}
