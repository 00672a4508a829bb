use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{order_draft, order_draft_item, product},
    errors::ServiceError,
};

/// Request/Response types for the draft service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddDraftItemRequest {
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Overrides the catalog unit price when present.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DraftItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DraftResponse {
    pub id: Uuid,
    pub session_id: String,
    pub items: Vec<DraftItemResponse>,
    pub total_amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Session-scoped scratch cart with a rolling expiry. Item identity within a
/// draft is (product, batch); repeated adds for the same pair set the
/// quantity rather than summing it, so client retries cannot double-count.
#[derive(Clone)]
pub struct DraftService {
    db: Arc<DbPool>,
    ttl: Duration,
}

impl DraftService {
    pub fn new(db: Arc<DbPool>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Fetches the draft for (tenant, session), transparently replacing an
    /// absent or expired one with a fresh empty draft.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, session_id = %session_id))]
    pub async fn get_or_create(
        &self,
        tenant_id: Uuid,
        session_id: &str,
    ) -> Result<DraftResponse, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let existing = order_draft::Entity::find()
            .filter(order_draft::Column::TenantId.eq(tenant_id))
            .filter(order_draft::Column::SessionId.eq(session_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match existing {
            Some(draft) if !draft.is_expired(now) => {
                let items = self.load_items(db, draft.id).await?;
                Ok(Self::to_response(draft, items))
            }
            Some(expired) => {
                info!(draft_id = %expired.id, "Replacing expired draft");
                let ttl = self.ttl;
                let session = session_id.to_string();
                let draft = db
                    .transaction::<_, order_draft::Model, ServiceError>(move |txn| {
                        Box::pin(async move {
                            order_draft_item::Entity::delete_many()
                                .filter(order_draft_item::Column::DraftId.eq(expired.id))
                                .exec(txn)
                                .await
                                .map_err(ServiceError::DatabaseError)?;
                            order_draft::Entity::delete_by_id(expired.id)
                                .exec(txn)
                                .await
                                .map_err(ServiceError::DatabaseError)?;
                            Self::insert_empty(txn, tenant_id, &session, ttl).await
                        })
                    })
                    .await
                    .map_err(unwrap_txn_err)?;
                Ok(Self::to_response(draft, Vec::new()))
            }
            None => {
                let draft = Self::insert_empty(db, tenant_id, session_id, self.ttl).await?;
                Ok(Self::to_response(draft, Vec::new()))
            }
        }
    }

    /// Adds an item, merging with an existing (product, batch) line by
    /// setting its quantity. Refreshes the rolling expiry.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id, product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        tenant_id: Uuid,
        session_id: &str,
        request: AddDraftItemRequest,
    ) -> Result<DraftResponse, ServiceError> {
        request.validate()?;

        let draft = self.get_or_create(tenant_id, session_id).await?;
        let draft_id = draft.id;
        let ttl = self.ttl;

        let product = product::Entity::find_by_id(request.product_id)
            .filter(product::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;

        let unit_price = request.unit_price.unwrap_or(product.unit_price);
        let supplier_id = product.supplier_id;

        let draft = self
            .db
            .transaction::<_, order_draft::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = order_draft_item::Entity::find()
                        .filter(order_draft_item::Column::DraftId.eq(draft_id))
                        .filter(order_draft_item::Column::ProductId.eq(request.product_id))
                        .filter(match request.batch_id {
                            Some(batch_id) => order_draft_item::Column::BatchId.eq(batch_id),
                            None => order_draft_item::Column::BatchId.is_null(),
                        })
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    match existing {
                        Some(item) => {
                            // Quantity is set, not summed
                            let mut active: order_draft_item::ActiveModel = item.into();
                            active.quantity = Set(request.quantity);
                            active.unit_price = Set(unit_price);
                            active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                        }
                        None => {
                            order_draft_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                draft_id: Set(draft_id),
                                product_id: Set(request.product_id),
                                batch_id: Set(request.batch_id),
                                quantity: Set(request.quantity),
                                unit_price: Set(unit_price),
                                total_price: Set(Decimal::ZERO),
                                supplier_id: Set(supplier_id),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;
                        }
                    }

                    Self::refresh_totals(txn, draft_id, ttl).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let items = self.load_items(&*self.db, draft.id).await?;
        Ok(Self::to_response(draft, items))
    }

    /// Sets an item's quantity; zero removes the item.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<DraftResponse, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must not be negative, got {}",
                quantity
            )));
        }

        let draft = self.get_or_create(tenant_id, session_id).await?;
        let draft_id = draft.id;
        let ttl = self.ttl;

        let draft = self
            .db
            .transaction::<_, order_draft::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let item = order_draft_item::Entity::find_by_id(item_id)
                        .filter(order_draft_item::Column::DraftId.eq(draft_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Draft item {} not found", item_id))
                        })?;

                    if quantity == 0 {
                        order_draft_item::Entity::delete_by_id(item.id)
                            .exec(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;
                    } else {
                        let mut active: order_draft_item::ActiveModel = item.into();
                        active.quantity = Set(quantity);
                        active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                    }

                    Self::refresh_totals(txn, draft_id, ttl).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let items = self.load_items(&*self.db, draft.id).await?;
        Ok(Self::to_response(draft, items))
    }

    /// Replaces the draft's entire item list. Duplicate (product, batch)
    /// pairs in the input collapse to the last occurrence.
    #[instrument(skip(self, items), fields(tenant_id = %tenant_id, item_count = items.len()))]
    pub async fn replace_all(
        &self,
        tenant_id: Uuid,
        session_id: &str,
        items: Vec<AddDraftItemRequest>,
    ) -> Result<DraftResponse, ServiceError> {
        for item in &items {
            item.validate()?;
        }

        let draft = self.get_or_create(tenant_id, session_id).await?;
        let draft_id = draft.id;
        let ttl = self.ttl;

        // Resolve prices/suppliers from the catalog before entering the txn
        let mut resolved = Vec::with_capacity(items.len());
        for request in items {
            let product = product::Entity::find_by_id(request.product_id)
                .filter(product::Column::TenantId.eq(tenant_id))
                .one(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", request.product_id))
                })?;
            let unit_price = request.unit_price.unwrap_or(product.unit_price);
            resolved.push((request, unit_price, product.supplier_id));
        }

        let draft = self
            .db
            .transaction::<_, order_draft::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    order_draft_item::Entity::delete_many()
                        .filter(order_draft_item::Column::DraftId.eq(draft_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    let mut seen: Vec<(Uuid, Option<Uuid>)> = Vec::new();
                    for (request, unit_price, supplier_id) in resolved.into_iter().rev() {
                        let key = (request.product_id, request.batch_id);
                        if seen.contains(&key) {
                            continue;
                        }
                        seen.push(key);

                        order_draft_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            draft_id: Set(draft_id),
                            product_id: Set(request.product_id),
                            batch_id: Set(request.batch_id),
                            quantity: Set(request.quantity),
                            unit_price: Set(unit_price),
                            total_price: Set(Decimal::ZERO),
                            supplier_id: Set(supplier_id),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    }

                    Self::refresh_totals(txn, draft_id, ttl).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let items = self.load_items(&*self.db, draft.id).await?;
        Ok(Self::to_response(draft, items))
    }

    /// Drops the draft and its items. Called on explicit clear and after the
    /// draft is converted into orders.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, session_id = %session_id))]
    pub async fn delete(&self, tenant_id: Uuid, session_id: &str) -> Result<(), ServiceError> {
        let existing = order_draft::Entity::find()
            .filter(order_draft::Column::TenantId.eq(tenant_id))
            .filter(order_draft::Column::SessionId.eq(session_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if let Some(draft) = existing {
            self.db
                .transaction::<_, (), ServiceError>(move |txn| {
                    Box::pin(async move {
                        order_draft_item::Entity::delete_many()
                            .filter(order_draft_item::Column::DraftId.eq(draft.id))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;
                        order_draft::Entity::delete_by_id(draft.id)
                            .exec(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;
                        Ok(())
                    })
                })
                .await
                .map_err(unwrap_txn_err)?;
        }

        Ok(())
    }

    async fn insert_empty<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        session_id: &str,
        ttl: Duration,
    ) -> Result<order_draft::Model, ServiceError> {
        order_draft::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            session_id: Set(session_id.to_string()),
            total_amount: Set(Decimal::ZERO),
            expires_at: Set(Utc::now() + ttl),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)
    }

    /// Recomputes every item's total from its unit price, the draft-level
    /// aggregate, and pushes the rolling expiry forward.
    async fn refresh_totals<C: ConnectionTrait>(
        conn: &C,
        draft_id: Uuid,
        ttl: Duration,
    ) -> Result<order_draft::Model, ServiceError> {
        let items = order_draft_item::Entity::find()
            .filter(order_draft_item::Column::DraftId.eq(draft_id))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut total = Decimal::ZERO;
        for item in items {
            let line_total = item.unit_price * Decimal::from(item.quantity);
            total += line_total;
            if item.total_price != line_total {
                let mut active: order_draft_item::ActiveModel = item.into();
                active.total_price = Set(line_total);
                active.update(conn).await.map_err(ServiceError::DatabaseError)?;
            }
        }

        let draft = order_draft::Entity::find_by_id(draft_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Draft {} not found", draft_id)))?;

        let mut active: order_draft::ActiveModel = draft.into();
        active.total_amount = Set(total);
        active.expires_at = Set(Utc::now() + ttl);
        active.update(conn).await.map_err(ServiceError::DatabaseError)
    }

    async fn load_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        draft_id: Uuid,
    ) -> Result<Vec<order_draft_item::Model>, ServiceError> {
        order_draft_item::Entity::find()
            .filter(order_draft_item::Column::DraftId.eq(draft_id))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    fn to_response(
        draft: order_draft::Model,
        items: Vec<order_draft_item::Model>,
    ) -> DraftResponse {
        DraftResponse {
            id: draft.id,
            session_id: draft.session_id,
            total_amount: draft.total_amount,
            expires_at: draft.expires_at,
            items: items
                .into_iter()
                .map(|item| DraftItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    batch_id: item.batch_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    supplier_id: item.supplier_id,
                })
                .collect(),
        }
    }
}

pub(crate) fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
