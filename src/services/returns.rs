use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{views, ViewCache},
    db::DbPool,
    entities::{order, product, return_order},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderNumber, OrderVariant, ReturnStatus},
    services::drafts::unwrap_txn_err,
    services::stock::StockService,
};

/// Request/Response types for the return service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReturnRequest {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Order the goods originally arrived on; the return number derives from
    /// it when present.
    pub order_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReturnResponse {
    pub id: Uuid,
    pub return_no: String,
    pub order_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub status: ReturnStatus,
    pub reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReturnListResponse {
    pub returns: Vec<ReturnResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Inbound return-completion callback. Idempotent no-op when the return is
/// already completed or unknown, to tolerate duplicate delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnCompletionPayload {
    pub return_no: String,
    pub item_id: Option<Uuid>,
    pub status: String,
}

/// Sends goods back to the supplier: stock leaves the warehouse in the same
/// transaction that records the return; completion arrives via webhook.
#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    cache: ViewCache,
}

impl ReturnService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, cache: ViewCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Creates a return, deducting the returned quantity from the batch and
    /// re-deriving the product aggregate in one transaction.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id, batch_id = %request.batch_id))]
    pub async fn create_return(
        &self,
        tenant_id: Uuid,
        request: CreateReturnRequest,
    ) -> Result<ReturnResponse, ServiceError> {
        request.validate()?;

        let product = product::Entity::find_by_id(request.product_id)
            .filter(product::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;

        let (return_no, supplier_id, order_id) = match request.order_id {
            Some(order_id) => {
                let source_order = order::Entity::find_by_id(order_id)
                    .filter(order::Column::TenantId.eq(tenant_id))
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order {} not found", order_id))
                    })?;
                let number = OrderNumber::parse(&source_order.order_number)
                    .with_variant(OrderVariant::Return);
                (number.to_string(), source_order.supplier_id, Some(order_id))
            }
            None => (
                OrderNumber::generate()
                    .with_variant(OrderVariant::Return)
                    .to_string(),
                product.supplier_id,
                None,
            ),
        };

        let unit_price = product.unit_price;
        let created = self
            .db
            .transaction::<_, return_order::Model, ServiceError>(move |txn| {
                let return_no = return_no.clone();
                Box::pin(async move {
                    StockService::deduct(
                        txn,
                        tenant_id,
                        request.batch_id,
                        request.product_id,
                        request.quantity,
                    )
                    .await?;

                    return_order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(tenant_id),
                        return_no: Set(return_no),
                        order_id: Set(order_id),
                        supplier_id: Set(supplier_id),
                        product_id: Set(request.product_id),
                        batch_id: Set(Some(request.batch_id)),
                        quantity: Set(request.quantity),
                        unit_price: Set(unit_price),
                        status: Set(ReturnStatus::Pending),
                        reason: Set(request.reason),
                        completed_at: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::ORDER_CANDIDATES, views::OUTBOUND_HISTORY]);

        info!(return_no = %created.return_no, "Return created");
        self.event_sender
            .send_logged(Event::ReturnCreated {
                return_id: created.id,
                return_no: created.return_no.clone(),
            })
            .await;

        Ok(Self::to_response(created))
    }

    /// Applies a return-completion callback. A completed or unknown return is
    /// a logged no-op: the remote side may deliver this more than once.
    #[instrument(skip(self, payload), fields(return_no = %payload.return_no))]
    pub async fn complete_return(
        &self,
        payload: ReturnCompletionPayload,
    ) -> Result<Option<ReturnResponse>, ServiceError> {
        let existing = return_order::Entity::find()
            .filter(return_order::Column::ReturnNo.eq(payload.return_no.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let Some(ret) = existing else {
            warn!(return_no = %payload.return_no, "Return completion for unknown return, ignoring");
            return Ok(None);
        };

        if ret.status == ReturnStatus::Completed {
            info!(return_no = %ret.return_no, "Return already completed, duplicate callback ignored");
            return Ok(Some(Self::to_response(ret)));
        }

        let tenant_id = ret.tenant_id;
        let return_id = ret.id;
        let return_no = ret.return_no.clone();

        let mut active: return_order::ActiveModel = ret.into();
        active.status = Set(ReturnStatus::Completed);
        active.completed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.cache.invalidate_tenant(tenant_id);

        info!(%return_no, "Return completed");
        self.event_sender
            .send_logged(Event::ReturnCompleted {
                return_id,
                return_no,
            })
            .await;

        Ok(Some(Self::to_response(updated)))
    }

    /// Lists returns with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_returns(
        &self,
        tenant_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<ReturnListResponse, ServiceError> {
        let paginator = return_order::Entity::find()
            .filter(return_order::Column::TenantId.eq(tenant_id))
            .order_by_desc(return_order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let returns = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(ReturnListResponse {
            returns: returns.into_iter().map(Self::to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    fn to_response(model: return_order::Model) -> ReturnResponse {
        ReturnResponse {
            id: model.id,
            return_no: model.return_no,
            order_id: model.order_id,
            supplier_id: model.supplier_id,
            product_id: model.product_id,
            batch_id: model.batch_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            status: model.status,
            reason: model.reason,
            completed_at: model.completed_at,
            created_at: model.created_at,
        }
    }
}
