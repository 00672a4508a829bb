use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::increment_counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{views, ViewCache},
    db::DbPool,
    entities::{order, order_draft, order_draft_item, order_item, product, supplier_contact},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderNumber, OrderStatus},
    notifications::{ContactEvent, ContactMessage, NotificationOutcome, Notifier},
    services::drafts::unwrap_txn_err,
    services::splitter::{OrderSplitter, SplitLine, SupplierGroup},
    webhooks::{
        CancelOrderPayload, CompleteOrderPayload, NewOrderPayload, OrderLinePayload, ReceivedLine,
        SupplierEvent, SupplierWebhookClient,
    },
};

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Overrides the catalog unit price when present.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<CreateOrderItemRequest>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub product_name: String,
    pub brand: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub memo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub supplier_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub memo: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Owns the order state machine: creation (from draft or direct items),
/// cancellation, completion, and deletion, with best-effort notification
/// fan-out after each committed transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    splitter: OrderSplitter,
    event_sender: EventSender,
    notifier: Arc<dyn Notifier>,
    webhooks: SupplierWebhookClient,
    cache: ViewCache,
    number_retries: u32,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        notifier: Arc<dyn Notifier>,
        webhooks: SupplierWebhookClient,
        cache: ViewCache,
        number_retries: u32,
    ) -> Self {
        Self {
            splitter: OrderSplitter::new(db.clone()),
            db,
            event_sender,
            notifier,
            webhooks,
            cache,
            number_retries,
        }
    }

    /// Converts the session draft into one order per resolved supplier. The
    /// draft is deleted in the same transaction that persists the orders;
    /// notifications go out only after the commit.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, session_id = %session_id))]
    pub async fn create_from_draft(
        &self,
        tenant_id: Uuid,
        session_id: &str,
        created_by: Option<String>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let draft = order_draft::Entity::find()
            .filter(order_draft::Column::TenantId.eq(tenant_id))
            .filter(order_draft::Column::SessionId.eq(session_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No draft for session {}", session_id))
            })?;

        if draft.is_expired(Utc::now()) {
            return Err(ServiceError::ValidationError(
                "Draft has expired; rebuild the cart before ordering".to_string(),
            ));
        }

        let draft_items = order_draft_item::Entity::find()
            .filter(order_draft_item::Column::DraftId.eq(draft.id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if draft_items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Draft has no items".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(draft_items.len());
        for item in &draft_items {
            let product = self.find_product(tenant_id, item.product_id).await?;
            lines.push(SplitLine {
                product_id: item.product_id,
                batch_id: item.batch_id,
                product_name: product.name,
                brand: product.brand,
                quantity: item.quantity,
                unit_price: item.unit_price,
                supplier_id: item.supplier_id,
            });
        }

        let orders = self
            .create_orders(tenant_id, lines, created_by, Some(draft.id))
            .await?;

        self.event_sender
            .send_logged(Event::DraftConverted {
                tenant_id,
                session_id: session_id.to_string(),
                order_count: orders.len(),
            })
            .await;

        Ok(orders)
    }

    /// Creates orders from directly-supplied items, bypassing the draft.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id))]
    pub async fn create_direct(
        &self,
        tenant_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        request.validate()?;

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            item.validate()?;
            let product = self.find_product(tenant_id, item.product_id).await?;
            lines.push(SplitLine {
                product_id: item.product_id,
                batch_id: item.batch_id,
                product_name: product.name,
                brand: product.brand,
                quantity: item.quantity,
                unit_price: item.unit_price.unwrap_or(product.unit_price),
                supplier_id: product.supplier_id,
            });
        }

        self.create_orders(tenant_id, lines, request.created_by, None)
            .await
    }

    async fn create_orders(
        &self,
        tenant_id: Uuid,
        lines: Vec<SplitLine>,
        created_by: Option<String>,
        draft_id: Option<Uuid>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let groups = self.splitter.split(tenant_id, lines).await?;
        let retries = self.number_retries;
        let creator = created_by.clone();

        let persisted = self
            .db
            .transaction::<_, Vec<(order::Model, Vec<order_item::Model>)>, ServiceError>(
                move |txn| {
                    let groups = groups.clone();
                    let creator = creator.clone();
                    Box::pin(async move {
                        let mut results = Vec::with_capacity(groups.len());

                        for group in groups {
                            let number =
                                Self::generate_unique_number(txn, tenant_id, retries).await?;
                            let saved =
                                Self::insert_order(txn, tenant_id, &number, &group, &creator)
                                    .await?;
                            results.push(saved);
                        }

                        if let Some(draft_id) = draft_id {
                            order_draft_item::Entity::delete_many()
                                .filter(order_draft_item::Column::DraftId.eq(draft_id))
                                .exec(txn)
                                .await
                                .map_err(ServiceError::DatabaseError)?;
                            order_draft::Entity::delete_by_id(draft_id)
                                .exec(txn)
                                .await
                                .map_err(ServiceError::DatabaseError)?;
                        }

                        Ok(results)
                    })
                },
            )
            .await
            .map_err(unwrap_txn_err)?;

        // Committed: everything below is best-effort and must not unwind
        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        let mut responses = Vec::with_capacity(persisted.len());
        for (order_model, items) in persisted {
            increment_counter!("medistock_orders_created_total");
            info!(
                order_id = %order_model.id,
                order_number = %order_model.order_number,
                status = %order_model.status,
                "Order created"
            );

            self.event_sender
                .send_logged(Event::OrderCreated {
                    order_id: order_model.id,
                    order_number: order_model.order_number.clone(),
                    tenant_id,
                })
                .await;

            let supplier = self.load_supplier(tenant_id, order_model.supplier_id).await;
            self.notify_created(&order_model, &items, supplier.as_ref())
                .await;

            responses.push(Self::to_response(order_model, items));
        }

        Ok(responses)
    }

    /// Cancels an order. Only legal from pending/supplier_confirmed; fires
    /// exactly one cancellation notification after the commit.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let updated = self
            .db
            .transaction::<_, order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order_model = Self::find_order_for_update(txn, tenant_id, order_id).await?;

                    if !order_model.status.can_cancel() {
                        return Err(ServiceError::Conflict(format!(
                            "Cannot cancel order {} in status {}",
                            order_model.order_number, order_model.status
                        )));
                    }

                    let version = order_model.version;
                    let mut active: order::ActiveModel = order_model.into();
                    active.status = Set(OrderStatus::Cancelled);
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::DatabaseError)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        info!(order_number = %updated.order_number, "Order cancelled");
        self.event_sender
            .send_logged(Event::OrderCancelled {
                order_id: updated.id,
                order_number: updated.order_number.clone(),
            })
            .await;

        let items = self.load_items(updated.id).await?;
        let supplier = self.load_supplier(tenant_id, updated.supplier_id).await;
        self.notify_cancelled(&updated, &items, supplier.as_ref(), reason)
            .await;

        Ok(Self::to_response(updated, items))
    }

    /// Marks an order completed once all goods are physically received, then
    /// notifies the remote supplier with per-line received quantities so it
    /// can reconcile its own ledger. When no explicit map is given, the full
    /// ordered quantities are reported.
    #[instrument(skip(self, received), fields(tenant_id = %tenant_id, order_id = %order_id))]
    pub async fn complete_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        received: Option<HashMap<Uuid, i32>>,
    ) -> Result<OrderResponse, ServiceError> {
        let updated = self
            .db
            .transaction::<_, order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order_model = Self::find_order_for_update(txn, tenant_id, order_id).await?;

                    if !order_model
                        .status
                        .can_transition_to(&OrderStatus::Completed)
                    {
                        return Err(ServiceError::Conflict(format!(
                            "Cannot complete order {} in status {}",
                            order_model.order_number, order_model.status
                        )));
                    }

                    let version = order_model.version;
                    let mut active: order::ActiveModel = order_model.into();
                    active.status = Set(OrderStatus::Completed);
                    active.version = Set(version + 1);
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::DatabaseError)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);

        info!(order_number = %updated.order_number, "Order completed");
        self.event_sender
            .send_logged(Event::OrderCompleted {
                order_id: updated.id,
                order_number: updated.order_number.clone(),
            })
            .await;

        let items = self.load_items(updated.id).await?;
        let supplier = self.load_supplier(tenant_id, updated.supplier_id).await;
        self.notify_completed(tenant_id, &updated, &items, supplier.as_ref(), received)
            .await;

        Ok(Self::to_response(updated, items))
    }

    /// Deletes a terminal order and its items. Active orders must be
    /// cancelled or archived first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id))]
    pub async fn delete_order(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), ServiceError> {
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order_model = Self::find_order_for_update(txn, tenant_id, order_id).await?;

                    if !order_model.status.is_terminal() {
                        return Err(ServiceError::Conflict(format!(
                            "Cannot delete order {} in status {}",
                            order_model.order_number, order_model.status
                        )));
                    }

                    order_item::Entity::delete_many()
                        .filter(order_item::Column::OrderId.eq(order_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    order::Entity::delete_by_id(order_id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache
            .invalidate(tenant_id, &[views::PENDING_INBOUND, views::ORDER_CANDIDATES]);
        self.event_sender
            .send_logged(Event::OrderDeleted(order_id))
            .await;
        Ok(())
    }

    /// Retrieves an order with its items.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order_model = order::Entity::find_by_id(order_id)
            .filter(order::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = self.load_items(order_model.id).await?;
        Ok(Self::to_response(order_model, items))
    }

    /// Lists orders with pagination, newest first, optionally by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        tenant_id: Uuid,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find().filter(order::Column::TenantId.eq(tenant_id));
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut responses = Vec::with_capacity(orders.len());
        for order_model in orders {
            let items = self.load_items(order_model.id).await?;
            responses.push(Self::to_response(order_model, items));
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Pending-inbound aggregate grouped by supplier, served stale-while-
    /// revalidate from the view cache. Invalidated synchronously by every
    /// mutating order transition.
    #[instrument(skip(self))]
    pub async fn pending_inbound_view(
        &self,
        tenant_id: Uuid,
    ) -> Result<serde_json::Value, ServiceError> {
        let db = self.db.clone();
        self.cache
            .get_with(tenant_id, views::PENDING_INBOUND, move || async move {
                let orders = order::Entity::find()
                    .filter(order::Column::TenantId.eq(tenant_id))
                    .filter(
                        order::Column::Status
                            .is_in([OrderStatus::Pending, OrderStatus::SupplierConfirmed]),
                    )
                    .all(&*db)
                    .await
                    .map_err(|e| e.to_string())?;

                let mut by_supplier: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
                for order_model in orders {
                    let key = order_model
                        .supplier_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    by_supplier.entry(key).or_default().push(serde_json::json!({
                        "order_number": order_model.order_number,
                        "status": order_model.status,
                        "total_amount": order_model.total_amount,
                        "confirmed_at": order_model.confirmed_at,
                    }));
                }

                serde_json::to_value(by_supplier).map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| ServiceError::InternalError(e.to_string()))
    }

    /// Order-candidate product list (name, current stock, default supplier),
    /// also served from the view cache.
    #[instrument(skip(self))]
    pub async fn order_candidates_view(
        &self,
        tenant_id: Uuid,
    ) -> Result<serde_json::Value, ServiceError> {
        let db = self.db.clone();
        self.cache
            .get_with(tenant_id, views::ORDER_CANDIDATES, move || async move {
                let products = product::Entity::find()
                    .filter(product::Column::TenantId.eq(tenant_id))
                    .all(&*db)
                    .await
                    .map_err(|e| e.to_string())?;

                let candidates: Vec<serde_json::Value> = products
                    .into_iter()
                    .map(|p| {
                        serde_json::json!({
                            "product_id": p.id,
                            "name": p.name,
                            "brand": p.brand,
                            "stock": p.stock,
                            "unit_price": p.unit_price,
                            "supplier_id": p.supplier_id,
                        })
                    })
                    .collect();

                Ok(serde_json::Value::Array(candidates))
            })
            .await
            .map_err(|e| ServiceError::InternalError(e.to_string()))
    }

    // ---- internals ----

    /// Generates an order number, retrying on uniqueness collision a bounded
    /// number of times before failing the whole create.
    pub(crate) async fn generate_unique_number<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        retries: u32,
    ) -> Result<OrderNumber, ServiceError> {
        for attempt in 0..retries.max(1) {
            let candidate = OrderNumber::generate();
            let exists = order::Entity::find()
                .filter(order::Column::TenantId.eq(tenant_id))
                .filter(order::Column::OrderNumber.eq(candidate.to_string()))
                .one(conn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .is_some();

            if !exists {
                return Ok(candidate);
            }
            warn!(attempt, number = %candidate, "Order number collision, retrying");
        }

        Err(ServiceError::InternalError(
            "Exhausted order number generation retries".to_string(),
        ))
    }

    async fn insert_order<C: ConnectionTrait>(
        txn: &C,
        tenant_id: Uuid,
        number: &OrderNumber,
        group: &SupplierGroup,
        created_by: &Option<String>,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order_model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            order_number: Set(number.to_string()),
            status: Set(group.initial_status.clone()),
            supplier_id: Set(group.supplier.as_ref().map(|s| s.id)),
            total_amount: Set(group.subtotal),
            confirmed_at: Set(group.confirmed_at),
            adjustments: Set(None),
            memo: Set(None),
            created_by: Set(created_by.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        let mut items = Vec::with_capacity(group.items.len());
        for line in &group.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_model.id),
                product_id: Set(line.product_id),
                batch_id: Set(line.batch_id),
                product_name: Set(line.product_name.clone()),
                brand: Set(line.brand.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.line_total()),
                memo: Set(None),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            items.push(item);
        }

        Ok((order_model, items))
    }

    async fn find_order_for_update<C: ConnectionTrait>(
        txn: &C,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::TenantId.eq(tenant_id))
            .one(txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn find_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
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

    /// Exactly one of: webhook to the remote platform, or SMS/email to the
    /// manual contact. Failures are logged and surfaced on the operator
    /// alert channel; the order is already committed.
    async fn notify_created(
        &self,
        order_model: &order::Model,
        items: &[order_item::Model],
        supplier: Option<&supplier_contact::Model>,
    ) {
        match supplier {
            Some(contact) if contact.is_platform_linked() => {
                let Some(base_url) = contact.base_url.clone() else {
                    warn!(
                        order_number = %order_model.order_number,
                        supplier = %contact.name,
                        "Platform-linked supplier has no base URL, skipping webhook"
                    );
                    return;
                };
                let Some(supplier_tenant_id) = contact.remote_tenant_id else {
                    warn!(
                        order_number = %order_model.order_number,
                        supplier = %contact.name,
                        "Platform-linked supplier lost its remote tenant id, skipping webhook"
                    );
                    return;
                };
                let payload = NewOrderPayload {
                    order_no: OrderNumber::parse(&order_model.order_number).base,
                    clinic_tenant_id: order_model.tenant_id,
                    supplier_tenant_id,
                    total_amount: order_model.total_amount,
                    items: items.iter().map(Self::to_line_payload).collect(),
                    created_at: order_model.created_at,
                };
                self.webhooks.send_async(
                    base_url,
                    SupplierEvent::OrderCreated(payload),
                    Some(self.event_sender.clone()),
                );
            }
            Some(contact) => {
                self.send_contact_message(order_model, items, contact, ContactEvent::OrderCreated)
                    .await;
            }
            None => {
                info!(
                    order_number = %order_model.order_number,
                    "Order has no resolved supplier, skipping notification"
                );
            }
        }
    }

    async fn notify_cancelled(
        &self,
        order_model: &order::Model,
        items: &[order_item::Model],
        supplier: Option<&supplier_contact::Model>,
        reason: Option<String>,
    ) {
        match supplier {
            Some(contact) if contact.is_platform_linked() => {
                let Some(base_url) = contact.base_url.clone() else {
                    warn!(
                        order_number = %order_model.order_number,
                        "Platform-linked supplier has no base URL, skipping cancel webhook"
                    );
                    return;
                };
                let payload = CancelOrderPayload {
                    order_no: OrderNumber::parse(&order_model.order_number).base,
                    clinic_tenant_id: order_model.tenant_id,
                    reason,
                };
                self.webhooks.send_async(
                    base_url,
                    SupplierEvent::OrderCancelled(payload),
                    Some(self.event_sender.clone()),
                );
            }
            Some(contact) => {
                self.send_contact_message(order_model, items, contact, ContactEvent::OrderCancelled)
                    .await;
            }
            None => {}
        }
    }

    async fn notify_completed(
        &self,
        tenant_id: Uuid,
        order_model: &order::Model,
        items: &[order_item::Model],
        supplier: Option<&supplier_contact::Model>,
        received: Option<HashMap<Uuid, i32>>,
    ) {
        let Some(contact) = supplier else { return };
        if !contact.is_platform_linked() {
            return;
        }
        let Some(base_url) = contact.base_url.clone() else {
            warn!(
                order_number = %order_model.order_number,
                "Platform-linked supplier has no base URL, skipping completion webhook"
            );
            return;
        };

        let received_lines = items
            .iter()
            .map(|item| ReceivedLine {
                item_id: item.id,
                received_quantity: received
                    .as_ref()
                    .and_then(|map| map.get(&item.id).copied())
                    .unwrap_or(item.quantity),
            })
            .collect();

        let payload = CompleteOrderPayload {
            order_no: OrderNumber::parse(&order_model.order_number).base,
            clinic_tenant_id: tenant_id,
            received: received_lines,
        };
        self.webhooks.send_async(
            base_url,
            SupplierEvent::OrderCompleted(payload),
            Some(self.event_sender.clone()),
        );
    }

    async fn send_contact_message(
        &self,
        order_model: &order::Model,
        items: &[order_item::Model],
        contact: &supplier_contact::Model,
        event: ContactEvent,
    ) {
        let message = ContactMessage {
            event,
            order_number: order_model.order_number.clone(),
            supplier_name: contact.name.clone(),
            phone: contact.phone.clone(),
            email: contact.email.clone(),
            total_amount: order_model.total_amount,
            item_count: items.len(),
        };

        let outcome = self.notifier.notify(&message).await;
        if let NotificationOutcome::Failed(reason) = outcome {
            self.event_sender
                .send_logged(Event::NotificationFailed {
                    order_number: order_model.order_number.clone(),
                    channel: "contact".to_string(),
                    reason,
                })
                .await;
        }
    }

    fn to_line_payload(item: &order_item::Model) -> OrderLinePayload {
        OrderLinePayload {
            item_id: item.id,
            product_name: item.product_name.clone(),
            brand: item.brand.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }

    pub(crate) fn to_response(
        order_model: order::Model,
        items: Vec<order_item::Model>,
    ) -> OrderResponse {
        OrderResponse {
            id: order_model.id,
            order_number: order_model.order_number,
            status: order_model.status,
            supplier_id: order_model.supplier_id,
            total_amount: order_model.total_amount,
            confirmed_at: order_model.confirmed_at,
            memo: order_model.memo,
            created_by: order_model.created_by,
            created_at: order_model.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    batch_id: item.batch_id,
                    product_name: item.product_name,
                    brand: item.brand,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    memo: item.memo,
                })
                .collect(),
        }
    }
}
