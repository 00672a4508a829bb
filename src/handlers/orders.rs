use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::common::{session_id, tenant_id};
use crate::models::OrderStatus;
use crate::services::inbound::SplitOutcome;
use crate::services::orders::{CreateOrderRequest, OrderListResponse, OrderResponse};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateFromDraftRequest {
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveOrderRequest {
    /// Received quantity per order item id; omitted items are not yet
    /// received.
    pub received: HashMap<Uuid, i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteOrderRequest {
    /// Optional received quantities; defaults to the full ordered amounts.
    pub received: Option<HashMap<Uuid, i32>>,
}

/// POST /orders — create orders from directly-supplied items. One order per
/// resolved supplier.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<Vec<OrderResponse>> {
    let tenant = tenant_id(&headers)?;
    let orders = state.services.orders.create_direct(tenant, request).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// POST /orders/from-draft — convert the session draft into orders.
pub async fn create_from_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateFromDraftRequest>,
) -> ApiResult<Vec<OrderResponse>> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    let orders = state
        .services
        .orders
        .create_from_draft(tenant, &session, request.created_by)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders — paginated listing, optionally filtered by status.
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<OrderListResponse> {
    let tenant = tenant_id(&headers)?;
    let status = match &query.status {
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            crate::errors::ServiceError::InvalidStatus(format!("Unknown order status: {raw}"))
        })?),
        None => None,
    };

    let orders = state
        .services
        .orders
        .list_orders(tenant, query.page, query.limit, status)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let tenant = tenant_id(&headers)?;
    let order = state.services.orders.get_order(tenant, order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> ApiResult<OrderResponse> {
    let tenant = tenant_id(&headers)?;
    let order = state
        .services
        .orders
        .cancel_order(tenant, order_id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /orders/{id}/receive — apply a (possibly partial) receipt, splitting
/// the order into completed and remaining portions.
pub async fn receive_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ReceiveOrderRequest>,
) -> ApiResult<SplitOutcome> {
    let tenant = tenant_id(&headers)?;
    let outcome = state
        .services
        .inbound
        .split_receive(tenant, order_id, request.received)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /orders/{id}/complete — mark fully received.
pub async fn complete_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CompleteOrderRequest>,
) -> ApiResult<OrderResponse> {
    let tenant = tenant_id(&headers)?;
    let order = state
        .services
        .orders
        .complete_order(tenant, order_id, request.received)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// GET /views/pending-inbound — pending/confirmed orders grouped by
/// supplier, from the stale-while-revalidate view cache.
pub async fn pending_inbound_view(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let tenant = tenant_id(&headers)?;
    let view = state.services.orders.pending_inbound_view(tenant).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// GET /views/order-candidates — product candidates for a new order.
pub async fn order_candidates_view(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let tenant = tenant_id(&headers)?;
    let view = state.services.orders.order_candidates_view(tenant).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// DELETE /orders/{id} — allowed only for terminal orders.
pub async fn delete_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> ApiResult<()> {
    let tenant = tenant_id(&headers)?;
    state.services.orders.delete_order(tenant, order_id).await?;
    Ok(Json(ApiResponse::success(())))
}
