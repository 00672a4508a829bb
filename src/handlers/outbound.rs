use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::common::tenant_id;
use crate::services::outbound::{
    OutboundHistoryFilter, OutboundListResponse, OutboundRequest, OutboundResponse,
    PackageOutboundRequest, UnifiedOutboundReport,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct OutboundListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
    pub product_id: Option<Uuid>,
    pub manager: Option<String>,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// POST /outbounds — single dispensing transaction.
pub async fn create_outbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OutboundRequest>,
) -> ApiResult<OutboundResponse> {
    let tenant = tenant_id(&headers)?;
    let outbound = state
        .services
        .outbound
        .create_outbound(tenant, request)
        .await?;
    Ok(Json(ApiResponse::success(outbound)))
}

/// POST /outbounds/bulk — all-or-nothing multi-line outbound.
pub async fn create_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(requests): Json<Vec<OutboundRequest>>,
) -> ApiResult<Vec<OutboundResponse>> {
    let tenant = tenant_id(&headers)?;
    let outbounds = state.services.outbound.create_bulk(tenant, requests).await?;
    Ok(Json(ApiResponse::success(outbounds)))
}

/// POST /outbounds/package — dispense a composed package atomically.
pub async fn create_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PackageOutboundRequest>,
) -> ApiResult<Vec<OutboundResponse>> {
    let tenant = tenant_id(&headers)?;
    let outbounds = state
        .services
        .outbound
        .create_package(tenant, request)
        .await?;
    Ok(Json(ApiResponse::success(outbounds)))
}

/// POST /outbounds/unified — per-line failure tolerance with a report.
pub async fn create_unified(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(requests): Json<Vec<OutboundRequest>>,
) -> ApiResult<UnifiedOutboundReport> {
    let tenant = tenant_id(&headers)?;
    let report = state
        .services
        .outbound
        .create_unified(tenant, requests)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /outbounds — history with filters.
pub async fn list_outbounds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OutboundListQuery>,
) -> ApiResult<OutboundListResponse> {
    let tenant = tenant_id(&headers)?;
    let filter = OutboundHistoryFilter {
        from: query.from,
        to: query.to,
        product_id: query.product_id,
        manager: query.manager,
        search: query.search,
    };

    let outbounds = state
        .services
        .outbound
        .list_outbounds(tenant, filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(outbounds)))
}

/// GET /outbounds/{id}
pub async fn get_outbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(outbound_id): Path<Uuid>,
) -> ApiResult<OutboundResponse> {
    let tenant = tenant_id(&headers)?;
    let outbound = state
        .services
        .outbound
        .get_outbound(tenant, outbound_id)
        .await?;
    Ok(Json(ApiResponse::success(outbound)))
}
