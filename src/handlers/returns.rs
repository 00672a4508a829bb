use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::handlers::common::tenant_id;
use crate::services::returns::{CreateReturnRequest, ReturnListResponse, ReturnResponse};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// POST /returns — send goods back to the supplier, deducting stock.
pub async fn create_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateReturnRequest>,
) -> ApiResult<ReturnResponse> {
    let tenant = tenant_id(&headers)?;
    let created = state.services.returns.create_return(tenant, request).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// GET /returns — paginated listing.
pub async fn list_returns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<ReturnListResponse> {
    let tenant = tenant_id(&headers)?;
    let returns = state
        .services
        .returns
        .list_returns(tenant, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(returns)))
}
