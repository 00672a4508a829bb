use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::common::{session_id, tenant_id};
use crate::services::drafts::{AddDraftItemRequest, DraftResponse};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateDraftItemRequest {
    /// New quantity for the line; zero removes it.
    pub quantity: i32,
}

/// GET /draft — fetch (or transparently create) the session's draft.
pub async fn get_draft(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<DraftResponse> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    let draft = state.services.drafts.get_or_create(tenant, &session).await?;
    Ok(Json(ApiResponse::success(draft)))
}

/// POST /draft/items — add or merge an item.
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddDraftItemRequest>,
) -> ApiResult<DraftResponse> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    let draft = state
        .services
        .drafts
        .add_item(tenant, &session, request)
        .await?;
    Ok(Json(ApiResponse::success(draft)))
}

/// PUT /draft/items/{id} — set an item's quantity (zero removes).
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateDraftItemRequest>,
) -> ApiResult<DraftResponse> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    let draft = state
        .services
        .drafts
        .update_item(tenant, &session, item_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(draft)))
}

/// PUT /draft — replace the entire item list.
pub async fn replace_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(items): Json<Vec<AddDraftItemRequest>>,
) -> ApiResult<DraftResponse> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    let draft = state
        .services
        .drafts
        .replace_all(tenant, &session, items)
        .await?;
    Ok(Json(ApiResponse::success(draft)))
}

/// DELETE /draft — drop the session's draft.
pub async fn delete_draft(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    let tenant = tenant_id(&headers)?;
    let session = session_id(&headers)?;

    state.services.drafts.delete(tenant, &session).await?;
    Ok(Json(ApiResponse::success(())))
}
