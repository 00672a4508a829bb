use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::verify_api_key;
use crate::services::inbound::RemoteSplitPayload;
use crate::services::reconciliation::SupplierConfirmationPayload;
use crate::services::returns::ReturnCompletionPayload;
use crate::AppState;

/// Response envelope for supplier callbacks. Permanent absences are answered
/// as a soft failure instead of an HTTP error: the remote caller cannot
/// usefully retry and retry-storms must be avoided.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CallbackResponse {
    fn ok(order_id: Option<Uuid>) -> Self {
        Self {
            success: true,
            order_id,
            message: None,
        }
    }

    fn soft_failure(message: String) -> Self {
        Self {
            success: false,
            order_id: None,
            message: Some(message),
        }
    }
}

/// POST /webhooks/order/supplier-confirmed — supplier confirmation or
/// rejection, delivered at-least-once and possibly out of order.
pub async fn supplier_confirmed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SupplierConfirmationPayload>,
) -> Result<Json<CallbackResponse>, ServiceError> {
    verify_api_key(&headers, &state.config.supplier.api_key)?;

    match state.services.reconciler.process_confirmation(payload).await {
        Ok(order_id) => Ok(Json(CallbackResponse::ok(Some(order_id)))),
        Err(ServiceError::NotFound(message)) => {
            warn!(%message, "Confirmation callback for unknown order");
            Ok(Json(CallbackResponse::soft_failure(message)))
        }
        Err(e) => Err(e),
    }
}

/// POST /webhooks/order/order-split — remote-initiated order split, always
/// exactly two derivative orders.
pub async fn order_split(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RemoteSplitPayload>,
) -> Result<Json<CallbackResponse>, ServiceError> {
    verify_api_key(&headers, &state.config.supplier.api_key)?;

    match state.services.inbound.apply_remote_split(payload).await {
        Ok(()) => Ok(Json(CallbackResponse::ok(None))),
        Err(ServiceError::NotFound(message)) => {
            warn!(%message, "Split callback for unknown order");
            Ok(Json(CallbackResponse::soft_failure(message)))
        }
        Err(e) => Err(e),
    }
}

/// POST /webhooks/returns/completed — return completion; duplicate or
/// unknown deliveries are logged no-ops.
pub async fn return_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReturnCompletionPayload>,
) -> Result<Json<CallbackResponse>, ServiceError> {
    verify_api_key(&headers, &state.config.supplier.api_key)?;

    let return_no = payload.return_no.clone();
    match state.services.returns.complete_return(payload).await? {
        Some(_) => Ok(Json(CallbackResponse::ok(None))),
        None => {
            info!(%return_no, "Return completion no-op");
            Ok(Json(CallbackResponse::soft_failure(format!(
                "Return {} not found",
                return_no
            ))))
        }
    }
}
