//! Medistock API Library
//!
//! Multi-tenant clinic inventory and supplier-ordering backend: order
//! lifecycle, supplier webhook reconciliation, and batch-level stock control.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod notifications;
pub mod services;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::Json, routing::{delete, get, post, put}, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::cache::ViewCache;
use crate::events::EventSender;
use crate::notifications::Notifier;
use crate::services::{
    drafts::DraftService, inbound::InboundService, orders::OrderService,
    outbound::OutboundService, reconciliation::ConfirmationReconciler, returns::ReturnService,
    stock::StockService,
};
use crate::webhooks::SupplierWebhookClient;

/// All engine services, constructed once and shared through the app state.
#[derive(Clone)]
pub struct AppServices {
    pub drafts: DraftService,
    pub orders: OrderService,
    pub reconciler: ConfirmationReconciler,
    pub inbound: InboundService,
    pub outbound: OutboundService,
    pub returns: ReturnService,
    pub stock: StockService,
}

impl AppServices {
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: &config::AppConfig,
        event_sender: EventSender,
        cache: ViewCache,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let webhooks = SupplierWebhookClient::new(
            config.supplier.api_key.clone(),
            Duration::from_secs(config.supplier.webhook_timeout_secs),
        );

        Self {
            drafts: DraftService::new(
                db.clone(),
                chrono::Duration::hours(config.draft_ttl_hours),
            ),
            orders: OrderService::new(
                db.clone(),
                event_sender.clone(),
                notifier,
                webhooks.clone(),
                cache.clone(),
                config.order_number_retries,
            ),
            reconciler: ConfirmationReconciler::new(
                db.clone(),
                event_sender.clone(),
                cache.clone(),
            ),
            inbound: InboundService::new(
                db.clone(),
                event_sender.clone(),
                webhooks,
                cache.clone(),
            ),
            outbound: OutboundService::new(db.clone(), event_sender.clone(), cache.clone()),
            returns: ReturnService::new(db.clone(), event_sender, cache),
            stock: StockService::new(db),
        }
    }
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: EventSender,
    pub cache: ViewCache,
    pub services: AppServices,
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// REST surface consumed by the presentation layer.
pub fn api_v1_routes() -> Router<AppState> {
    let drafts = Router::new()
        .route("/draft", get(handlers::drafts::get_draft))
        .route("/draft", put(handlers::drafts::replace_draft))
        .route("/draft", delete(handlers::drafts::delete_draft))
        .route("/draft/items", post(handlers::drafts::add_item))
        .route("/draft/items/:id", put(handlers::drafts::update_item));

    let orders = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/from-draft",
            post(handlers::orders::create_from_draft),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id", delete(handlers::orders::delete_order))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route("/orders/:id/receive", post(handlers::orders::receive_order))
        .route(
            "/orders/:id/complete",
            post(handlers::orders::complete_order),
        );

    let outbounds = Router::new()
        .route("/outbounds", post(handlers::outbound::create_outbound))
        .route("/outbounds", get(handlers::outbound::list_outbounds))
        .route("/outbounds/bulk", post(handlers::outbound::create_bulk))
        .route(
            "/outbounds/package",
            post(handlers::outbound::create_package),
        )
        .route(
            "/outbounds/unified",
            post(handlers::outbound::create_unified),
        )
        .route("/outbounds/:id", get(handlers::outbound::get_outbound));

    let returns = Router::new()
        .route("/returns", post(handlers::returns::create_return))
        .route("/returns", get(handlers::returns::list_returns));

    // Frequently-polled aggregates, served stale-while-revalidate
    let views = Router::new()
        .route(
            "/views/pending-inbound",
            get(handlers::orders::pending_inbound_view),
        )
        .route(
            "/views/order-candidates",
            get(handlers::orders::order_candidates_view),
        );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(drafts)
        .merge(orders)
        .merge(outbounds)
        .merge(returns)
        .merge(views)
}

/// Inbound callbacks from the remote supplier platform. Authenticated by the
/// shared static API key, not by user identity.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/order/supplier-confirmed",
            post(handlers::supplier_callbacks::supplier_confirmed),
        )
        .route(
            "/order/order-split",
            post(handlers::supplier_callbacks::order_split),
        )
        .route(
            "/returns/completed",
            post(handlers::supplier_callbacks::return_completed),
        )
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "medistock-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
