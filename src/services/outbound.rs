use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{views, ViewCache},
    db::DbPool,
    entities::outbound_tx,
    errors::ServiceError,
    events::{Event, EventSender},
    models::OutboundKind,
    services::drafts::unwrap_txn_err,
    services::stock::StockService,
};

/// Request/Response types for the outbound service
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OutboundRequest {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub manager_name: Option<String>,
    pub patient_name: Option<String>,
    pub chart_no: Option<String>,
    #[serde(default)]
    pub is_damaged: bool,
    #[serde(default)]
    pub is_defective: bool,
    pub memo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PackageOutboundRequest {
    #[validate(length(min = 1, message = "Package name is required"))]
    pub package_name: String,
    pub manager_name: Option<String>,
    pub patient_name: Option<String>,
    pub chart_no: Option<String>,
    /// Package contents, already composed into product/batch lines by the
    /// catalog layer.
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub lines: Vec<PackageLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PackageLine {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OutboundResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i32,
    pub kind: OutboundKind,
    pub manager_name: Option<String>,
    pub patient_name: Option<String>,
    pub chart_no: Option<String>,
    pub package_name: Option<String>,
    pub is_damaged: bool,
    pub is_defective: bool,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-line outcome of a unified outbound. One entry per input line, in
/// input order, success or failure with the reason.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnifiedLineResult {
    pub index: usize,
    pub success: bool,
    pub outbound_id: Option<Uuid>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnifiedOutboundReport {
    pub results: Vec<UnifiedLineResult>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OutboundHistoryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub product_id: Option<Uuid>,
    pub manager: Option<String>,
    /// Free-text search over patient, chart number, and memo.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OutboundListResponse {
    pub outbounds: Vec<OutboundResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Validates and commits dispensing transactions against the stock ledger.
/// Plain, bulk, and package outbound are all-or-nothing: every line is
/// validated before any deduction commits. The unified variant instead
/// tolerates per-line failure and reports each line separately.
#[derive(Clone)]
pub struct OutboundService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    cache: ViewCache,
}

impl OutboundService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, cache: ViewCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Creates a single plain outbound transaction.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id, batch_id = %request.batch_id))]
    pub async fn create_outbound(
        &self,
        tenant_id: Uuid,
        request: OutboundRequest,
    ) -> Result<OutboundResponse, ServiceError> {
        request.validate()?;

        let responses = self
            .commit_lines(tenant_id, vec![request], OutboundKind::Plain, None)
            .await?;

        Ok(responses
            .into_iter()
            .next()
            .expect("single-line outbound yields exactly one transaction"))
    }

    /// Creates multiple outbound transactions atomically: a single invalid
    /// line aborts the whole batch, leaving every batch untouched.
    #[instrument(skip(self, requests), fields(tenant_id = %tenant_id, line_count = requests.len()))]
    pub async fn create_bulk(
        &self,
        tenant_id: Uuid,
        requests: Vec<OutboundRequest>,
    ) -> Result<Vec<OutboundResponse>, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one outbound line is required".to_string(),
            ));
        }
        for request in &requests {
            request.validate()?;
        }

        self.commit_lines(tenant_id, requests, OutboundKind::Plain, None)
            .await
    }

    /// Dispenses a composed package. Same all-or-nothing policy as bulk,
    /// with the package label stamped on every transaction.
    #[instrument(skip(self, request), fields(tenant_id = %tenant_id, package = %request.package_name))]
    pub async fn create_package(
        &self,
        tenant_id: Uuid,
        request: PackageOutboundRequest,
    ) -> Result<Vec<OutboundResponse>, ServiceError> {
        request.validate()?;
        for line in &request.lines {
            line.validate()?;
        }

        let lines = request
            .lines
            .iter()
            .map(|line| OutboundRequest {
                product_id: line.product_id,
                batch_id: line.batch_id,
                quantity: line.quantity,
                manager_name: request.manager_name.clone(),
                patient_name: request.patient_name.clone(),
                chart_no: request.chart_no.clone(),
                is_damaged: false,
                is_defective: false,
                memo: None,
            })
            .collect();

        self.commit_lines(
            tenant_id,
            lines,
            OutboundKind::Package,
            Some(request.package_name),
        )
        .await
    }

    /// Multi-line outbound that tolerates per-line failure: each line commits
    /// in its own transaction and the report carries one structured entry per
    /// line. A failed line never blocks the others.
    #[instrument(skip(self, requests), fields(tenant_id = %tenant_id, line_count = requests.len()))]
    pub async fn create_unified(
        &self,
        tenant_id: Uuid,
        requests: Vec<OutboundRequest>,
    ) -> Result<UnifiedOutboundReport, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one outbound line is required".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let line_result = match request.validate() {
                Err(e) => Err(ServiceError::ValidationError(e.to_string())),
                Ok(()) => self
                    .commit_lines(tenant_id, vec![request], OutboundKind::Unified, None)
                    .await
                    .map(|mut r| r.remove(0)),
            };

            match line_result {
                Ok(response) => {
                    info!(index, outbound_id = %response.id, "Unified outbound line committed");
                    results.push(UnifiedLineResult {
                        index,
                        success: true,
                        outbound_id: Some(response.id),
                        error: None,
                    });
                }
                Err(e) => {
                    let reason = e.response_message();
                    warn!(index, %reason, "Unified outbound line failed");
                    results.push(UnifiedLineResult {
                        index,
                        success: false,
                        outbound_id: None,
                        error: Some(reason),
                    });
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Ok(UnifiedOutboundReport {
            results,
            succeeded,
            failed,
        })
    }

    /// Outbound history with date-range, product, manager, and free-text
    /// filters, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_outbounds(
        &self,
        tenant_id: Uuid,
        filter: OutboundHistoryFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OutboundListResponse, ServiceError> {
        let mut query =
            outbound_tx::Entity::find().filter(outbound_tx::Column::TenantId.eq(tenant_id));

        if let Some(from) = filter.from {
            query = query.filter(outbound_tx::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(outbound_tx::Column::CreatedAt.lte(to));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(outbound_tx::Column::ProductId.eq(product_id));
        }
        if let Some(manager) = filter.manager {
            query = query.filter(outbound_tx::Column::ManagerName.contains(&manager));
        }
        if let Some(search) = filter.search {
            query = query.filter(
                Condition::any()
                    .add(outbound_tx::Column::PatientName.contains(&search))
                    .add(outbound_tx::Column::ChartNo.contains(&search))
                    .add(outbound_tx::Column::Memo.contains(&search)),
            );
        }

        let paginator = query
            .order_by_desc(outbound_tx::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let outbounds = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OutboundListResponse {
            outbounds: outbounds.into_iter().map(Self::to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Fetches a single outbound transaction's detail.
    #[instrument(skip(self))]
    pub async fn get_outbound(
        &self,
        tenant_id: Uuid,
        outbound_id: Uuid,
    ) -> Result<OutboundResponse, ServiceError> {
        let tx = outbound_tx::Entity::find_by_id(outbound_id)
            .filter(outbound_tx::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Outbound {} not found", outbound_id))
            })?;

        Ok(Self::to_response(tx))
    }

    // ---- internals ----

    /// Validates every line against its batch, then deducts and records all
    /// lines in one transaction. The deduction re-validates against current
    /// quantities, so overlapping lines on the same batch cannot drive it
    /// negative; any failure rolls the whole transaction back.
    async fn commit_lines(
        &self,
        tenant_id: Uuid,
        requests: Vec<OutboundRequest>,
        kind: OutboundKind,
        package_name: Option<String>,
    ) -> Result<Vec<OutboundResponse>, ServiceError> {
        let committed = self
            .db
            .transaction::<_, Vec<(outbound_tx::Model, i32)>, ServiceError>(move |txn| {
                let requests = requests.clone();
                let kind = kind.clone();
                let package_name = package_name.clone();
                Box::pin(async move {
                    // Validate all lines before committing any deduction
                    for request in &requests {
                        let batch =
                            StockService::find_batch(txn, tenant_id, request.batch_id).await?;
                        if batch.product_id != request.product_id {
                            return Err(ServiceError::ValidationError(format!(
                                "Batch {} does not belong to product {}",
                                request.batch_id, request.product_id
                            )));
                        }
                        StockService::validate_outbound(&batch, request.quantity)?;
                    }

                    let mut committed = Vec::with_capacity(requests.len());
                    for request in requests {
                        let aggregate = StockService::deduct(
                            txn,
                            tenant_id,
                            request.batch_id,
                            request.product_id,
                            request.quantity,
                        )
                        .await?;

                        let tx = outbound_tx::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            tenant_id: Set(tenant_id),
                            product_id: Set(request.product_id),
                            batch_id: Set(request.batch_id),
                            quantity: Set(request.quantity),
                            kind: Set(kind.clone()),
                            manager_name: Set(request.manager_name),
                            patient_name: Set(request.patient_name),
                            chart_no: Set(request.chart_no),
                            package_name: Set(package_name.clone()),
                            is_damaged: Set(request.is_damaged),
                            is_defective: Set(request.is_defective),
                            memo: Set(request.memo),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                        committed.push((tx, aggregate));
                    }

                    Ok(committed)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.cache.invalidate(
            tenant_id,
            &[views::OUTBOUND_HISTORY, views::ORDER_CANDIDATES],
        );

        let mut responses = Vec::with_capacity(committed.len());
        for (tx, aggregate) in committed {
            self.event_sender
                .send_logged(Event::StockDeducted {
                    tenant_id,
                    product_id: tx.product_id,
                    batch_id: tx.batch_id,
                    quantity: tx.quantity,
                    new_aggregate: aggregate,
                })
                .await;
            responses.push(Self::to_response(tx));
        }

        Ok(responses)
    }

    fn to_response(tx: outbound_tx::Model) -> OutboundResponse {
        OutboundResponse {
            id: tx.id,
            product_id: tx.product_id,
            batch_id: tx.batch_id,
            quantity: tx.quantity,
            kind: tx.kind,
            manager_name: tx.manager_name,
            patient_name: tx.patient_name,
            chart_no: tx.chart_no,
            package_name: tx.package_name,
            is_damaged: tx.is_damaged,
            is_defective: tx.is_defective,
            memo: tx.memo,
            created_at: tx.created_at,
        }
    }
}
