//! Admin stock management.

use std::sync::Arc;

use axum::extract::State;
use common::ProductId;
use document_store::DocumentStore;
use domain::{
    BulkAdjustReport, Category, InventoryFilter, InventoryOverview, PageRequest, Product,
    StockAdjustment, StockChange, StockOperation,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::session::AdminSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockUpdateRequest {
    pub stock: u32,
    #[serde(default)]
    pub operation: StockOperation,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkStockRequest {
    pub updates: Vec<StockAdjustment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverviewQuery {
    pub category: Option<Category>,
    #[serde(default)]
    pub low_stock: bool,
    #[serde(default)]
    pub out_of_stock: bool,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// PUT /inventory/stock/{product_id}
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn adjust<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    PathParam(product_id): PathParam<ProductId>,
    JsonBody(req): JsonBody<StockUpdateRequest>,
) -> Result<ApiResponse<StockChange>, ApiError> {
    let change = state
        .inventory
        .adjust_stock(product_id, req.stock, req.operation)
        .await?;
    Ok(ApiResponse::ok(change).with_message("Stock updated"))
}

/// PUT /inventory/stock/bulk
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id, count = req.updates.len()))]
pub async fn bulk_adjust<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    JsonBody(req): JsonBody<BulkStockRequest>,
) -> Result<ApiResponse<BulkAdjustReport>, ApiError> {
    if req.updates.is_empty() {
        return Err(ApiError::BadRequest("updates must not be empty".to_string()));
    }
    let report = state.inventory.bulk_adjust(req.updates).await;
    let message = format!("{} of {} products updated", report.successful, report.total);
    Ok(ApiResponse::ok(report).with_message(message))
}

/// GET /inventory/low-stock
pub async fn low_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<LowStockQuery>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    Ok(ApiResponse::ok(
        state.inventory.query_low_stock(query.threshold).await?,
    ))
}

/// GET /inventory/overview
pub async fn overview<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<OverviewQuery>,
) -> Result<ApiResponse<InventoryOverview>, ApiError> {
    let filter = InventoryFilter {
        category: query.category,
        low_stock: query.low_stock,
        out_of_stock: query.out_of_stock,
        page: PageRequest::new(query.page, query.limit, 20),
    };
    Ok(ApiResponse::ok(state.inventory.overview(filter).await?))
}
