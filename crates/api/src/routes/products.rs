//! Catalog endpoints: public browsing and admin management.

use std::sync::Arc;

use axum::extract::State;
use common::ProductId;
use document_store::DocumentStore;
use domain::{Category, NewProduct, PageRequest, Product, ProductFilter, ProductPatch};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::session::AdminSession;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<Category>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /products
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    let filter = ProductFilter {
        category: query.category,
        search: query.q,
        include_inactive: false,
    };
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let products = state.catalog.list(filter, page).await?;
    Ok(ApiResponse::paged(products))
}

/// GET /products/{id}
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    PathParam(id): PathParam<ProductId>,
) -> Result<ApiResponse<Product>, ApiError> {
    Ok(ApiResponse::ok(state.catalog.get_active(id).await?))
}

/// POST /admin/products
#[tracing::instrument(skip(state, admin, input), fields(admin_id = %admin.0.user_id))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    JsonBody(input): JsonBody<NewProduct>,
) -> Result<ApiResponse<Product>, ApiError> {
    let product = state.catalog.create(input).await?;
    Ok(ApiResponse::created(product).with_message("Product created"))
}

/// PATCH /admin/products/{id}
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    PathParam(id): PathParam<ProductId>,
    JsonBody(patch): JsonBody<ProductPatch>,
) -> Result<ApiResponse<Product>, ApiError> {
    Ok(ApiResponse::ok(state.catalog.update(id, patch).await?))
}

/// DELETE /admin/products/{id}
///
/// Soft delete: the product leaves the catalog but existing orders keep
/// their snapshots and reports can still join on it.
pub async fn deactivate<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    PathParam(id): PathParam<ProductId>,
) -> Result<ApiResponse<Product>, ApiError> {
    let product = state.catalog.deactivate(id).await?;
    Ok(ApiResponse::ok(product).with_message("Product deactivated"))
}
