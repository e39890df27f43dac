//! Admin order management: listing, status changes, history and labels.

use std::sync::Arc;

use axum::extract::State;
use common::OrderId;
use document_store::DocumentStore;
use domain::order::{BulkOutcome, OrderHistory, ShippingLabel};
use domain::{
    Order, OrderFilter, OrderStatus, PageRequest, PaymentStatus, ShippingMethod, StatusChange,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::routes::{Bound, parse_date};
use crate::session::AdminSession;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrdersQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<ShippingMethod>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<OrderId>,
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// GET /admin/orders
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<AdminOrdersQuery>,
) -> Result<ApiResponse<Vec<Order>>, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        q: query.q,
        from: parse_date("from", query.from.as_deref(), Bound::Start)?,
        to: parse_date("to", query.to.as_deref(), Bound::End)?,
        page: PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE),
    };
    Ok(ApiResponse::paged(state.orders.admin_list(filter).await?))
}

/// PATCH /admin/orders/{id}/status
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id, status = %req.status))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    PathParam(id): PathParam<OrderId>,
    JsonBody(req): JsonBody<StatusUpdateRequest>,
) -> Result<ApiResponse<Order>, ApiError> {
    let change = StatusChange {
        status: req.status,
        note: req.notes,
        actor: Some(admin.0.user_id),
        tracking_number: req.tracking_number,
        shipping_method: req.shipping_method,
    };
    let outcome = state.orders.transition_status(id, change).await?;
    let message = if outcome.changed {
        "Order status updated"
    } else {
        "Order status unchanged"
    };
    Ok(ApiResponse::ok(outcome.order).with_message(message))
}

/// PUT /admin/orders/bulk-status
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id, count = req.order_ids.len()))]
pub async fn bulk_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    JsonBody(req): JsonBody<BulkStatusRequest>,
) -> Result<ApiResponse<Vec<BulkOutcome>>, ApiError> {
    if req.order_ids.is_empty() {
        return Err(ApiError::BadRequest("order_ids must not be empty".to_string()));
    }
    let outcomes = state
        .orders
        .bulk_transition(req.order_ids, req.status, req.note, Some(admin.0.user_id))
        .await;
    let successful = outcomes.iter().filter(|o| o.success).count();
    let message = format!("{successful} of {} orders updated", outcomes.len());
    Ok(ApiResponse::ok(outcomes).with_message(message))
}

/// GET /admin/orders/{id}/history
pub async fn history<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    PathParam(id): PathParam<OrderId>,
) -> Result<ApiResponse<OrderHistory>, ApiError> {
    Ok(ApiResponse::ok(state.orders.history(id).await?))
}

/// GET /admin/orders/{id}/label
pub async fn label<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    PathParam(id): PathParam<OrderId>,
) -> Result<ApiResponse<ShippingLabel>, ApiError> {
    Ok(ApiResponse::ok(state.orders.label(id).await?))
}
