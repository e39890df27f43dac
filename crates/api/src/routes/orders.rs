//! Customer order endpoints: checkout, history, payment callback and tracking.

use std::sync::Arc;

use axum::extract::State;
use checkout::CheckoutRequest;
use common::OrderId;
use document_store::DocumentStore;
use domain::order::TrackingView;
use domain::{Order, OrderStatus, PageRequest, PaymentConfirmation};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::session::Session;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct MyOrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

/// POST /orders
#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
pub async fn checkout<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    JsonBody(request): JsonBody<CheckoutRequest>,
) -> Result<ApiResponse<Order>, ApiError> {
    let order = state.checkout.checkout(session.user_id, request).await?;
    Ok(ApiResponse::created(order).with_message("Order placed"))
}

/// GET /orders/mine
pub async fn mine<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    QueryParams(query): QueryParams<MyOrdersQuery>,
) -> Result<ApiResponse<Vec<Order>>, ApiError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let orders = state
        .orders
        .list_for_user(session.user_id, query.status, page)
        .await?;
    Ok(ApiResponse::paged(orders))
}

/// GET /orders/{id}
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    PathParam(id): PathParam<OrderId>,
) -> Result<ApiResponse<Order>, ApiError> {
    Ok(ApiResponse::ok(state.orders.get_for(id, session.caller()).await?))
}

/// POST /payments/confirm
///
/// The order must belong to the caller, or the caller must be an admin.
#[tracing::instrument(skip(state, session, req), fields(order_id = %req.order_id))]
pub async fn confirm_payment<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    JsonBody(req): JsonBody<ConfirmPaymentRequest>,
) -> Result<ApiResponse<Order>, ApiError> {
    state.orders.get_for(req.order_id, session.caller()).await?;
    let succeeded = req.confirmation.succeeded;
    let order = state
        .orders
        .confirm_payment(req.order_id, req.confirmation)
        .await?;
    let message = if succeeded {
        "Payment confirmed"
    } else {
        "Payment failed"
    };
    Ok(ApiResponse::ok(order).with_message(message))
}

/// GET /tracking/order/{order_number}
///
/// Anonymous lookups are allowed; a signed-in caller must own the order.
pub async fn tracking<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Option<Session>,
    PathParam(order_number): PathParam<String>,
) -> Result<ApiResponse<TrackingView>, ApiError> {
    let view = state
        .orders
        .tracking(&order_number, session.map(|s| s.caller()))
        .await?;
    Ok(ApiResponse::ok(view))
}
