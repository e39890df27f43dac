//! Cart endpoints for the signed-in user.

use std::sync::Arc;

use axum::extract::State;
use common::ProductId;
use document_store::DocumentStore;
use domain::{AddToCart, Cart};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuantityRequest {
    pub size: String,
    /// Zero or less removes the line.
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemQuery {
    pub size: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouponRequest {
    pub code: String,
}

/// GET /cart
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<ApiResponse<Cart>, ApiError> {
    Ok(ApiResponse::ok(state.carts.get(session.user_id).await?))
}

/// POST /cart/items
pub async fn add_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    JsonBody(item): JsonBody<AddToCart>,
) -> Result<ApiResponse<Cart>, ApiError> {
    let cart = state.carts.add_item(session.user_id, item).await?;
    Ok(ApiResponse::ok(cart).with_message("Item added to cart"))
}

/// PUT /cart/items/{product_id}
pub async fn update_quantity<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    PathParam(product_id): PathParam<ProductId>,
    JsonBody(req): JsonBody<UpdateQuantityRequest>,
) -> Result<ApiResponse<Cart>, ApiError> {
    let cart = state
        .carts
        .update_quantity(session.user_id, product_id, &req.size, req.quantity)
        .await?;
    Ok(ApiResponse::ok(cart))
}

/// DELETE /cart/items/{product_id}?size=
pub async fn remove_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    PathParam(product_id): PathParam<ProductId>,
    QueryParams(query): QueryParams<RemoveItemQuery>,
) -> Result<ApiResponse<Cart>, ApiError> {
    let cart = state
        .carts
        .remove_item(session.user_id, product_id, &query.size)
        .await?;
    Ok(ApiResponse::ok(cart).with_message("Item removed from cart"))
}

/// DELETE /cart
pub async fn clear<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<ApiResponse<Cart>, ApiError> {
    let cart = state.carts.clear(session.user_id).await?;
    Ok(ApiResponse::ok(cart).with_message("Cart cleared"))
}

/// POST /cart/coupon
pub async fn apply_coupon<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
    JsonBody(req): JsonBody<CouponRequest>,
) -> Result<ApiResponse<Cart>, ApiError> {
    let cart = state.carts.apply_coupon(session.user_id, &req.code).await?;
    Ok(ApiResponse::ok(cart).with_message("Coupon applied"))
}

/// DELETE /cart/coupon
pub async fn remove_coupon<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    session: Session,
) -> Result<ApiResponse<Cart>, ApiError> {
    Ok(ApiResponse::ok(state.carts.remove_coupon(session.user_id).await?))
}
