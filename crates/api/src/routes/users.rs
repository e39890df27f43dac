//! Admin user management.

use std::sync::Arc;

use axum::extract::State;
use common::UserId;
use document_store::DocumentStore;
use domain::{PageRequest, User};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::ApiResponse;
use crate::session::AdminSession;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// GET /admin/users
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<UserQuery>,
) -> Result<ApiResponse<Vec<User>>, ApiError> {
    let page = PageRequest::new(query.page, query.limit, 20);
    let users = state.users.list(query.search.as_deref(), page).await?;
    Ok(ApiResponse::paged(users))
}

/// PATCH /admin/users/{id}/active
///
/// Admins cannot deactivate themselves.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.user_id))]
pub async fn set_active<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminSession,
    PathParam(id): PathParam<UserId>,
    JsonBody(req): JsonBody<SetActiveRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    if id == admin.0.user_id && !req.is_active {
        return Err(ApiError::BadRequest(
            "cannot deactivate your own account".to_string(),
        ));
    }
    let user = state.users.set_active(id, req.is_active).await?;
    let message = if user.active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(ApiResponse::ok(user).with_message(message))
}
