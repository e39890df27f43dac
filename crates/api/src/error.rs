//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use document_store::StoreError;
use domain::{CartError, DomainError};
use reporting::ReportError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, unknown or inactive session.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Signed in, but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Report(err) => report_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::NotFound { .. } | DomainError::Cart(CartError::LineNotFound { .. }) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        DomainError::InvalidArgument(_)
        | DomainError::InsufficientStock { .. }
        | DomainError::Cart(_)
        | DomainError::Order(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::Conflict(_)
        | DomainError::Store(StoreError::ConcurrencyConflict { .. })
        | DomainError::Store(StoreError::DuplicateKey { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::Store(_) | DomainError::Serialization(_) => internal(&err),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::PaymentDeclined { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
        CheckoutError::Domain(err) => domain_error_to_response(err),
    }
}

fn report_error_to_response(err: ReportError) -> (StatusCode, String) {
    match err {
        ReportError::InvalidRange { .. } | ReportError::InvalidInterval(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ReportError::Domain(err) => domain_error_to_response(err),
        ReportError::Store(_) | ReportError::Deserialization(_) => internal(&err),
    }
}
