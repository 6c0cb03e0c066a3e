//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient stock for a checkout or amendment.
    #[error("insufficient stock for {stock_id}: available={available}, requested={requested}")]
    InsufficientStock {
        /// The stock row that could not satisfy the request.
        stock_id: String,
        /// Units on hand.
        available: i64,
        /// Units requested.
        requested: i64,
    },

    /// The store lost a transaction conflict; the request can be retried.
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientStock {
                stock_id,
                available,
                requested,
            } => (
                StatusCode::CONFLICT,
                "insufficient_stock",
                self.to_string(),
                Some(serde_json::json!({
                    "stock_id": stock_id,
                    "available": available,
                    "requested": requested
                })),
            ),
            Self::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<verdant_store::StoreError> for ApiError {
    fn from(err: verdant_store::StoreError) -> Self {
        match err {
            verdant_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            verdant_store::StoreError::InsufficientStock {
                stock_id,
                available,
                requested,
            } => Self::InsufficientStock {
                stock_id,
                available,
                requested,
            },
            verdant_store::StoreError::InvalidTransition { from, to } => {
                Self::Conflict(format!("invalid status transition from {from} to {to}"))
            }
            verdant_store::StoreError::Invalid(msg) => Self::BadRequest(msg),
            verdant_store::StoreError::Conflict(msg) => Self::Unavailable(msg),
            verdant_store::StoreError::Database(msg)
            | verdant_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
