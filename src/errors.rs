use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error body rendered for every failed HTTP call that is not a structured
/// checkout rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// RFC 3339 timestamp of the failure
    pub timestamp: String,
}

/// A rejection returned by the external payment workflow.
///
/// Carries the code-prefixed error string (`PRODUCT:NOT_FOUND`,
/// `INVALID_SIGNATURE`, ...) and any structured per-field errors the workflow
/// attached, so the caller can show them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutFailure {
    pub status: u16,
    pub error: String,
    pub code: Option<String>,
    pub error_type: Option<String>,
    pub order_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<crate::models::ValidationError>,
}

impl std::fmt::Display for CheckoutFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (HTTP {})", self.error, self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Payment workflow timed out; payment state is unknown")]
    PaymentWorkflowTimeout,

    #[error("Checkout rejected: {0}")]
    CheckoutRejected(CheckoutFailure),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) | Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentWorkflowTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::CheckoutRejected(failure) => {
                StatusCode::from_u16(failure.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::ValidationError(_) | Self::InvalidInput(_) => "VALIDATION_ERROR",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ExternalServiceError(_) => "PAYMENT_WORKFLOW_ERROR",
            Self::PaymentWorkflowTimeout => "PAYMENT_WORKFLOW_TIMEOUT",
            Self::CheckoutRejected(failure) => failure.code.as_deref().unwrap_or("CHECKOUT_REJECTED"),
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure came from infrastructure rather than a business rule.
    /// Clients must not present these as "your coupon is invalid".
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::SerializationError(_)
                | Self::ExternalServiceError(_)
                | Self::PaymentWorkflowTimeout
                | Self::InternalError(_)
                | Self::Other(_)
        )
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::CheckoutRejected(failure) => failure.error.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            code: self.code().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
