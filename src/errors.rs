use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Gone")
    pub error: String,
    /// Machine-readable reason code (e.g., "SESSION_EXPIRED")
    pub reason: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error taxonomy of the checkout-to-confirmation saga.
///
/// Every variant is terminal to the current attempt; the service never
/// retries on the caller's behalf. Whether the stored intent survives the
/// failure is part of each variant's contract (see `preserves_intent`).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum CheckoutError {
    /// The provider's return callback is missing or malformed. The saga
    /// never reaches the backend; checkout must be restarted.
    #[error("Invalid payment callback: {0}")]
    InvalidCallback(String),

    /// No checkout intent found for the scope: expired, already consumed,
    /// or never written. Checkout must be restarted.
    #[error("Checkout session expired or already completed")]
    SessionExpired,

    /// The backend rejected the finalize call or was unreachable. The
    /// intent is preserved so the user can retry the payment redirect.
    #[error("Payment confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// The payment window for an auction win elapsed before checkout
    /// started. No intent is ever written.
    #[error("Payment deadline has passed")]
    DeadlineExpired,

    /// The intent could not be durably written; checkout is aborted
    /// before any redirect occurs.
    #[error("Failed to persist checkout intent: {0}")]
    PersistFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for CheckoutError {
    fn from(err: validator::ValidationErrors) -> Self {
        CheckoutError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Internal(format!("serialization error: {}", err))
    }
}

impl CheckoutError {
    /// Machine-readable reason code surfaced in error responses and events.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCallback(_) => "INVALID_CALLBACK",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::ConfirmationFailed(_) => "CONFIRMATION_FAILED",
            Self::DeadlineExpired => "DEADLINE_EXPIRED",
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the stored intent survives this failure, i.e. the user can
    /// retry the provider redirect without re-entering shipping details.
    pub fn preserves_intent(&self) -> bool {
        matches!(self, Self::ConfirmationFailed(_))
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCallback(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::SessionExpired | Self::DeadlineExpired => StatusCode::GONE,
            Self::ConfirmationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::PersistFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal faults return a
    /// generic message to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            reason: self.reason().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
