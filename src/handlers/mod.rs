use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::errors::CheckoutError;
use crate::AppState;

pub mod checkout;
pub mod confirmation;

/// All checkout saga routes, nested under `/api/v1` by the caller.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/checkout",
        checkout::routes().merge(confirmation::routes()),
    )
}

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), CheckoutError> {
    input
        .validate()
        .map_err(|e| CheckoutError::Validation(e.to_string()))
}
