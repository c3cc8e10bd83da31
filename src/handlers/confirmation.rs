//! Return-leg endpoints: the payment provider redirects the user back
//! here with its proof-of-payment query parameters.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::checkout::{ConfirmationExecutor, ConfirmationState};
use crate::intent::CheckoutScope;
use crate::proof::ReturnParams;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cart/confirm", get(confirm_cart))
        .route("/products/:product_id/confirm", get(confirm_product))
        .route("/auctions/:auction_id/confirm", get(confirm_auction))
}

async fn confirm_cart(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReturnParams>,
) -> Response {
    confirm(&state, CheckoutScope::Cart, params).await
}

async fn confirm_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(params): Query<ReturnParams>,
) -> Response {
    confirm(&state, CheckoutScope::Product(product_id), params).await
}

async fn confirm_auction(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<i64>,
    Query(params): Query<ReturnParams>,
) -> Response {
    confirm(&state, CheckoutScope::Auction(auction_id), params).await
}

/// One executor per request: the request is the "page load" whose
/// at-most-once contract the executor enforces. The shared in-flight
/// registry serializes concurrent requests on one scope, and replayed
/// return URLs are handled by the store (the intent is gone after
/// success).
async fn confirm(state: &AppState, scope: CheckoutScope, params: ReturnParams) -> Response {
    let executor = ConfirmationExecutor::new(
        state.intent_store.clone(),
        state.order_client.clone(),
        state.event_sender.clone(),
        state.in_flight.clone(),
    );
    let outcome = executor.run(scope, &params).await;

    let status = match &outcome {
        ConfirmationState::Success { .. } => StatusCode::OK,
        ConfirmationState::Processing => StatusCode::ACCEPTED,
        ConfirmationState::Failed { reason, .. } => failure_status(reason),
    };
    (status, Json(outcome)).into_response()
}

fn failure_status(reason: &str) -> StatusCode {
    match reason {
        "INVALID_CALLBACK" => StatusCode::BAD_REQUEST,
        "SESSION_EXPIRED" => StatusCode::GONE,
        "CONFIRMATION_FAILED" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
