//! Checkout initiation endpoints: validate the purchase, persist the
//! intent, and hand the caller the data it needs to open the payment
//! provider.

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::deadline::DeadlineGuard;
use crate::errors::CheckoutError;
use crate::handlers::{created_response, success_response, validate_input};
use crate::intent::{LineItem, ShippingInfo};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cart", post(begin_cart_checkout))
        .route("/products/:product_id", post(begin_product_checkout))
        .route("/auctions/:auction_id", post(begin_auction_checkout))
        .route("/auctions/:auction_id/deadline", get(auction_deadline))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingRequest {
    #[validate(length(min = 1))]
    pub receiver_name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub address: String,
}

impl From<ShippingRequest> for ShippingInfo {
    fn from(req: ShippingRequest) -> Self {
        Self {
            receiver_name: req.receiver_name,
            phone: req.phone,
            address: req.address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartCheckoutRequest {
    pub line_items: Vec<LineItemRequest>,
    #[validate]
    pub shipping: ShippingRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductCheckoutRequest {
    pub quantity: u32,
    #[validate]
    pub shipping: ShippingRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AuctionCheckoutRequest {
    #[validate]
    pub shipping: ShippingRequest,
    /// Provider-imposed payment window for the auction win; absent means
    /// no deadline.
    pub payment_deadline: Option<DateTime<Utc>>,
}

async fn begin_cart_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CartCheckoutRequest>,
) -> Result<impl IntoResponse, CheckoutError> {
    validate_input(&payload)?;

    let line_items = payload
        .line_items
        .into_iter()
        .map(|item| LineItem {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let handoff = state
        .builder
        .begin_cart_checkout(line_items, payload.shipping.into())
        .await?;
    Ok(created_response(handoff))
}

async fn begin_product_checkout(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Json(payload): Json<ProductCheckoutRequest>,
) -> Result<impl IntoResponse, CheckoutError> {
    validate_input(&payload)?;

    let handoff = state
        .builder
        .begin_product_checkout(product_id, payload.quantity, payload.shipping.into())
        .await?;
    Ok(created_response(handoff))
}

async fn begin_auction_checkout(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<i64>,
    Json(payload): Json<AuctionCheckoutRequest>,
) -> Result<impl IntoResponse, CheckoutError> {
    validate_input(&payload)?;

    let handoff = state
        .builder
        .begin_auction_checkout(auction_id, payload.shipping.into(), payload.payment_deadline)
        .await?;
    Ok(created_response(handoff))
}

#[derive(Debug, Deserialize)]
struct DeadlineQuery {
    deadline: Option<DateTime<Utc>>,
}

/// Countdown snapshot for the pay page. Pure read; the guard latches
/// nothing across requests since each request constructs its own view of
/// the same deadline.
async fn auction_deadline(
    Path(_auction_id): Path<i64>,
    Query(query): Query<DeadlineQuery>,
) -> impl IntoResponse {
    let guard = DeadlineGuard::new(query.deadline);
    success_response(guard.snapshot(Utc::now()))
}
