//! checkout-api
//!
//! Checkout-to-payment confirmation saga: durably records checkout intent
//! before handing the user to an external payment provider, validates the
//! provider's return callback, and finalizes the order with the backend
//! exactly once.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod checkout;
pub mod client;
pub mod config;
pub mod deadline;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod intent;
pub mod proof;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::checkout::{CheckoutIntentBuilder, InFlightScopes};
use crate::client::OrderClient;
use crate::events::EventSender;
use crate::intent::{CheckoutScope, IntentStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub intent_store: Arc<dyn IntentStore>,
    pub order_client: Arc<dyn OrderClient>,
    pub builder: CheckoutIntentBuilder,
    pub in_flight: Arc<InFlightScopes>,
    pub event_sender: EventSender,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        intent_store: Arc<dyn IntentStore>,
        order_client: Arc<dyn OrderClient>,
        event_sender: EventSender,
    ) -> Self {
        let builder = CheckoutIntentBuilder::new(intent_store.clone(), event_sender.clone());
        Self {
            config,
            intent_store,
            order_client,
            builder,
            in_flight: Arc::new(InFlightScopes::new()),
            event_sender,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    intent_store: &'static str,
}

/// Liveness plus a round trip through the intent store. A store that
/// cannot answer a lookup cannot persist intents either, so the service
/// reports degraded rather than accepting checkouts it would lose.
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.intent_store.exists(&CheckoutScope::Cart).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                service: "checkout-api",
                intent_store: "ok",
            }),
        ),
        Err(e) => {
            tracing::error!("health check failed to reach intent store: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    service: "checkout-api",
                    intent_store: "unreachable",
                }),
            )
        }
    }
}

/// Builds the full application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "checkout-api up" }))
        .route("/health", get(health))
        .nest("/api/v1", handlers::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
