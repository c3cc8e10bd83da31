//! Client for the order backend's finalize-payment endpoints.
//!
//! The backend materializes exactly one order from a proof of payment. A
//! transport-level 2xx is not enough: the response envelope's own `status`
//! field must be 200 or 201, anything else is a confirmation failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::errors::CheckoutError;
use crate::intent::LineItem;
use crate::proof::PaymentProof;

/// Purchase-specific tail of the finalize request; selects the backend
/// endpoint variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FinalizePayload {
    Cart {
        #[serde(rename = "lineItems")]
        line_items: Vec<WireLineItem>,
    },
    Product {
        #[serde(rename = "productId")]
        product_id: i64,
        quantity: u32,
    },
    Auction {
        #[serde(rename = "auctionId")]
        auction_id: i64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct WireLineItem {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub quantity: u32,
}

impl From<&LineItem> for WireLineItem {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// The single finalize-payment request, proof of payment merged with the
/// shipping details captured before the redirect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub payment_key: String,
    pub provider_order_id: String,
    pub amount: i64,
    pub receiver_name: String,
    pub phone: String,
    pub delivery_address: String,
    /// Fixed by the provider integration; only card payments reach this
    /// flow.
    pub payment_method: &'static str,
    #[serde(flatten)]
    pub payload: FinalizePayload,
}

impl FinalizeRequest {
    pub fn new(
        proof: &PaymentProof,
        shipping: &crate::intent::ShippingInfo,
        payload: FinalizePayload,
    ) -> Self {
        Self {
            payment_key: proof.payment_key.clone(),
            provider_order_id: proof.provider_order_id.clone(),
            amount: proof.amount,
            receiver_name: shipping.receiver_name.clone(),
            phone: shipping.phone.clone(),
            delivery_address: shipping.address.clone(),
            payment_method: "CARD",
            payload,
        }
    }
}

/// Backend response envelope. Success is signaled solely by `status` being
/// 200 or 201 with an order id in `data`.
#[derive(Debug, Deserialize)]
pub struct BackendEnvelope {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl BackendEnvelope {
    pub fn order_id(&self) -> Option<i64> {
        match &self.data {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Outcome of a successful finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfirmationResult {
    pub order_id: i64,
}

/// The one backend call that materializes an order from proof of payment.
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn finalize(&self, request: &FinalizeRequest)
        -> Result<ConfirmationResult, CheckoutError>;
}

/// HTTP implementation posting to the order backend.
pub struct HttpOrderClient {
    client: reqwest::Client,
    base_url: String,
    /// Bearer token identifying the customer; passed in explicitly rather
    /// than read from ambient auth state.
    access_token: Option<String>,
}

impl HttpOrderClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn endpoint(&self, payload: &FinalizePayload) -> String {
        match payload {
            FinalizePayload::Cart { .. } => format!("{}/payments/cart", self.base_url),
            FinalizePayload::Product { .. } | FinalizePayload::Auction { .. } => {
                format!("{}/payments", self.base_url)
            }
        }
    }
}

#[async_trait]
impl OrderClient for HttpOrderClient {
    #[instrument(skip(self, request), fields(provider_order_id = %request.provider_order_id))]
    async fn finalize(
        &self,
        request: &FinalizeRequest,
    ) -> Result<ConfirmationResult, CheckoutError> {
        let url = self.endpoint(&request.payload);
        let mut call = self.client.post(&url).json(request);
        if let Some(token) = &self.access_token {
            call = call.bearer_auth(token);
        }

        let response = call.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "finalize call failed to reach backend");
            CheckoutError::ConfirmationFailed(format!("backend unreachable: {}", e))
        })?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(CheckoutError::ConfirmationFailed(format!(
                "backend returned HTTP {}",
                http_status
            )));
        }

        let envelope: BackendEnvelope = response.json().await.map_err(|e| {
            CheckoutError::ConfirmationFailed(format!("unreadable backend response: {}", e))
        })?;

        match (envelope.status, envelope.order_id()) {
            (200 | 201, Some(order_id)) => {
                info!(order_id, "backend confirmed order creation");
                Ok(ConfirmationResult { order_id })
            }
            (200 | 201, None) => Err(CheckoutError::ConfirmationFailed(
                "backend reported success without an order id".to_string(),
            )),
            (status, _) => Err(CheckoutError::ConfirmationFailed(
                envelope
                    .message
                    .unwrap_or_else(|| format!("backend rejected payment (status {})", status)),
            )),
        }
    }
}
