//! Validates a purchase and persists its checkout intent before the
//! provider redirect.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::deadline::DeadlineGuard;
use crate::errors::CheckoutError;
use crate::events::{Event, EventSender};
use crate::intent::{CheckoutIntent, CheckoutScope, IntentStore, LineItem, ShippingInfo};

/// Everything the caller needs to open the payment provider. Returned only
/// after the intent write has completed, so the redirect can never outrun
/// persistence.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutHandoff {
    pub scope: CheckoutScope,
    /// Reference handed to the provider; comes back as its `orderId` on
    /// the return leg and correlates the callback with the intent.
    pub provider_order_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Service writing checkout intents. One instance is shared across
/// handlers; per-purchase state lives entirely in the store.
#[derive(Clone)]
pub struct CheckoutIntentBuilder {
    store: Arc<dyn IntentStore>,
    events: EventSender,
}

impl CheckoutIntentBuilder {
    pub fn new(store: Arc<dyn IntentStore>, events: EventSender) -> Self {
        Self { store, events }
    }

    /// Begin a multi-item cart checkout.
    #[instrument(skip(self, shipping))]
    pub async fn begin_cart_checkout(
        &self,
        line_items: Vec<LineItem>,
        shipping: ShippingInfo,
    ) -> Result<CheckoutHandoff, CheckoutError> {
        if line_items.is_empty() {
            return Err(CheckoutError::Validation(
                "cart checkout requires at least one line item".to_string(),
            ));
        }
        validate_line_items(&line_items)?;
        validate_shipping(&shipping)?;

        self.persist(CheckoutIntent::cart(line_items, shipping)).await
    }

    /// Begin a single-product purchase.
    #[instrument(skip(self, shipping))]
    pub async fn begin_product_checkout(
        &self,
        product_id: i64,
        quantity: u32,
        shipping: ShippingInfo,
    ) -> Result<CheckoutHandoff, CheckoutError> {
        if quantity == 0 {
            return Err(CheckoutError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        validate_shipping(&shipping)?;

        self.persist(CheckoutIntent::direct_product(product_id, quantity, shipping))
            .await
    }

    /// Begin payment for an auction win. The deadline guard is consulted
    /// before anything is written: an elapsed payment window means no
    /// intent ever exists for the scope.
    #[instrument(skip(self, shipping))]
    pub async fn begin_auction_checkout(
        &self,
        auction_id: i64,
        shipping: ShippingInfo,
        payment_deadline: Option<DateTime<Utc>>,
    ) -> Result<CheckoutHandoff, CheckoutError> {
        let guard = DeadlineGuard::new(payment_deadline);
        if guard.is_expired(Utc::now()) {
            return Err(CheckoutError::DeadlineExpired);
        }
        validate_shipping(&shipping)?;

        self.persist(CheckoutIntent::auction_win(auction_id, shipping))
            .await
    }

    /// Write the intent and only then produce the handoff. A failed write
    /// aborts checkout before any redirect data exists.
    async fn persist(&self, intent: CheckoutIntent) -> Result<CheckoutHandoff, CheckoutError> {
        let scope = intent.scope.clone();
        let provider_order_ref = intent.provider_order_ref.clone();
        let created_at = intent.created_at;
        self.store.put(&intent).await?;

        self.events
            .send(Event::CheckoutStarted {
                scope: scope.clone(),
            })
            .await;
        info!(scope = %scope, "checkout intent persisted");

        Ok(CheckoutHandoff {
            provider_order_ref,
            scope,
            created_at,
        })
    }
}

fn validate_line_items(items: &[LineItem]) -> Result<(), CheckoutError> {
    if items.iter().any(|item| item.quantity == 0) {
        return Err(CheckoutError::Validation(
            "every line item needs a quantity of at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_shipping(shipping: &ShippingInfo) -> Result<(), CheckoutError> {
    let fields = [
        ("receiver_name", &shipping.receiver_name),
        ("phone", &shipping.phone),
        ("address", &shipping.address),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(CheckoutError::Validation(format!(
                "shipping field {} must not be empty",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::InMemoryIntentStore;
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn builder() -> (CheckoutIntentBuilder, Arc<InMemoryIntentStore>) {
        let store = Arc::new(InMemoryIntentStore::new());
        let (tx, _rx) = mpsc::channel(16);
        (
            CheckoutIntentBuilder::new(store.clone(), EventSender::new(tx)),
            store,
        )
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            receiver_name: "Jordan Lee".to_string(),
            phone: "010-1234-5678".to_string(),
            address: "12 Harbor Way".to_string(),
        }
    }

    #[tokio::test]
    async fn cart_checkout_persists_intent_before_handoff() {
        let (builder, store) = builder();
        let handoff = builder
            .begin_cart_checkout(
                vec![LineItem {
                    product_id: 7,
                    quantity: 2,
                }],
                shipping(),
            )
            .await
            .unwrap();

        assert_eq!(handoff.scope, CheckoutScope::Cart);
        assert!(handoff.provider_order_ref.starts_with("cart-"));
        assert!(store.exists(&CheckoutScope::Cart).await.unwrap());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_without_writing() {
        let (builder, store) = builder();
        let err = builder
            .begin_cart_checkout(vec![], shipping())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "VALIDATION_ERROR");
        assert!(!store.exists(&CheckoutScope::Cart).await.unwrap());
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let (builder, _) = builder();
        let err = builder
            .begin_product_checkout(5, 0, shipping())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn blank_shipping_field_is_rejected() {
        let (builder, _) = builder();
        let mut bad = shipping();
        bad.address = "   ".to_string();
        let err = builder
            .begin_product_checkout(5, 1, bad)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn expired_auction_deadline_writes_nothing() {
        let (builder, store) = builder();
        let err = builder
            .begin_auction_checkout(31, shipping(), Some(Utc::now() - Duration::seconds(1)))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "DEADLINE_EXPIRED");
        assert!(!store.exists(&CheckoutScope::Auction(31)).await.unwrap());
    }

    #[tokio::test]
    async fn live_auction_deadline_persists_intent() {
        let (builder, store) = builder();
        let handoff = builder
            .begin_auction_checkout(31, shipping(), Some(Utc::now() + Duration::minutes(10)))
            .await
            .unwrap();
        assert_eq!(handoff.scope, CheckoutScope::Auction(31));
        assert!(store.exists(&CheckoutScope::Auction(31)).await.unwrap());
    }

    #[tokio::test]
    async fn auction_without_deadline_is_accepted() {
        let (builder, store) = builder();
        builder
            .begin_auction_checkout(8, shipping(), None)
            .await
            .unwrap();
        assert!(store.exists(&CheckoutScope::Auction(8)).await.unwrap());
    }

    #[tokio::test]
    async fn handoff_reference_matches_the_stored_intent() {
        let (builder, store) = builder();
        let handoff = builder
            .begin_product_checkout(9, 1, shipping())
            .await
            .unwrap();
        let intent = store
            .get(&CheckoutScope::Product(9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handoff.provider_order_ref, intent.provider_order_ref);
    }

    /// Store double whose writes always fail, standing in for an
    /// unavailable or full backing store.
    struct BrokenIntentStore;

    #[async_trait::async_trait]
    impl crate::intent::IntentStore for BrokenIntentStore {
        async fn put(&self, _intent: &CheckoutIntent) -> Result<(), CheckoutError> {
            Err(CheckoutError::PersistFailed(
                "storage quota exceeded".to_string(),
            ))
        }

        async fn get(
            &self,
            _scope: &CheckoutScope,
        ) -> Result<Option<CheckoutIntent>, CheckoutError> {
            Ok(None)
        }

        async fn delete(&self, _scope: &CheckoutScope) -> Result<(), CheckoutError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_persistence_aborts_checkout_before_any_handoff() {
        let (tx, _rx) = mpsc::channel(16);
        let builder = CheckoutIntentBuilder::new(Arc::new(BrokenIntentStore), EventSender::new(tx));

        let err = builder
            .begin_cart_checkout(
                vec![LineItem {
                    product_id: 7,
                    quantity: 2,
                }],
                shipping(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "PERSIST_FAILED");
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
