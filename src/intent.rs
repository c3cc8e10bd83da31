//! Durable checkout intent records.
//!
//! An intent is written under its scope key immediately before the user is
//! handed off to the payment provider, and read back on the return leg. The
//! store invariant: an intent exists for a scope iff a redirect for that
//! scope was initiated and has not yet been confirmed. Deletion happens in
//! exactly one place, after the backend confirms order creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::CheckoutError;

/// Prefix keeping intent records apart from any other keys sharing the
/// same backing store.
const KEY_PREFIX: &str = "checkout_intent";

/// Identifies one independent checkout. Two unrelated checkouts (the cart
/// vs. a specific auction win) map to distinct scopes and never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CheckoutScope {
    Cart,
    Product(i64),
    Auction(i64),
}

impl CheckoutScope {
    /// Storage key for this scope, `"checkout_intent_<scope>"`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", KEY_PREFIX, self)
    }
}

impl fmt::Display for CheckoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutScope::Cart => write!(f, "cart"),
            CheckoutScope::Product(id) => write!(f, "product_{}", id),
            CheckoutScope::Auction(id) => write!(f, "auction_{}", id),
        }
    }
}

/// How the goods being paid for were acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Cart,
    DirectProduct,
    AuctionWin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    pub quantity: u32,
}

/// Delivery details captured before the redirect so the user never has to
/// re-enter them after a failed confirmation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub receiver_name: String,
    pub phone: String,
    pub address: String,
}

/// The durable pre-redirect record of what is being bought and where it
/// ships. `created_at` is diagnostic only; expiry for auction wins is
/// enforced by the deadline guard before an intent is ever written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutIntent {
    pub scope: CheckoutScope,
    pub kind: IntentKind,
    pub line_items: Vec<LineItem>,
    pub shipping: ShippingInfo,
    /// Reference handed to the payment provider at checkout. The provider
    /// echoes it back as `orderId` on the return leg, tying the callback
    /// to exactly this intent.
    pub provider_order_ref: String,
    pub created_at: DateTime<Utc>,
}

impl CheckoutIntent {
    pub fn cart(line_items: Vec<LineItem>, shipping: ShippingInfo) -> Self {
        Self::new(CheckoutScope::Cart, IntentKind::Cart, line_items, shipping)
    }

    pub fn direct_product(product_id: i64, quantity: u32, shipping: ShippingInfo) -> Self {
        Self::new(
            CheckoutScope::Product(product_id),
            IntentKind::DirectProduct,
            vec![LineItem {
                product_id,
                quantity,
            }],
            shipping,
        )
    }

    pub fn auction_win(auction_id: i64, shipping: ShippingInfo) -> Self {
        Self::new(
            CheckoutScope::Auction(auction_id),
            IntentKind::AuctionWin,
            Vec::new(),
            shipping,
        )
    }

    fn new(
        scope: CheckoutScope,
        kind: IntentKind,
        line_items: Vec<LineItem>,
        shipping: ShippingInfo,
    ) -> Self {
        Self {
            provider_order_ref: format!("{}-{}", scope, Uuid::new_v4()),
            scope,
            kind,
            line_items,
            shipping,
            created_at: Utc::now(),
        }
    }
}

/// Session-scoped key/value persistence for checkout intents.
///
/// The in-memory implementation below is the default backend; the trait
/// keeps an external store (Redis or similar) pluggable without touching
/// the saga code.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Persist the intent under its scope key, replacing any previous
    /// record for the same scope. The returned future resolves only once
    /// the write is durable; callers must await it before handing off to
    /// the payment provider.
    async fn put(&self, intent: &CheckoutIntent) -> Result<(), CheckoutError>;

    /// Read the intent for a scope, if one exists.
    async fn get(&self, scope: &CheckoutScope) -> Result<Option<CheckoutIntent>, CheckoutError>;

    /// Remove the intent for a scope. Removing an absent key is not an
    /// error.
    async fn delete(&self, scope: &CheckoutScope) -> Result<(), CheckoutError>;

    async fn exists(&self, scope: &CheckoutScope) -> Result<bool, CheckoutError> {
        Ok(self.get(scope).await?.is_some())
    }
}

/// In-memory intent store over a concurrent map. Entries are JSON so the
/// backend contract matches a string-valued external store one-to-one.
#[derive(Debug, Default)]
pub struct InMemoryIntentStore {
    entries: DashMap<String, String>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn put(&self, intent: &CheckoutIntent) -> Result<(), CheckoutError> {
        let payload = serde_json::to_string(intent)
            .map_err(|e| CheckoutError::PersistFailed(e.to_string()))?;
        self.entries.insert(intent.scope.storage_key(), payload);
        Ok(())
    }

    async fn get(&self, scope: &CheckoutScope) -> Result<Option<CheckoutIntent>, CheckoutError> {
        match self.entries.get(&scope.storage_key()) {
            Some(entry) => {
                // An unparseable record is as good as no record: the saga
                // reports SESSION_EXPIRED rather than surfacing a decode
                // error for state the user cannot fix.
                match serde_json::from_str(entry.value()) {
                    Ok(intent) => Ok(Some(intent)),
                    Err(e) => {
                        tracing::warn!(scope = %scope, error = %e, "discarding unparseable checkout intent");
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, scope: &CheckoutScope) -> Result<(), CheckoutError> {
        self.entries.remove(&scope.storage_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            receiver_name: "Jordan Lee".to_string(),
            phone: "010-1234-5678".to_string(),
            address: "12 Harbor Way".to_string(),
        }
    }

    #[test]
    fn storage_keys_do_not_collide_across_scopes() {
        assert_eq!(CheckoutScope::Cart.storage_key(), "checkout_intent_cart");
        assert_eq!(
            CheckoutScope::Auction(42).storage_key(),
            "checkout_intent_auction_42"
        );
        assert_eq!(
            CheckoutScope::Product(42).storage_key(),
            "checkout_intent_product_42"
        );
        assert_ne!(
            CheckoutScope::Auction(42).storage_key(),
            CheckoutScope::Product(42).storage_key()
        );
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemoryIntentStore::new();
        let intent = CheckoutIntent::cart(
            vec![LineItem {
                product_id: 7,
                quantity: 2,
            }],
            shipping(),
        );

        store.put(&intent).await.unwrap();
        let loaded = store.get(&CheckoutScope::Cart).await.unwrap().unwrap();
        assert_eq!(loaded.kind, IntentKind::Cart);
        assert_eq!(loaded.line_items, intent.line_items);
        assert_eq!(loaded.shipping, intent.shipping);
        assert_eq!(loaded.provider_order_ref, intent.provider_order_ref);
        assert!(loaded.provider_order_ref.starts_with("cart-"));

        store.delete(&CheckoutScope::Cart).await.unwrap();
        assert!(store.get(&CheckoutScope::Cart).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let store = InMemoryIntentStore::new();
        store
            .put(&CheckoutIntent::auction_win(1, shipping()))
            .await
            .unwrap();
        store
            .put(&CheckoutIntent::auction_win(2, shipping()))
            .await
            .unwrap();

        store.delete(&CheckoutScope::Auction(1)).await.unwrap();
        assert!(store
            .get(&CheckoutScope::Auction(1))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get(&CheckoutScope::Auction(2))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn unparseable_record_reads_as_absent() {
        let store = InMemoryIntentStore::new();
        store.entries.insert(
            CheckoutScope::Cart.storage_key(),
            "{not json".to_string(),
        );
        assert!(store.get(&CheckoutScope::Cart).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_of_absent_key_is_a_no_op() {
        let store = InMemoryIntentStore::new();
        store.delete(&CheckoutScope::Product(9)).await.unwrap();
    }
}
