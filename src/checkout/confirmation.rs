//! The confirmation executor: consumes the provider's return leg and
//! finalizes the order with at most one backend call.

use dashmap::DashSet;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::client::{ConfirmationResult, FinalizePayload, FinalizeRequest, OrderClient};
use crate::errors::CheckoutError;
use crate::events::{Event, EventSender};
use crate::intent::{CheckoutIntent, CheckoutScope, IntentKind, IntentStore};
use crate::proof::{PaymentProof, ReturnParams};

/// Terminal-or-pending state of one confirmation attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationState {
    Processing,
    Success {
        order_id: i64,
    },
    Failed {
        reason: String,
        message: String,
        /// Whether the stored intent survived, letting the user retry the
        /// payment redirect without restarting checkout.
        retryable: bool,
    },
}

impl ConfirmationState {
    fn from_error(err: &CheckoutError) -> Self {
        ConfirmationState::Failed {
            reason: err.reason().to_string(),
            message: err.response_message(),
            retryable: err.preserves_intent(),
        }
    }
}

/// Scopes with a confirmation attempt currently in flight.
///
/// Shared across executors: two simultaneous return-leg requests for the
/// same scope would otherwise both read the intent before either deletes
/// it, and finalize twice. The claim is taken before the intent is read
/// and released once the attempt reaches its outcome.
#[derive(Debug, Default)]
pub struct InFlightScopes {
    scopes: DashSet<String>,
}

impl InFlightScopes {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self, scope: &CheckoutScope) -> bool {
        self.scopes.insert(scope.storage_key())
    }

    fn release(&self, scope: &CheckoutScope) {
        self.scopes.remove(&scope.storage_key());
    }
}

/// Drives one confirmation attempt for one scope.
///
/// An executor instance corresponds to a single load of the return page.
/// However often `run` is re-entered within that lifetime, the backend is
/// called at most once: the first caller claims the started flag, later
/// callers observe whatever state the attempt has reached. Across
/// instances the shared [`InFlightScopes`] registry serializes attempts
/// per scope, and replays after success are defused by the store itself,
/// since the intent is gone and step 2 then reports `SESSION_EXPIRED`.
pub struct ConfirmationExecutor {
    store: Arc<dyn IntentStore>,
    client: Arc<dyn OrderClient>,
    events: EventSender,
    in_flight: Arc<InFlightScopes>,
    started: AtomicBool,
    state: Mutex<ConfirmationState>,
}

impl ConfirmationExecutor {
    pub fn new(
        store: Arc<dyn IntentStore>,
        client: Arc<dyn OrderClient>,
        events: EventSender,
        in_flight: Arc<InFlightScopes>,
    ) -> Self {
        Self {
            store,
            client,
            events,
            in_flight,
            started: AtomicBool::new(false),
            state: Mutex::new(ConfirmationState::Processing),
        }
    }

    pub async fn state(&self) -> ConfirmationState {
        self.state.lock().await.clone()
    }

    /// Entry point for the return leg. Returns the state the attempt
    /// reached; re-entry returns the current state without side effects.
    #[instrument(skip(self, params), fields(scope = %scope))]
    pub async fn run(&self, scope: CheckoutScope, params: &ReturnParams) -> ConfirmationState {
        if self.started.swap(true, Ordering::SeqCst) {
            // Duplicate invocation within the same page load: a re-render
            // or a lingering query parameter. Never a second backend call.
            return self.state().await;
        }

        if !self.in_flight.claim(&scope) {
            // Another request holds this scope mid-confirmation. Report
            // the attempt as still processing; its owner will reach the
            // terminal state.
            info!(scope = %scope, "confirmation already in flight for scope");
            return self.state().await;
        }

        let outcome = self.confirm(&scope, params).await;
        self.in_flight.release(&scope);

        let state = match outcome {
            Ok(result) => {
                info!(scope = %scope, order_id = result.order_id, "payment confirmed");
                self.events
                    .send(Event::OrderConfirmed {
                        scope: scope.clone(),
                        order_id: result.order_id,
                    })
                    .await;
                ConfirmationState::Success {
                    order_id: result.order_id,
                }
            }
            Err(err) => {
                warn!(scope = %scope, reason = err.reason(), "confirmation attempt failed: {}", err);
                self.events
                    .send(Event::ConfirmationFailed {
                        scope: scope.clone(),
                        reason: err.reason().to_string(),
                    })
                    .await;
                ConfirmationState::from_error(&err)
            }
        };

        let mut guard = self.state.lock().await;
        *guard = state.clone();
        state
    }

    /// Steps 1-4 of the saga. The intent is deleted in exactly one place,
    /// after the backend acknowledged order creation; every failure path
    /// leaves the store untouched.
    async fn confirm(
        &self,
        scope: &CheckoutScope,
        params: &ReturnParams,
    ) -> Result<ConfirmationResult, CheckoutError> {
        // Step 1: validate the callback before touching anything.
        let proof = PaymentProof::from_params(params)?;

        // Step 2: reconstruct the intent persisted before the redirect.
        let intent = self
            .store
            .get(scope)
            .await?
            .ok_or(CheckoutError::SessionExpired)?;

        // The provider echoes back the reference we handed it at checkout;
        // a callback carrying someone else's reference must not consume
        // this intent.
        if proof.provider_order_id != intent.provider_order_ref {
            return Err(CheckoutError::InvalidCallback(
                "orderId does not belong to this checkout".to_string(),
            ));
        }

        // Step 3: merge proof and intent into the finalize request.
        let payload = finalize_payload(&intent)?;
        let request = FinalizeRequest::new(&proof, &intent.shipping, payload);

        // Step 4: the one finalizing call.
        let result = self.client.finalize(&request).await?;

        if let Err(e) = self.store.delete(scope).await {
            // The order exists; a replayed callback would re-read the
            // intent and double-submit, so the leftover must be visible.
            warn!(scope = %scope, error = %e, "order confirmed but intent cleanup failed");
        }

        Ok(result)
    }
}

/// Selects the backend endpoint variant from the stored intent. An intent
/// whose shape does not match its kind is as unusable as a missing one.
fn finalize_payload(intent: &CheckoutIntent) -> Result<FinalizePayload, CheckoutError> {
    match intent.kind {
        IntentKind::Cart => Ok(FinalizePayload::Cart {
            line_items: intent.line_items.iter().map(Into::into).collect(),
        }),
        IntentKind::DirectProduct => {
            let item = intent
                .line_items
                .first()
                .ok_or(CheckoutError::SessionExpired)?;
            Ok(FinalizePayload::Product {
                product_id: item.product_id,
                quantity: item.quantity,
            })
        }
        IntentKind::AuctionWin => match intent.scope {
            CheckoutScope::Auction(auction_id) => Ok(FinalizePayload::Auction { auction_id }),
            _ => Err(CheckoutError::SessionExpired),
        },
    }
}
