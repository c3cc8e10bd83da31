//! Lifecycle events emitted by the checkout saga.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::intent::CheckoutScope;

/// Events that can occur as a checkout moves through the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// An intent was persisted and the user is being handed to the
    /// payment provider.
    CheckoutStarted { scope: CheckoutScope },
    /// The backend confirmed order creation; the intent is gone.
    OrderConfirmed {
        scope: CheckoutScope,
        order_id: i64,
    },
    /// A confirmation attempt ended in a failure state.
    ConfirmationFailed {
        scope: CheckoutScope,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the receiver has
    /// shut down: event delivery is observability, never control flow.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("failed to deliver checkout event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime of
/// the service.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::CheckoutStarted { scope } => {
                info!(scope = %scope, "checkout started");
            }
            Event::OrderConfirmed { scope, order_id } => {
                info!(scope = %scope, order_id, "order confirmed");
            }
            Event::ConfirmationFailed { scope, reason } => {
                warn!(scope = %scope, reason = %reason, "confirmation failed");
            }
        }
    }
    info!("event channel closed; event processor exiting");
}
