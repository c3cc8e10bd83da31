//! The checkout-to-payment confirmation saga.
//!
//! `builder` records durable checkout intent before the provider redirect;
//! `confirmation` consumes the provider's return leg and drives the single
//! finalizing backend call to a terminal state.

pub mod builder;
pub mod confirmation;

pub use builder::{CheckoutHandoff, CheckoutIntentBuilder};
pub use confirmation::{ConfirmationExecutor, ConfirmationState, InFlightScopes};
