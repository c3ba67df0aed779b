//! Application layer containing the checkout orchestration.
//!
//! This module defines the `CheckoutOrchestrator`, the state machine that takes
//! a basket from payment-method selection through payment and 3-D Secure to a
//! persisted order, and the `CheckoutState` snapshots it publishes.

pub mod checkout;
pub mod state;
