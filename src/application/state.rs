use crate::domain::basket::Basket;
use crate::domain::order::Order;
use crate::domain::payment::{BillingAddress, PaymentMethod};
use crate::error::CheckoutFailure;
use serde::Serialize;
use uuid::Uuid;

/// Working state of one checkout attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutSession {
    pub id: Uuid,
    /// The basket as of the last transition.
    pub basket: Basket,
    pub available_payment_methods: Vec<PaymentMethod>,
    pub selected_payment_method: Option<PaymentMethod>,
    pub billing_address: Option<BillingAddress>,
    pub current_step: u8,
    pub total_steps: u8,
    pub is_processing: bool,
    pub error: Option<CheckoutFailure>,
    /// Set while a 3-D Secure challenge is outstanding.
    pub client_secret: Option<String>,
}

impl CheckoutSession {
    pub(crate) fn new(basket: Basket, methods: Vec<PaymentMethod>, total_steps: u8) -> Self {
        let selected_payment_method = methods.iter().find(|method| method.is_default).cloned();
        Self {
            id: Uuid::new_v4(),
            basket,
            available_payment_methods: methods,
            selected_payment_method,
            billing_address: None,
            current_step: 1,
            total_steps,
            is_processing: false,
            error: None,
            client_secret: None,
        }
    }

    pub fn requires_step_up(&self) -> bool {
        self.client_secret.is_some()
    }

    pub(crate) fn next_step(&mut self) -> u8 {
        self.current_step = self.current_step.saturating_add(1).min(self.total_steps);
        self.current_step
    }

    pub(crate) fn previous_step(&mut self) -> u8 {
        self.current_step = self.current_step.saturating_sub(1).max(1);
        self.current_step
    }

    pub(crate) fn go_to_step(&mut self, step: u8) {
        self.current_step = step.clamp(1, self.total_steps);
    }
}

/// The single observable snapshot of a checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum CheckoutState {
    Initial,
    Loading,
    Loaded(CheckoutSession),
    Processing,
    Error(CheckoutFailure),
    Success(Order),
}

impl CheckoutState {
    /// `Success` and `Error` end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_navigation_clamps() {
        let mut session = CheckoutSession::new(Basket::new(), vec![], 3);
        assert_eq!(session.previous_step(), 1);
        assert_eq!(session.next_step(), 2);
        assert_eq!(session.next_step(), 3);
        assert_eq!(session.next_step(), 3);
        session.go_to_step(0);
        assert_eq!(session.current_step, 1);
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let json = serde_json::to_value(CheckoutState::Processing).unwrap();
        assert_eq!(json["status"], "processing");
    }
}
