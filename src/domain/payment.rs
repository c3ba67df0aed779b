use super::money::Money;
use super::order::Order;
use crate::error::{CheckoutError, Result};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl BillingAddress {
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::CardValidation(format!(
                "billing address is missing {}",
                missing.join(", ")
            )))
        }
    }
}

/// Raw card input as collected by the payment form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: Option<u32>,
    pub exp_year: Option<i32>,
    pub cvc: String,
}

impl CardDetails {
    pub fn digits(&self) -> String {
        self.number.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Checks the card is complete enough to send to the gateway.
    pub fn validate(&self) -> Result<()> {
        let digits = self.digits();
        if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CheckoutError::CardValidation(
                "card number is incomplete".into(),
            ));
        }
        if !luhn_valid(&digits) {
            return Err(CheckoutError::CardValidation("card number is invalid".into()));
        }

        let (Some(month), Some(year)) = (self.exp_month, self.exp_year) else {
            return Err(CheckoutError::CardValidation(
                "expiry date is incomplete".into(),
            ));
        };
        if !(1..=12).contains(&month) {
            return Err(CheckoutError::CardValidation(
                "expiry month is invalid".into(),
            ));
        }
        let today = Utc::now().date_naive();
        if (year, month) < (today.year(), today.month()) {
            return Err(CheckoutError::CardValidation("card has expired".into()));
        }

        if !(3..=4).contains(&self.cvc.len()) || !self.cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(CheckoutError::CardValidation(
                "security code is incomplete".into(),
            ));
        }
        Ok(())
    }
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(index, digit)| {
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

/// A saved payment method, as known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub is_default: bool,
    pub billing_address: Option<BillingAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    #[default]
    Card,
    ApplePay,
    GooglePay,
}

/// Client-generated token that makes a repeated charge request safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the orchestrator asks the gateway to charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: String,
    pub payment_method_id: String,
    pub payment_method_kind: PaymentMethodKind,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    None,
    RequiresStepUp,
}

/// Outcome of a payment confirmation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub order: Option<Order>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub client_secret: Option<String>,
    pub payment_intent_id: Option<String>,
    pub next_action: NextAction,
}

impl PaymentResult {
    pub fn succeeded(payment_intent_id: impl Into<String>) -> Self {
        Self {
            success: true,
            payment_intent_id: Some(payment_intent_id.into()),
            ..Default::default()
        }
    }

    pub fn requires_step_up(
        payment_intent_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_secret: Some(client_secret.into()),
            payment_intent_id: Some(payment_intent_id.into()),
            next_action: NextAction::RequiresStepUp,
            ..Default::default()
        }
    }

    pub fn declined(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            error_code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn requires_step_up_authentication(&self) -> bool {
        self.next_action == NextAction::RequiresStepUp
    }
}

/// Result of a 3-D Secure challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum StepUpOutcome {
    Authenticated(PaymentResult),
    /// The customer abandoned the challenge.
    Cancelled,
}
