use crate::domain::payment::{
    BillingAddress, CardDetails, ChargeRequest, PaymentMethod, PaymentResult, StepUpOutcome,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Card number the simulated gateway always declines.
pub const DECLINED_CARD_NUMBER: &str = "4000000000000002";

#[derive(Default)]
struct Script {
    saved_methods: Vec<PaymentMethod>,
    list_failures: usize,
    confirm_responses: VecDeque<Result<PaymentResult>>,
    step_up_responses: VecDeque<Result<StepUpOutcome>>,
    charges: Vec<ChargeRequest>,
    step_up_secrets: Vec<String>,
    issued: u32,
}

impl Script {
    fn next_id(&mut self, prefix: &str) -> String {
        self.issued += 1;
        format!("{}_{:04}", prefix, self.issued)
    }
}

/// A deterministic payment gateway.
///
/// Answers come from queues filled by the caller; when a queue is empty the
/// gateway approves. Every charge request is recorded so callers can inspect
/// amounts and idempotency keys. Clones share the same script.
#[derive(Default, Clone)]
pub struct ScriptedPaymentGateway {
    script: Arc<Mutex<Script>>,
    latency: Duration,
}

impl ScriptedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saved_methods(methods: Vec<PaymentMethod>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                saved_methods: methods,
                ..Default::default()
            })),
            latency: Duration::ZERO,
        }
    }

    /// Delays every answer, to keep calls in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the next `count` payment-method listings fail in transit.
    pub async fn fail_next_listings(&self, count: usize) {
        self.script.lock().await.list_failures = count;
    }

    pub async fn push_confirm(&self, response: Result<PaymentResult>) {
        self.script.lock().await.confirm_responses.push_back(response);
    }

    pub async fn push_step_up(&self, response: Result<StepUpOutcome>) {
        self.script.lock().await.step_up_responses.push_back(response);
    }

    /// Every charge request received, in order.
    pub async fn charges(&self) -> Vec<ChargeRequest> {
        self.script.lock().await.charges.clone()
    }

    /// Every client secret passed to `confirm_step_up`, in order.
    pub async fn step_up_secrets(&self) -> Vec<String> {
        self.script.lock().await.step_up_secrets.clone()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// A saved Visa card as the gateway would list it.
pub fn saved_visa(id: &str, last4: &str, is_default: bool) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        brand: "visa".to_string(),
        last4: last4.to_string(),
        exp_month: 12,
        exp_year: 2099,
        is_default,
        billing_address: None,
    }
}

fn brand_of(digits: &str) -> &'static str {
    match digits.chars().next() {
        Some('4') => "visa",
        Some('5') => "mastercard",
        Some('3') => "amex",
        _ => "unknown",
    }
}

#[async_trait]
impl PaymentGateway for ScriptedPaymentGateway {
    async fn list_payment_methods(&self, customer_ref: &str) -> Result<Vec<PaymentMethod>> {
        self.delay().await;
        let mut script = self.script.lock().await;
        if script.list_failures > 0 {
            script.list_failures -= 1;
            return Err(CheckoutError::Network(
                "connection reset while listing payment methods".into(),
            ));
        }
        debug!(customer = customer_ref, count = script.saved_methods.len(), "Listing saved methods");
        Ok(script.saved_methods.clone())
    }

    async fn create_payment_method(
        &self,
        card: &CardDetails,
        billing: &BillingAddress,
    ) -> Result<PaymentMethod> {
        self.delay().await;
        let digits = card.digits();
        if digits == DECLINED_CARD_NUMBER {
            return Err(CheckoutError::declined(
                "CARD_DECLINED",
                "Your card was declined.",
            ));
        }

        let mut script = self.script.lock().await;
        let method = PaymentMethod {
            id: script.next_id("pm"),
            brand: brand_of(&digits).to_string(),
            last4: digits
                .chars()
                .skip(digits.chars().count().saturating_sub(4))
                .collect(),
            exp_month: card.exp_month.unwrap_or_default(),
            exp_year: card.exp_year.unwrap_or_default(),
            is_default: false,
            billing_address: Some(billing.clone()),
        };
        script.saved_methods.push(method.clone());
        Ok(method)
    }

    async fn confirm_payment(&self, request: &ChargeRequest) -> Result<PaymentResult> {
        self.delay().await;
        let mut script = self.script.lock().await;
        script.charges.push(request.clone());
        match script.confirm_responses.pop_front() {
            Some(response) => response,
            None => Ok(PaymentResult::succeeded(script.next_id("pi"))),
        }
    }

    async fn confirm_step_up(&self, client_secret: &str) -> Result<StepUpOutcome> {
        self.delay().await;
        let mut script = self.script.lock().await;
        script.step_up_secrets.push(client_secret.to_string());
        match script.step_up_responses.pop_front() {
            Some(response) => response,
            None => Ok(StepUpOutcome::Authenticated(PaymentResult::succeeded(
                script.next_id("pi"),
            ))),
        }
    }
}
