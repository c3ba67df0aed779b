use std::env;
use std::time::Duration;

/// Tunables of the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Number of screens in the checkout flow.
    pub total_steps: u8,
    /// The step on which payment is taken and 3-D Secure is resolved.
    pub payment_step: u8,
    /// ISO currency code sent to the gateway, lowercase.
    pub currency: String,
    /// Upper bound on any single gateway or repository call.
    pub gateway_timeout: Duration,
    /// Retries of one payment confirmation after a network failure.
    pub max_network_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            total_steps: 3,
            payment_step: 3,
            currency: "gbp".to_string(),
            gateway_timeout: Duration::from_secs(30),
            max_network_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let total_steps: u8 = env::var("CHECKOUT_TOTAL_STEPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.total_steps);

        let payment_step: u8 = env::var("CHECKOUT_PAYMENT_STEP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(total_steps);

        let gateway_timeout = env::var("CHECKOUT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.gateway_timeout);

        let max_network_retries: u32 = env::var("CHECKOUT_MAX_NETWORK_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_network_retries);

        let retry_backoff = env::var("CHECKOUT_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);

        Self {
            total_steps,
            payment_step,
            currency: env::var("CHECKOUT_CURRENCY")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.currency),
            gateway_timeout,
            max_network_retries,
            retry_backoff,
        }
        .normalized()
    }

    /// Forces at least one step and keeps the payment step inside the flow.
    pub fn normalized(mut self) -> Self {
        self.total_steps = self.total_steps.max(1);
        self.payment_step = self.payment_step.clamp(1, self.total_steps);
        self
    }
}
