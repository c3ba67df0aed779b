use super::basket::{Basket, LineItem, Totals};
use super::money::Money;
use super::payment::{BillingAddress, PaymentMethodKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Success,
    /// Paid in part; the deferred remainder is still owed.
    PaymentPending,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Succeeded,
    /// Nothing was due at checkout, so no charge was made.
    NotRequired,
    Failed,
}

/// What the orchestrator knows about a completed charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_intent_id: Option<String>,
    pub payment_method_id: String,
    pub payment_method_kind: PaymentMethodKind,
    pub amount_charged: Money,
    pub transaction_status: TransactionStatus,
    pub billing_address: Option<BillingAddress>,
}

/// A persisted purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    pub payment_method_id: String,
    pub payment_method_kind: PaymentMethodKind,
    pub payment_intent_id: Option<String>,
    pub transaction_status: TransactionStatus,
    pub billing_address: Option<BillingAddress>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order for a basket snapshot that has just been paid for.
    pub fn from_checkout(basket: &Basket, confirmation: &PaymentConfirmation) -> Self {
        let totals = *basket.totals();
        let status = if totals.pay_later.is_positive() {
            OrderStatus::PaymentPending
        } else {
            OrderStatus::Success
        };

        Self {
            id: Uuid::new_v4(),
            items: basket.items().to_vec(),
            totals,
            promo_code: basket.promo_code().map(str::to_string),
            status,
            payment_method_id: confirmation.payment_method_id.clone(),
            payment_method_kind: confirmation.payment_method_kind,
            payment_intent_id: confirmation.payment_intent_id.clone(),
            transaction_status: confirmation.transaction_status,
            billing_address: confirmation.billing_address.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }
}
