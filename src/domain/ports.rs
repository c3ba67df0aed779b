use super::basket::Basket;
use super::order::{Order, OrderStatus, PaymentConfirmation};
use super::payment::{
    BillingAddress, CardDetails, ChargeRequest, PaymentMethod, PaymentResult, StepUpOutcome,
};
use super::promo::PromoValidation;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Remote payment provider: saved methods, payment intents and 3-D Secure.
///
/// Transport failures are reported as `CheckoutError::Network`; card
/// rejections as `CheckoutError::Card`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn list_payment_methods(&self, customer_ref: &str) -> Result<Vec<PaymentMethod>>;
    async fn create_payment_method(
        &self,
        card: &CardDetails,
        billing: &BillingAddress,
    ) -> Result<PaymentMethod>;
    async fn confirm_payment(&self, request: &ChargeRequest) -> Result<PaymentResult>;
    async fn confirm_step_up(&self, client_secret: &str) -> Result<StepUpOutcome>;
}

/// Remote order store, which also owns promo-code rules.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(
        &self,
        basket: &Basket,
        confirmation: &PaymentConfirmation,
    ) -> Result<Order>;
    async fn validate_promo_code(&self, code: &str) -> Result<PromoValidation>;
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type OrderRepositoryRef = Arc<dyn OrderRepository>;
