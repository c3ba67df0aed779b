use crate::domain::basket::Basket;
use crate::domain::order::{Order, OrderStatus, PaymentConfirmation};
use crate::domain::ports::OrderRepository;
use crate::domain::promo::{PromoDiscount, PromoValidation, normalize_code};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory order repository.
///
/// Uses `Arc<RwLock<HashMap<..>>>` for orders and promo codes so clones share
/// the same data. Ideal for testing and the demo binary.
#[derive(Default, Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    promo_codes: Arc<RwLock<HashMap<String, PromoDiscount>>>,
}

impl InMemoryOrderRepository {
    /// Creates a new, empty in-memory order repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a promo code. Codes are matched case-insensitively.
    pub async fn add_promo_code(&self, code: &str, discount: PromoDiscount) {
        let mut promo_codes = self.promo_codes.write().await;
        promo_codes.insert(normalize_code(code), discount);
    }

    pub async fn orders(&self) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by_key(|order| order.created_at);
        all
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(
        &self,
        basket: &Basket,
        confirmation: &PaymentConfirmation,
    ) -> Result<Order> {
        let order = Order::from_checkout(basket, confirmation);
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn validate_promo_code(&self, code: &str) -> Result<PromoValidation> {
        let promo_codes = self.promo_codes.read().await;
        promo_codes
            .get(&normalize_code(code))
            .map(|discount| PromoValidation {
                valid: true,
                discount: *discount,
            })
            .ok_or_else(|| CheckoutError::InvalidPromoCode(code.to_string()))
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| CheckoutError::Storage(format!("order {} not found", order_id)))?;
        order.status = status;
        Ok(order.clone())
    }
}
