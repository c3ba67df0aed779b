use crate::domain::basket::Basket;
use crate::domain::order::{Order, OrderStatus, PaymentConfirmation};
use crate::domain::ports::OrderRepository;
use crate::domain::promo::{PromoDiscount, PromoValidation, normalize_code};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for storing placed orders.
pub const CF_ORDERS: &str = "orders";
/// Column Family for storing promo-code rules.
pub const CF_PROMO_CODES: &str = "promo_codes";

/// A persistent order repository using RocksDB.
///
/// Orders and promo codes live in separate Column Families, both as JSON
/// values. Orders are keyed by the bytes of their UUID, promo codes by the
/// normalized code.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbOrderRepository {
    db: Arc<DB>,
}

fn storage_error(context: &str, err: impl std::fmt::Display) -> CheckoutError {
    CheckoutError::Storage(format!("{}: {}", context, err))
}

impl RocksDbOrderRepository {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("orders" and "promo_codes") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_promo_codes = ColumnFamilyDescriptor::new(CF_PROMO_CODES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_promo_codes])
            .map_err(|e| storage_error("Failed to open RocksDB", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Registers a promo code. Codes are matched case-insensitively.
    pub fn add_promo_code(&self, code: &str, discount: PromoDiscount) -> Result<()> {
        self.put(CF_PROMO_CODES, normalize_code(code).as_bytes(), &discount)
    }

    pub fn all_orders(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| storage_error("RocksDB iteration error", e))?;
            let order: Order = serde_json::from_slice(&value)
                .map_err(|e| storage_error("Failed to deserialize order", e))?;
            orders.push(order);
        }
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CheckoutError::Storage(format!("{} column family not found", name)))
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| storage_error("Serialization error", e))?;
        self.db
            .put_cf(cf, key, bytes)
            .map_err(|e| storage_error("RocksDB write error", e))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let result = self
            .db
            .get_cf(cf, key)
            .map_err(|e| storage_error("RocksDB read error", e))?;

        if let Some(bytes) = result {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| storage_error("Deserialization error", e))?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl OrderRepository for RocksDbOrderRepository {
    async fn create_order(
        &self,
        basket: &Basket,
        confirmation: &PaymentConfirmation,
    ) -> Result<Order> {
        let order = Order::from_checkout(basket, confirmation);
        self.put(CF_ORDERS, order.id.as_bytes(), &order)?;
        Ok(order)
    }

    async fn validate_promo_code(&self, code: &str) -> Result<PromoValidation> {
        let discount: Option<PromoDiscount> =
            self.get(CF_PROMO_CODES, normalize_code(code).as_bytes())?;
        discount
            .map(|discount| PromoValidation {
                valid: true,
                discount,
            })
            .ok_or_else(|| CheckoutError::InvalidPromoCode(code.to_string()))
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        self.get(CF_ORDERS, order_id.as_bytes())
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order: Order = self
            .get(CF_ORDERS, order_id.as_bytes())?
            .ok_or_else(|| CheckoutError::Storage(format!("order {} not found", order_id)))?;
        order.status = status;
        self.put(CF_ORDERS, order.id.as_bytes(), &order)?;
        Ok(order)
    }
}
