#![allow(dead_code)]

use rust_decimal_macros::dec;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use studio_checkout::application::checkout::CheckoutOrchestrator;
use studio_checkout::config::CheckoutConfig;
use studio_checkout::domain::basket::{Basket, LineItem};
use studio_checkout::domain::money::Money;
use studio_checkout::domain::promo::PromoDiscount;
use studio_checkout::infrastructure::in_memory::InMemoryOrderRepository;
use studio_checkout::infrastructure::simulated::{ScriptedPaymentGateway, saved_visa};

pub const SAVED_CARD: &str = "pm_saved_visa";

/// A basket holding one £45 ballet course.
pub fn ballet_basket() -> Basket {
    let mut basket = Basket::new();
    basket
        .add_item(LineItem::course(
            "ballet-beginners",
            "Ballet Beginners",
            "Amy",
            Money::new(dec!(45.00)),
        ))
        .unwrap();
    basket
}

/// Default configuration with retries that do not slow tests down.
pub fn fast_config() -> CheckoutConfig {
    CheckoutConfig {
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn gateway_with_saved_card() -> ScriptedPaymentGateway {
    ScriptedPaymentGateway::with_saved_methods(vec![saved_visa(SAVED_CARD, "4242", true)])
}

pub async fn repository_with_promos() -> InMemoryOrderRepository {
    let repository = InMemoryOrderRepository::new();
    repository
        .add_promo_code("WELCOME10", PromoDiscount::Percentage(dec!(10)))
        .await;
    repository
        .add_promo_code("TENOFF", PromoDiscount::Fixed(Money::new(dec!(10))))
        .await;
    repository
}

pub struct Harness {
    pub checkout: CheckoutOrchestrator,
    pub gateway: ScriptedPaymentGateway,
    pub orders: InMemoryOrderRepository,
}

pub async fn harness(basket: Basket, gateway: ScriptedPaymentGateway) -> Harness {
    harness_with_config(basket, gateway, fast_config()).await
}

pub async fn harness_with_config(
    basket: Basket,
    gateway: ScriptedPaymentGateway,
    config: CheckoutConfig,
) -> Harness {
    let orders = repository_with_promos().await;
    let checkout = CheckoutOrchestrator::new(
        "cus_test",
        basket,
        Arc::new(gateway.clone()),
        Arc::new(orders.clone()),
        config,
    );
    Harness {
        checkout,
        gateway,
        orders,
    }
}

pub fn generate_basket_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["kind", "offering", "title", "attendee", "price", "discount", "deposit"])?;

    for i in 1..=rows {
        wtr.write_record([
            "course",
            &format!("course-{}", i),
            &format!("Course {}", i),
            "Amy",
            "10.00",
            "",
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
