mod common;

use common::repository_with_promos;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use studio_checkout::domain::basket::{Basket, LineItem};
use studio_checkout::domain::money::Money;

fn random_item(rng: &mut StdRng, index: usize) -> LineItem {
    let price = Money::from_minor_units(rng.gen_range(100..50_000));
    let discount = Money::from_minor_units(rng.gen_range(0..=price.minor_units() / 2));
    let item = LineItem::course(
        format!("course-{}", index),
        format!("Course {}", index),
        format!("attendee-{}", rng.gen_range(0..3)),
        price,
    )
    .with_discount(discount);

    if rng.gen_bool(0.3) {
        let net = item.net_price().minor_units();
        item.with_deposit(Money::from_minor_units(rng.gen_range(0..=net)))
    } else {
        item
    }
}

#[tokio::test]
async fn test_totals_hold_under_random_baskets() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let repository = repository_with_promos().await;

    for _ in 0..200 {
        let mut basket = Basket::new()
            .with_available_credit(Money::from_minor_units(rng.gen_range(0..20_000)))
            .with_tax_rate(Decimal::from(rng.gen_range(0..=20i64)));
        for index in 0..rng.gen_range(1..6) {
            basket.add_item(random_item(&mut rng, index)).unwrap();
        }
        if rng.gen_bool(0.5) {
            let code = if rng.gen_bool(0.5) { "WELCOME10" } else { "TENOFF" };
            basket.apply_promo_code(code, &repository).await.unwrap();
        }
        basket.toggle_credit_usage(rng.gen_bool(0.5));

        let totals = *basket.totals();
        assert_eq!(totals, basket.compute_totals());

        assert!(totals.total >= Money::ZERO);
        assert!(totals.charge_total >= Money::ZERO);
        assert!(totals.pay_later >= Money::ZERO);
        assert_eq!(totals.charge_total + totals.pay_later, totals.total);
        assert!(totals.promo_code_discount_value <= totals.subtotal - totals.discount_total);
        assert!(totals.credit_total <= basket.available_credit());
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount_total - totals.promo_code_discount_value
                + totals.tax
                - totals.credit_total
        );

        let allocated: Money = basket.items().iter().map(|item| item.promo_code_discount).sum();
        assert_eq!(allocated, totals.promo_code_discount_value);
    }
}

#[test]
fn test_remove_then_clear_returns_to_empty() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut basket = Basket::new();
    for index in 0..10 {
        basket.add_item(random_item(&mut rng, index)).unwrap();
    }

    while let Some(item) = basket.items().first().cloned() {
        basket.remove_item(item.id).unwrap();
    }

    assert!(basket.is_empty());
    assert_eq!(basket.totals().total, Money::ZERO);
    assert_eq!(basket.promo_code(), None);
}
