use super::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The reduction a promo code grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromoDiscount {
    /// Percentage of the basket subtotal.
    Percentage(Decimal),
    /// Flat amount off the basket.
    Fixed(Money),
}

impl PromoDiscount {
    /// The reduction for a basket, before capping against what is left to pay.
    pub fn value_for(&self, subtotal: Money) -> Money {
        match self {
            Self::Percentage(percent) => subtotal.percent(*percent),
            Self::Fixed(amount) => *amount,
        }
    }
}

/// Answer from the order repository when a promo code is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoValidation {
    pub valid: bool,
    pub discount: PromoDiscount,
}

/// A promo code accepted into a basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    pub code: String,
    pub discount: PromoDiscount,
}

/// Promo codes are matched case-insensitively and ignore surrounding whitespace.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percentage_applies_to_subtotal() {
        let discount = PromoDiscount::Percentage(dec!(10));
        assert_eq!(
            discount.value_for(Money::new(dec!(45.00))),
            Money::new(dec!(4.50))
        );
    }

    #[test]
    fn test_fixed_ignores_subtotal() {
        let discount = PromoDiscount::Fixed(Money::new(dec!(5)));
        assert_eq!(discount.value_for(Money::new(dec!(100))), Money::new(dec!(5)));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  summer10 "), "SUMMER10");
    }
}
