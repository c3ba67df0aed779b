use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of decimal places in the smallest currency unit (pence).
const MINOR_UNIT_SCALE: u32 = 2;

/// A monetary value in the store currency, always held at pence precision.
///
/// This is a wrapper around `rust_decimal::Decimal`. Every constructor rounds
/// half-up to the minor unit, so arithmetic between two `Money` values never
/// produces fractional pence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(round_half_up(value))
    }

    pub fn from_minor_units(units: i64) -> Self {
        Self(Decimal::new(units, MINOR_UNIT_SCALE))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The amount in pence, e.g. `4500` for £45.00.
    pub fn minor_units(&self) -> i64 {
        let mut scaled = self.0;
        scaled.rescale(MINOR_UNIT_SCALE);
        scaled.mantissa() as i64
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `percent`% of this amount, rounded half-up to the pence.
    pub fn percent(&self, percent: Decimal) -> Self {
        Self::new(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs >= self { Self::ZERO } else { self - rhs }
    }
}

fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "£{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(dec!(10.00));
        let b = Money::new(dec!(2.50));
        assert_eq!(a + b, Money::new(dec!(12.50)));
        assert_eq!(a - b, Money::new(dec!(7.50)));
        assert_eq!(b.saturating_sub(a), Money::ZERO);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::new(dec!(45)).minor_units(), 4500);
        assert_eq!(Money::from_minor_units(4500), Money::new(dec!(45.00)));
        assert_eq!(Money::new(dec!(0.1)).minor_units(), 10);
    }

    #[test]
    fn test_rounds_half_up_to_pence() {
        assert_eq!(Money::new(dec!(1.005)).minor_units(), 101);
        assert_eq!(Money::new(dec!(1.004)).minor_units(), 100);
        // 15% of £33.30 is £4.995
        assert_eq!(Money::new(dec!(33.30)).percent(dec!(15)).minor_units(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor_units(4500).to_string(), "£45.00");
    }
}
