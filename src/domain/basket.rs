use super::money::Money;
use super::ports::OrderRepository;
use super::promo::{AppliedPromo, PromoValidation, normalize_code};
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Course,
    TasterSession,
    DepositPlan,
}

/// A single bookable unit in the basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub kind: ItemKind,
    /// The course or session being booked.
    pub offering_id: String,
    pub title: String,
    /// Who attends, e.g. which family member.
    pub assigned_to: String,
    pub unit_price: Money,
    pub discount: Money,
    /// This item's share of the basket promo reduction. Derived by the basket.
    pub promo_code_discount: Money,
    /// Amount due at booking. `None` means the full price is charged now.
    pub deposit: Option<Money>,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    pub fn new(
        kind: ItemKind,
        offering_id: impl Into<String>,
        title: impl Into<String>,
        assigned_to: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            offering_id: offering_id.into(),
            title: title.into(),
            assigned_to: assigned_to.into(),
            unit_price,
            discount: Money::ZERO,
            promo_code_discount: Money::ZERO,
            deposit: None,
            created_at: Utc::now(),
        }
    }

    pub fn course(
        offering_id: impl Into<String>,
        title: impl Into<String>,
        assigned_to: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self::new(ItemKind::Course, offering_id, title, assigned_to, unit_price)
    }

    pub fn taster(
        offering_id: impl Into<String>,
        title: impl Into<String>,
        assigned_to: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self::new(ItemKind::TasterSession, offering_id, title, assigned_to, unit_price)
    }

    /// A course paid by deposit now and the remainder later.
    pub fn deposit_plan(
        offering_id: impl Into<String>,
        title: impl Into<String>,
        assigned_to: impl Into<String>,
        unit_price: Money,
        deposit: Money,
    ) -> Self {
        Self::new(ItemKind::DepositPlan, offering_id, title, assigned_to, unit_price)
            .with_deposit(deposit)
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_deposit(mut self, deposit: Money) -> Self {
        self.deposit = Some(deposit);
        self
    }

    /// Price after the item's own discount.
    pub fn net_price(&self) -> Money {
        self.unit_price.saturating_sub(self.discount)
    }

    /// The part of this item charged after booking, once `promo_share` of
    /// the basket promo has come off it. The deposit itself is always due now.
    pub fn deferred(&self, promo_share: Money) -> Money {
        self.deposit
            .map(|deposit| {
                self.net_price()
                    .saturating_sub(promo_share)
                    .saturating_sub(deposit)
            })
            .unwrap_or(Money::ZERO)
    }

    fn validate(&self) -> Result<()> {
        if !self.unit_price.is_positive() {
            return Err(CheckoutError::InvalidItem(format!(
                "{} must have a positive price",
                self.title
            )));
        }
        if self.discount < Money::ZERO || self.discount > self.unit_price {
            return Err(CheckoutError::InvalidItem(format!(
                "discount on {} must be between zero and its price",
                self.title
            )));
        }
        if let Some(deposit) = self.deposit
            && (deposit < Money::ZERO || deposit > self.net_price())
        {
            return Err(CheckoutError::InvalidItem(format!(
                "deposit on {} must be between zero and its discounted price",
                self.title
            )));
        }
        Ok(())
    }

    fn books_same_place_as(&self, other: &LineItem) -> bool {
        self.offering_id == other.offering_id && self.assigned_to == other.assigned_to
    }
}

/// Derived monetary totals of a basket.
///
/// `total = subtotal - discount_total - promo_code_discount_value - credit_total + tax`
/// and `charge_total + pay_later = total` hold for every value produced by
/// [`Basket::compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub promo_code_discount_value: Money,
    pub credit_total: Money,
    pub tax: Money,
    pub total: Money,
    /// Amount charged at checkout.
    pub charge_total: Money,
    /// Amount deferred by deposit plans.
    pub pay_later: Money,
}

/// The basket ledger: line items plus everything that shapes what they cost.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Basket {
    items: Vec<LineItem>,
    use_credit: bool,
    available_credit: Money,
    /// Tax percentage applied on top of discounted prices.
    tax_rate: Decimal,
    promo: Option<AppliedPromo>,
    totals: Totals,
}

impl Basket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_available_credit(mut self, credit: Money) -> Self {
        self.set_available_credit(credit);
        self
    }

    pub fn with_tax_rate(mut self, percent: Decimal) -> Self {
        self.tax_rate = percent.max(Decimal::ZERO);
        self.recompute();
        self
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn promo_code(&self) -> Option<&str> {
        self.promo.as_ref().map(|promo| promo.code.as_str())
    }

    pub fn uses_credit(&self) -> bool {
        self.use_credit
    }

    pub fn available_credit(&self) -> Money {
        self.available_credit
    }

    pub fn add_item(&mut self, item: LineItem) -> Result<()> {
        item.validate()?;
        if self.items.iter().any(|existing| existing.books_same_place_as(&item)) {
            return Err(CheckoutError::InvalidItem(format!(
                "{} is already booked for {}",
                item.offering_id, item.assigned_to
            )));
        }

        debug!(item_id = %item.id, offering = %item.offering_id, price = %item.unit_price, "Adding line item");
        self.items.push(item);
        self.recompute();
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<LineItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| CheckoutError::InvalidItem(format!("no line item {}", item_id)))?;

        let removed = self.items.remove(index);
        debug!(item_id = %removed.id, "Removed line item");
        if self.items.is_empty() {
            self.clear();
        } else {
            self.recompute();
        }
        Ok(removed)
    }

    /// Validates `code` with the repository and applies it.
    ///
    /// Returns the resulting promo reduction. On rejection the basket is left
    /// exactly as it was.
    pub async fn apply_promo_code(
        &mut self,
        code: &str,
        repository: &dyn OrderRepository,
    ) -> Result<Money> {
        let code = self.check_promo_code(code)?;
        let validation = repository.validate_promo_code(&code).await?;
        self.accept_promo(code, validation)
    }

    pub fn clear_promo_code(&mut self) {
        if self.promo.take().is_some() {
            self.recompute();
        }
    }

    pub fn toggle_credit_usage(&mut self, enabled: bool) {
        self.use_credit = enabled;
        self.recompute();
    }

    pub fn set_available_credit(&mut self, credit: Money) {
        self.available_credit = credit.max(Money::ZERO);
        self.recompute();
    }

    /// Returns the basket to its canonical empty state. Account credit and the
    /// tax rate describe the customer, not the purchase, and are kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.promo = None;
        self.use_credit = false;
        self.recompute();
    }

    /// Derives all totals from the current inputs. Pure: identical inputs
    /// always yield identical totals.
    pub fn compute_totals(&self) -> Totals {
        let subtotal: Money = self.items.iter().map(|item| item.unit_price).sum();
        let discount_total: Money = self.items.iter().map(|item| item.discount).sum();
        let net = subtotal.saturating_sub(discount_total);

        let promo_code_discount_value = self
            .promo
            .as_ref()
            .map(|promo| promo.discount.value_for(subtotal).max(Money::ZERO).min(net))
            .unwrap_or(Money::ZERO);

        let taxable = net - promo_code_discount_value;
        let tax = taxable.percent(self.tax_rate);
        let before_credit = taxable + tax;

        let credit_total = if self.use_credit {
            self.available_credit.min(before_credit)
        } else {
            Money::ZERO
        };
        let total = before_credit - credit_total;

        // Tax and credit settle against the amount due now; only the
        // pre-tax remainder of deposit plans is deferred.
        let deferred: Money = self
            .items
            .iter()
            .zip(self.promo_shares(promo_code_discount_value))
            .map(|(item, share)| item.deferred(share))
            .sum();
        let pay_later = deferred.min(total);

        Totals {
            subtotal,
            discount_total,
            promo_code_discount_value,
            credit_total,
            tax,
            total,
            charge_total: total - pay_later,
            pay_later,
        }
    }

    pub(crate) fn check_promo_code(&self, code: &str) -> Result<String> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CheckoutError::InvalidPromoCode("promo code is empty".into()));
        }
        if self.is_empty() {
            return Err(CheckoutError::InvalidPromoCode(format!(
                "{} cannot be applied to an empty basket",
                code
            )));
        }
        Ok(code)
    }

    pub(crate) fn accept_promo(&mut self, code: String, validation: PromoValidation) -> Result<Money> {
        if !validation.valid {
            return Err(CheckoutError::InvalidPromoCode(code));
        }

        self.promo = Some(AppliedPromo {
            code,
            discount: validation.discount,
        });
        self.recompute();
        info!(
            promo = self.promo_code().unwrap_or_default(),
            reduction = %self.totals.promo_code_discount_value,
            "Applied promo code"
        );
        Ok(self.totals.promo_code_discount_value)
    }

    fn recompute(&mut self) {
        self.totals = self.compute_totals();
        self.allocate_promo();
    }

    fn allocate_promo(&mut self) {
        let shares = self.promo_shares(self.totals.promo_code_discount_value);
        for (item, share) in self.items.iter_mut().zip(shares) {
            item.promo_code_discount = share;
        }
    }

    /// Splits `promo_value` over items in proportion to their discounted
    /// price. No share exceeds its item's net price, and the shares sum to
    /// `promo_value` as long as it does not exceed the basket's net total.
    fn promo_shares(&self, promo_value: Money) -> Vec<Money> {
        let net_total: Money = self.items.iter().map(LineItem::net_price).sum();
        let last = self.items.len().saturating_sub(1);
        let mut remaining = promo_value;

        let mut shares: Vec<Money> = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let proportional = if index == last || net_total.is_zero() {
                    remaining
                } else {
                    Money::new(promo_value.value() * item.net_price().value() / net_total.value())
                };
                let share = proportional.min(remaining).min(item.net_price());
                remaining -= share;
                share
            })
            .collect();

        // Rounding can leave a few pence the capped last item could not take.
        for (item, share) in self.items.iter().zip(shares.iter_mut()) {
            if remaining.is_zero() {
                break;
            }
            let top_up = remaining.min(item.net_price().saturating_sub(*share));
            *share += top_up;
            remaining -= top_up;
        }
        shares
    }
}
