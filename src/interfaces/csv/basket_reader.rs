use crate::domain::basket::{ItemKind, LineItem};
use crate::domain::money::Money;
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a basket file. Money columns are in pounds.
#[derive(Debug, Deserialize)]
struct LineItemRecord {
    kind: ItemKind,
    offering: String,
    title: String,
    attendee: String,
    price: Decimal,
    #[serde(default)]
    discount: Option<Decimal>,
    #[serde(default)]
    deposit: Option<Decimal>,
}

impl TryFrom<LineItemRecord> for LineItem {
    type Error = CheckoutError;

    fn try_from(record: LineItemRecord) -> Result<Self> {
        let mut item = LineItem::new(
            record.kind,
            record.offering,
            record.title,
            record.attendee,
            Money::new(record.price),
        );
        if let Some(discount) = record.discount {
            item = item.with_discount(Money::new(discount));
        }
        match (record.kind, record.deposit) {
            (_, Some(deposit)) => item = item.with_deposit(Money::new(deposit)),
            (ItemKind::DepositPlan, None) => {
                return Err(CheckoutError::InvalidItem(format!(
                    "deposit plan {} has no deposit",
                    item.offering_id
                )));
            }
            _ => {}
        }
        Ok(item)
    }
}

/// Reads basket line items from a CSV source.
///
/// Expects the header `kind, offering, title, attendee, price, discount, deposit`;
/// the last two columns may be empty or omitted.
pub struct BasketReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> BasketReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads line items; a malformed row yields an error and reading continues.
    pub fn line_items(self) -> impl Iterator<Item = Result<LineItem>> {
        self.reader
            .into_deserialize::<LineItemRecord>()
            .map(|result| result.map_err(CheckoutError::from).and_then(LineItem::try_from))
    }
}
