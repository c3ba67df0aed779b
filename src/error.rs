use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Classification of a failed checkout operation.
///
/// The presentation layer uses this to choose between "retry" and
/// "change payment method" without inspecting error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyBasket,
    CardValidation,
    Card,
    Network,
    InvalidPromoCode,
    OperationInProgress,
    InvalidItem,
    InvalidState,
    /// The charge went through but the order could not be recorded.
    OrderNotSaved,
    Internal,
}

impl ErrorKind {
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::EmptyBasket => "EMPTY_BASKET",
            Self::CardValidation => "CARD_VALIDATION",
            Self::Card => "CARD_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::InvalidPromoCode => "INVALID_PROMO_CODE",
            Self::OperationInProgress => "OPERATION_IN_PROGRESS",
            Self::InvalidItem => "INVALID_ITEM",
            Self::InvalidState => "INVALID_STATE",
            Self::OrderNotSaved => "ORDER_NOT_SAVED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Only transport failures are worth retrying with the same input.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// The customer has already paid. Re-invoking `process_payment` only
    /// records the order; the card is never charged again.
    pub fn is_payment_taken(&self) -> bool {
        matches!(self, Self::OrderNotSaved)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Basket is empty")]
    EmptyBasket,
    #[error("Card details incomplete: {0}")]
    CardValidation(String),
    #[error("{message} (code: {code})")]
    Card { code: String, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid promo code: {0}")]
    InvalidPromoCode(String),
    #[error("Another checkout operation is already in progress")]
    OperationInProgress,
    #[error("Invalid item: {0}")]
    InvalidItem(String),
    #[error("Invalid checkout state: {0}")]
    InvalidState(String),
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),
    #[error("Payment taken but the order was not saved: {0}")]
    OrderNotSaved(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckoutError {
    /// A card decline as reported by the gateway.
    pub fn declined(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Card {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyBasket => ErrorKind::EmptyBasket,
            Self::CardValidation(_) => ErrorKind::CardValidation,
            Self::Card { .. } => ErrorKind::Card,
            Self::Network(_) => ErrorKind::Network,
            Self::InvalidPromoCode(_) => ErrorKind::InvalidPromoCode,
            Self::OperationInProgress => ErrorKind::OperationInProgress,
            Self::InvalidItem(_) => ErrorKind::InvalidItem,
            Self::InvalidState(_) | Self::UnknownPaymentMethod(_) => ErrorKind::InvalidState,
            Self::OrderNotSaved(_) => ErrorKind::OrderNotSaved,
            Self::Storage(_) | Self::Csv(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// The code surfaced to the presentation layer. Card declines keep the
    /// gateway's own code (e.g. `CARD_DECLINED`).
    pub fn code(&self) -> String {
        match self {
            Self::Card { code, .. } => code.clone(),
            other => other.kind().as_code().to_string(),
        }
    }

    /// Reclassifies any failure as a transport failure.
    pub(crate) fn into_network(self) -> Self {
        match self {
            Self::Network(_) => self,
            other => Self::Network(other.to_string()),
        }
    }
}

/// A failed transition as recorded in the observable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFailure {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl CheckoutFailure {
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    pub fn is_payment_taken(&self) -> bool {
        self.kind.is_payment_taken()
    }
}

impl From<&CheckoutError> for CheckoutFailure {
    fn from(err: &CheckoutError) -> Self {
        let message = match err {
            CheckoutError::Card { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            kind: err.kind(),
            code: err.code(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_error_keeps_gateway_code() {
        let err = CheckoutError::declined("CARD_DECLINED", "Your card was declined.");
        assert_eq!(err.kind(), ErrorKind::Card);
        assert_eq!(err.code(), "CARD_DECLINED");

        let failure = CheckoutFailure::from(&err);
        assert_eq!(failure.message, "Your card was declined.");
        assert!(!failure.is_retriable());
    }

    #[test]
    fn test_only_network_is_retriable() {
        assert!(CheckoutError::Network("timeout".into()).kind().is_retriable());
        assert!(!CheckoutError::EmptyBasket.kind().is_retriable());
        assert!(!CheckoutError::OperationInProgress.kind().is_retriable());
    }

    #[test]
    fn test_into_network_reclassifies() {
        let err = CheckoutError::Storage("connection reset".into()).into_network();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_unsaved_order_is_not_a_charge_retry() {
        let failure = CheckoutFailure::from(&CheckoutError::OrderNotSaved("timed out".into()));
        assert_eq!(failure.code, "ORDER_NOT_SAVED");
        assert!(failure.is_payment_taken());
        assert!(!failure.is_retriable());
    }
}
