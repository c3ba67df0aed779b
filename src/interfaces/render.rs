use crate::application::state::CheckoutState;
use crate::domain::basket::Totals;

/// One-line summary of a checkout snapshot for display.
///
/// This is the only place that matches on every `CheckoutState` variant.
pub fn render_state(state: &CheckoutState) -> String {
    match state {
        CheckoutState::Initial => "initial".to_string(),
        CheckoutState::Loading => "loading".to_string(),
        CheckoutState::Loaded(session) => {
            let method = session
                .selected_payment_method
                .as_ref()
                .map(|method| format!("{} ****{}", method.brand, method.last4))
                .unwrap_or_else(|| "none".to_string());
            let mut line = format!(
                "loaded step={}/{} method={} charge={}",
                session.current_step,
                session.total_steps,
                method,
                session.basket.totals().charge_total
            );
            if session.requires_step_up() {
                line.push_str(" requires_3ds=true");
            }
            if let Some(error) = &session.error {
                line.push_str(&format!(" error={}", error.code));
            }
            line
        }
        CheckoutState::Processing => "processing".to_string(),
        CheckoutState::Error(failure) => {
            let mut line = format!(
                "error kind={} code={} retriable={} message=\"{}\"",
                failure.kind,
                failure.code,
                failure.is_retriable(),
                failure.message
            );
            if failure.is_payment_taken() {
                line.push_str(" payment_taken=true");
            }
            line
        }
        CheckoutState::Success(order) => format!(
            "success order={} status={:?} total={} charged={} pay_later={}",
            order.id,
            order.status,
            order.total(),
            order.totals.charge_total,
            order.totals.pay_later
        ),
    }
}

pub fn render_totals(totals: &Totals) -> String {
    format!(
        "subtotal={} discounts={} promo={} credit={} tax={} total={} charge_now={} pay_later={}",
        totals.subtotal,
        totals.discount_total,
        totals.promo_code_discount_value,
        totals.credit_total,
        totals.tax,
        totals.total,
        totals.charge_total,
        totals.pay_later
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckoutError, CheckoutFailure};

    #[test]
    fn test_render_error_shows_classification() {
        let failure = CheckoutFailure::from(&CheckoutError::Network("timed out".into()));
        let line = render_state(&CheckoutState::Error(failure));
        assert!(line.contains("code=NETWORK_ERROR"));
        assert!(line.contains("retriable=true"));
    }

    #[test]
    fn test_render_flags_taken_payment() {
        let failure = CheckoutFailure::from(&CheckoutError::OrderNotSaved("disk full".into()));
        let line = render_state(&CheckoutState::Error(failure));
        assert!(line.contains("code=ORDER_NOT_SAVED retriable=false"));
        assert!(line.ends_with("payment_taken=true"));
    }

    #[test]
    fn test_render_totals() {
        let line = render_totals(&Totals::default());
        assert!(line.starts_with("subtotal=£0.00"));
    }
}
