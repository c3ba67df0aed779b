use super::state::{CheckoutSession, CheckoutState};
use crate::config::CheckoutConfig;
use crate::domain::basket::Basket;
use crate::domain::money::Money;
use crate::domain::order::{PaymentConfirmation, TransactionStatus};
use crate::domain::payment::{
    BillingAddress, CardDetails, ChargeRequest, IdempotencyKey, PaymentMethod, PaymentMethodKind,
    PaymentResult, StepUpOutcome,
};
use crate::domain::ports::{OrderRepositoryRef, PaymentGatewayRef};
use crate::error::{CheckoutError, CheckoutFailure, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

/// What is being paid for, independent of how the gateway answers.
#[derive(Debug, Clone)]
struct Charge {
    payment_method_id: String,
    payment_method_kind: PaymentMethodKind,
    amount: Money,
}

/// A charge waiting on the customer's 3-D Secure challenge.
#[derive(Debug, Clone)]
struct PendingCharge {
    client_secret: String,
    payment_intent_id: Option<String>,
    charge: Charge,
}

/// A charge the gateway has confirmed whose order is not on file yet.
#[derive(Debug, Clone)]
struct CapturedCharge {
    basket: Basket,
    confirmation: PaymentConfirmation,
}

/// Everything a payment attempt needs once the gateway has answered.
struct Attempt {
    epoch: u64,
    basket: Basket,
    billing: Option<BillingAddress>,
    charge: Charge,
    payment_intent_id: Option<String>,
}

struct Ledger {
    basket: Basket,
    session: Option<CheckoutSession>,
    pending: Option<PendingCharge>,
    /// Survives resets: the customer has paid and the order must still be recorded.
    captured: Option<CapturedCharge>,
    /// Bumped on every reset so late results of an abandoned attempt are not published.
    epoch: u64,
}

impl Ledger {
    fn live_session(&mut self, epoch: u64) -> Option<&mut CheckoutSession> {
        if self.epoch == epoch {
            self.session.as_mut()
        } else {
            None
        }
    }
}

/// Marks a mutating operation as in flight for as long as it is alive.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn not_initialized() -> CheckoutError {
    CheckoutError::InvalidState("checkout has not been initialized".into())
}

/// The checkout state machine for one customer's basket.
///
/// `CheckoutOrchestrator` owns the basket ledger and the checkout session, and
/// drives the payment gateway and order repository. Every transition publishes
/// a [`CheckoutState`] snapshot, observable through [`state`](Self::state) or
/// [`subscribe`](Self::subscribe). Only one mutating operation may run at a
/// time; a concurrent one fails with `CheckoutError::OperationInProgress`
/// before any collaborator is called.
pub struct CheckoutOrchestrator {
    customer_ref: String,
    gateway: PaymentGatewayRef,
    orders: OrderRepositoryRef,
    config: CheckoutConfig,
    ledger: Mutex<Ledger>,
    in_flight: AtomicBool,
    state: watch::Sender<CheckoutState>,
}

impl CheckoutOrchestrator {
    /// Creates a new `CheckoutOrchestrator` in the `Initial` state.
    ///
    /// # Arguments
    ///
    /// * `customer_ref` - The gateway's reference for the paying customer.
    /// * `basket` - The basket ledger this checkout takes ownership of.
    /// * `gateway` - The payment gateway client.
    /// * `orders` - The order repository.
    /// * `config` - Step layout, currency and network tunables.
    pub fn new(
        customer_ref: impl Into<String>,
        basket: Basket,
        gateway: PaymentGatewayRef,
        orders: OrderRepositoryRef,
        config: CheckoutConfig,
    ) -> Self {
        let (state, _) = watch::channel(CheckoutState::Initial);
        Self {
            customer_ref: customer_ref.into(),
            gateway,
            orders,
            config: config.normalized(),
            ledger: Mutex::new(Ledger {
                basket,
                session: None,
                pending: None,
                captured: None,
                epoch: 0,
            }),
            in_flight: AtomicBool::new(false),
            state,
        }
    }

    pub fn state(&self) -> CheckoutState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn basket(&self) -> Basket {
        self.ledger.lock().await.basket.clone()
    }

    /// Consumes the checkout and hands the basket ledger back.
    pub fn dispose(self) -> Basket {
        self.ledger.into_inner().basket
    }

    /// Mutates the basket ledger, e.g. to add or remove items.
    ///
    /// Not allowed while another operation is in flight or while a 3-D Secure
    /// challenge is outstanding, since the amount being charged would change.
    pub async fn update_basket<F, R>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Basket) -> Result<R>,
    {
        let _in_flight = self.begin()?;
        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;
        Self::ensure_basket_unlocked(ledger)?;

        let output = mutate(&mut ledger.basket)?;
        self.refresh_session(ledger);
        Ok(output)
    }

    /// Validates a promo code with the order repository and applies it.
    pub async fn apply_promo_code(&self, code: &str) -> Result<Money> {
        let _in_flight = self.begin()?;
        let code = {
            let ledger = self.ledger.lock().await;
            Self::ensure_basket_unlocked(&ledger)?;
            ledger.basket.check_promo_code(code)?
        };

        let validation = self.call(self.orders.validate_promo_code(&code)).await;

        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;
        let reduction = match validation {
            Ok(validation) => ledger.basket.accept_promo(code, validation),
            Err(err) => Err(err),
        };
        if let Err(err) = &reduction {
            warn!(error = %err, "Promo code rejected");
        }
        self.refresh_session(ledger);
        reduction
    }

    pub async fn remove_promo_code(&self) -> Result<()> {
        self.update_basket(|basket| {
            basket.clear_promo_code();
            Ok(())
        })
        .await
    }

    /// Loads the customer's saved payment methods and opens a session at step 1.
    pub async fn initialize_checkout(&self) -> Result<()> {
        let _in_flight = self.begin()?;
        let epoch = {
            let mut ledger = self.ledger.lock().await;
            if ledger.basket.is_empty() {
                ledger.session = None;
                ledger.pending = None;
                let err = CheckoutError::EmptyBasket;
                warn!("Checkout requested for an empty basket");
                self.emit(CheckoutState::Error(CheckoutFailure::from(&err)));
                return Err(err);
            }
            ledger.epoch
        };

        self.emit(CheckoutState::Loading);
        info!(customer = %self.customer_ref, "Loading payment methods");
        let fetched = self
            .call(self.gateway.list_payment_methods(&self.customer_ref))
            .await;

        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;
        if ledger.epoch != epoch {
            warn!("Checkout was reset while loading; discarding payment methods");
            return Err(CheckoutError::InvalidState("checkout was reset".into()));
        }

        match fetched {
            Ok(methods) => {
                let session =
                    CheckoutSession::new(ledger.basket.clone(), methods, self.config.total_steps);
                info!(
                    session_id = %session.id,
                    methods = session.available_payment_methods.len(),
                    total = %session.basket.totals().total,
                    "Checkout loaded"
                );
                self.emit(CheckoutState::Loaded(session.clone()));
                ledger.session = Some(session);
                ledger.pending = None;
                Ok(())
            }
            Err(err) => {
                let err = err.into_network();
                error!(error = %err, "Failed to load payment methods");
                ledger.session = None;
                ledger.pending = None;
                self.emit(CheckoutState::Error(CheckoutFailure::from(&err)));
                Err(err)
            }
        }
    }

    pub async fn next_step(&self) -> Result<u8> {
        self.edit_session(|session| Ok(session.next_step())).await
    }

    pub async fn previous_step(&self) -> Result<u8> {
        self.edit_session(|session| Ok(session.previous_step())).await
    }

    /// Selects one of the loaded payment methods.
    pub async fn select_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        self.edit_session(|session| {
            let found = session
                .available_payment_methods
                .iter()
                .find(|available| available.id == method.id)
                .cloned()
                .ok_or_else(|| CheckoutError::UnknownPaymentMethod(method.id.clone()))?;
            session.selected_payment_method = Some(found);
            Ok(())
        })
        .await
    }

    pub async fn set_billing_address(&self, address: BillingAddress) -> Result<()> {
        self.edit_session(|session| {
            session.billing_address = Some(address);
            Ok(())
        })
        .await
    }

    /// Registers a new card with the gateway and selects it.
    ///
    /// Incomplete card or billing details fail with
    /// `CheckoutError::CardValidation` without contacting the gateway.
    pub async fn create_payment_method_from_card(
        &self,
        card: CardDetails,
        billing: BillingAddress,
    ) -> Result<PaymentMethod> {
        let _in_flight = self.begin()?;
        let epoch = {
            let mut guard = self.ledger.lock().await;
            let ledger = &mut *guard;
            let epoch = ledger.epoch;
            let session = ledger.session.as_mut().ok_or_else(not_initialized)?;

            if let Err(err) = card.validate().and_then(|()| billing.validate()) {
                warn!(error = %err, "Card details rejected before reaching the gateway");
                session.error = Some(CheckoutFailure::from(&err));
                self.emit(CheckoutState::Loaded(session.clone()));
                return Err(err);
            }

            session.is_processing = true;
            session.error = None;
            self.emit(CheckoutState::Loaded(session.clone()));
            epoch
        };

        let created = self
            .call(self.gateway.create_payment_method(&card, &billing))
            .await;

        let mut guard = self.ledger.lock().await;
        let Some(session) = guard.live_session(epoch) else {
            warn!("Checkout was reset while the card was being saved");
            return created;
        };
        session.is_processing = false;

        match created {
            Ok(method) => {
                info!(payment_method = %method.id, brand = %method.brand, "Saved new card");
                session.available_payment_methods.push(method.clone());
                session.selected_payment_method = Some(method.clone());
                session.billing_address = Some(billing);
                self.emit(CheckoutState::Loaded(session.clone()));
                Ok(method)
            }
            Err(err) => {
                warn!(code = %err.code(), error = %err, "Gateway rejected card");
                let failure = CheckoutFailure::from(&err);
                session.error = Some(failure.clone());
                self.emit(CheckoutState::Error(failure));
                Err(err)
            }
        }
    }

    /// Charges the basket's `charge_total` to the given payment method.
    ///
    /// The method does not need to be in the loaded list; an explicit id is
    /// trusted as-is. Returns the gateway's result, with the persisted order
    /// attached on success. A result that requires step-up authentication
    /// leaves the checkout `Loaded` with a client secret; finish it with
    /// [`handle_3ds_authentication`](Self::handle_3ds_authentication).
    ///
    /// If an earlier charge went through but its order could not be saved,
    /// this only records that order; the gateway is not called again.
    pub async fn process_payment(
        &self,
        payment_method_id: &str,
        payment_method_kind: PaymentMethodKind,
    ) -> Result<PaymentResult> {
        let _in_flight = self.begin()?;
        let (epoch, basket, billing, captured) = {
            let mut guard = self.ledger.lock().await;
            let ledger = &mut *guard;
            let epoch = ledger.epoch;
            let basket = ledger.basket.clone();
            let captured = ledger.captured.clone();
            let session = ledger.session.as_mut().ok_or_else(not_initialized)?;

            if basket.is_empty() {
                let err = CheckoutError::EmptyBasket;
                let failure = CheckoutFailure::from(&err);
                session.error = Some(failure.clone());
                self.emit(CheckoutState::Error(failure));
                return Err(err);
            }

            session.basket = basket.clone();
            session.is_processing = true;
            session.error = None;
            session.client_secret = None;
            let billing = session.billing_address.clone();
            ledger.pending = None;
            self.emit(CheckoutState::Processing);
            (epoch, basket, billing, captured)
        };

        if let Some(captured) = captured {
            info!(
                payment_intent = ?captured.confirmation.payment_intent_id,
                "Charge already confirmed; recording the order without charging again"
            );
            let result = PaymentResult {
                success: true,
                payment_intent_id: captured.confirmation.payment_intent_id.clone(),
                ..Default::default()
            };
            return self.place_order(epoch, captured, result).await;
        }

        let request = ChargeRequest {
            amount: basket.totals().charge_total,
            currency: self.config.currency.clone(),
            payment_method_id: payment_method_id.to_string(),
            payment_method_kind,
            idempotency_key: IdempotencyKey::generate(),
        };
        info!(
            idempotency_key = %request.idempotency_key,
            payment_method = %request.payment_method_id,
            amount = %request.amount,
            pay_later = %basket.totals().pay_later,
            "Submitting payment"
        );

        let confirmed = if request.amount.is_zero() {
            info!("Nothing due at checkout; skipping the gateway");
            Ok(PaymentResult {
                success: true,
                ..Default::default()
            })
        } else {
            self.confirm_with_retry(&request).await
        };

        let attempt = Attempt {
            epoch,
            basket,
            billing,
            charge: Charge {
                payment_method_id: request.payment_method_id,
                payment_method_kind,
                amount: request.amount,
            },
            payment_intent_id: None,
        };
        self.settle(attempt, confirmed).await
    }

    /// Completes or abandons an outstanding 3-D Secure challenge.
    ///
    /// Cancellation by the customer is not an error: the checkout returns to
    /// the payment step with no error and no client secret.
    pub async fn handle_3ds_authentication(&self, client_secret: &str) -> Result<StepUpOutcome> {
        let _in_flight = self.begin()?;
        let (attempt, secret) = {
            let mut guard = self.ledger.lock().await;
            let ledger = &mut *guard;
            let pending = match &ledger.pending {
                Some(pending) if pending.client_secret == client_secret => pending.clone(),
                _ => {
                    return Err(CheckoutError::InvalidState(
                        "no 3-D Secure challenge is pending for this client secret".into(),
                    ));
                }
            };
            let session = ledger.session.as_mut().ok_or_else(not_initialized)?;
            session.is_processing = true;
            session.error = None;
            self.emit(CheckoutState::Processing);

            let attempt = Attempt {
                epoch: ledger.epoch,
                basket: ledger.basket.clone(),
                billing: session.billing_address.clone(),
                charge: pending.charge,
                payment_intent_id: pending.payment_intent_id,
            };
            (attempt, pending.client_secret)
        };

        info!(payment_intent = ?attempt.payment_intent_id, "Confirming 3-D Secure authentication");
        match self.call(self.gateway.confirm_step_up(&secret)).await {
            Ok(StepUpOutcome::Cancelled) => {
                let mut guard = self.ledger.lock().await;
                let ledger = &mut *guard;
                if ledger.epoch == attempt.epoch {
                    ledger.pending = None;
                    if let Some(session) = ledger.session.as_mut() {
                        session.client_secret = None;
                        session.error = None;
                        session.is_processing = false;
                        session.go_to_step(self.config.payment_step);
                        self.emit(CheckoutState::Loaded(session.clone()));
                    }
                }
                info!("3-D Secure challenge cancelled by customer");
                Ok(StepUpOutcome::Cancelled)
            }
            Ok(StepUpOutcome::Authenticated(result)) => {
                let result = self.settle(attempt, Ok(result)).await?;
                Ok(StepUpOutcome::Authenticated(result))
            }
            Err(err) => self.fail(attempt.epoch, err).await,
        }
    }

    /// Returns to `Initial` and discards the session. The basket is kept.
    pub async fn reset(&self) {
        let mut ledger = self.ledger.lock().await;
        ledger.epoch += 1;
        ledger.session = None;
        ledger.pending = None;
        info!("Checkout reset");
        self.emit(CheckoutState::Initial);
    }

    /// Interprets a gateway answer: step-up, decline, or success.
    async fn settle(
        &self,
        attempt: Attempt,
        confirmed: Result<PaymentResult>,
    ) -> Result<PaymentResult> {
        let result = match confirmed {
            Ok(result) => result,
            Err(err) => return self.fail(attempt.epoch, err).await,
        };

        if result.requires_step_up_authentication() {
            let Some(client_secret) = result.client_secret.clone() else {
                let err = CheckoutError::InvalidState(
                    "gateway requested authentication without a client secret".into(),
                );
                return self.fail(attempt.epoch, err).await;
            };

            let mut guard = self.ledger.lock().await;
            let ledger = &mut *guard;
            let Some(session) = ledger.live_session(attempt.epoch) else {
                warn!("Checkout was reset before 3-D Secure could start; discarding challenge");
                return Err(CheckoutError::InvalidState("checkout was reset".into()));
            };
            session.client_secret = Some(client_secret.clone());
            session.is_processing = false;
            session.go_to_step(self.config.payment_step);
            self.emit(CheckoutState::Loaded(session.clone()));

            ledger.pending = Some(PendingCharge {
                client_secret,
                payment_intent_id: result.payment_intent_id.clone().or(attempt.payment_intent_id),
                charge: attempt.charge,
            });
            info!("Payment requires 3-D Secure authentication");
            return Ok(result);
        }

        if !result.success {
            let err = CheckoutError::declined(
                result
                    .error_code
                    .clone()
                    .unwrap_or_else(|| "CARD_DECLINED".to_string()),
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Your card was declined.".to_string()),
            );
            return self.fail(attempt.epoch, err).await;
        }

        let charge = attempt.charge;
        let confirmation = PaymentConfirmation {
            payment_intent_id: result.payment_intent_id.clone().or(attempt.payment_intent_id),
            payment_method_id: charge.payment_method_id,
            payment_method_kind: charge.payment_method_kind,
            amount_charged: charge.amount,
            transaction_status: if charge.amount.is_zero() {
                TransactionStatus::NotRequired
            } else {
                TransactionStatus::Succeeded
            },
            billing_address: attempt.billing,
        };

        let captured = CapturedCharge {
            basket: attempt.basket,
            confirmation,
        };
        self.place_order(attempt.epoch, captured, result).await
    }

    /// Persists the order for a confirmed charge, then clears the basket.
    ///
    /// A failed save keeps the charge so the next `process_payment` can
    /// record it without charging again.
    async fn place_order(
        &self,
        epoch: u64,
        captured: CapturedCharge,
        result: PaymentResult,
    ) -> Result<PaymentResult> {
        let saved = self
            .call(
                self.orders
                    .create_order(&captured.basket, &captured.confirmation),
            )
            .await;
        let order = match saved {
            Ok(order) => order,
            Err(err) => {
                error!(
                    payment_intent = ?captured.confirmation.payment_intent_id,
                    error = %err,
                    "Payment taken but the order could not be saved"
                );
                self.ledger.lock().await.captured = Some(captured);
                return self
                    .fail(epoch, CheckoutError::OrderNotSaved(err.to_string()))
                    .await;
            }
        };

        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;
        ledger.captured = None;
        ledger.basket.clear();
        info!(order_id = %order.id, total = %order.total(), status = ?order.status, "Order placed");
        if ledger.epoch == epoch {
            ledger.session = None;
            ledger.pending = None;
            self.emit(CheckoutState::Success(order.clone()));
        } else {
            warn!(order_id = %order.id, "Checkout was reset while payment was in flight; order kept");
        }

        Ok(PaymentResult {
            order: Some(order),
            payment_intent_id: captured.confirmation.payment_intent_id,
            ..result
        })
    }

    /// Records a failed transition and publishes the `Error` state.
    async fn fail<T>(&self, epoch: u64, err: CheckoutError) -> Result<T> {
        let failure = CheckoutFailure::from(&err);
        warn!(kind = %failure.kind, code = %failure.code, message = %failure.message, "Checkout attempt failed");

        let mut guard = self.ledger.lock().await;
        let ledger = &mut *guard;
        if ledger.epoch == epoch
            && let Some(session) = ledger.session.as_mut()
        {
            session.is_processing = false;
            session.error = Some(failure.clone());
            // A transport failure leaves an outstanding challenge retriable.
            if !failure.is_retriable() {
                session.client_secret = None;
                ledger.pending = None;
            }
            self.emit(CheckoutState::Error(failure));
        }
        Err(err)
    }

    /// Confirms a charge, retrying transport failures with the same idempotency key.
    async fn confirm_with_retry(&self, request: &ChargeRequest) -> Result<PaymentResult> {
        let mut attempt = 0;
        loop {
            match self.call(self.gateway.confirm_payment(request)).await {
                Err(CheckoutError::Network(reason)) if attempt < self.config.max_network_retries => {
                    attempt += 1;
                    warn!(
                        idempotency_key = %request.idempotency_key,
                        attempt,
                        %reason,
                        "Payment confirmation failed in transit; retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Bounds a collaborator call by the configured timeout.
    async fn call<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.gateway_timeout;
        tokio::time::timeout(timeout, operation)
            .await
            .unwrap_or_else(|_| {
                Err(CheckoutError::Network(format!(
                    "collaborator call timed out after {:?}",
                    timeout
                )))
            })
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected checkout operation while another is in flight");
            return Err(CheckoutError::OperationInProgress);
        }
        Ok(InFlight(&self.in_flight))
    }

    /// Applies a local edit to the session. While an operation is in flight
    /// the edit is kept but not published; that operation's next snapshot
    /// carries it.
    async fn edit_session<R>(
        &self,
        edit: impl FnOnce(&mut CheckoutSession) -> Result<R>,
    ) -> Result<R> {
        let mut ledger = self.ledger.lock().await;
        let session = ledger.session.as_mut().ok_or_else(not_initialized)?;
        let output = edit(session)?;
        debug!(step = session.current_step, "Checkout session updated");
        if !self.is_processing() {
            self.emit(CheckoutState::Loaded(session.clone()));
        }
        Ok(output)
    }

    fn refresh_session(&self, ledger: &mut Ledger) {
        if let Some(session) = ledger.session.as_mut() {
            session.basket = ledger.basket.clone();
            self.emit(CheckoutState::Loaded(session.clone()));
        }
    }

    fn ensure_basket_unlocked(ledger: &Ledger) -> Result<()> {
        if ledger.pending.is_some() {
            return Err(CheckoutError::InvalidState(
                "finish or cancel 3-D Secure before changing the basket".into(),
            ));
        }
        if ledger.captured.is_some() {
            return Err(CheckoutError::InvalidState(
                "the basket has been paid for; complete the order first".into(),
            ));
        }
        Ok(())
    }

    fn emit(&self, state: CheckoutState) {
        self.state.send_replace(state);
    }
}
