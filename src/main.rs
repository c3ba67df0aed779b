use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal_macros::dec;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studio_checkout::application::checkout::CheckoutOrchestrator;
use studio_checkout::application::state::CheckoutState;
use studio_checkout::config::CheckoutConfig;
use studio_checkout::domain::basket::Basket;
use studio_checkout::domain::money::Money;
use studio_checkout::domain::payment::{PaymentMethodKind, PaymentResult, StepUpOutcome};
use studio_checkout::domain::ports::OrderRepositoryRef;
use studio_checkout::domain::promo::PromoDiscount;
use studio_checkout::error::CheckoutError;
use studio_checkout::infrastructure::in_memory::InMemoryOrderRepository;
use studio_checkout::infrastructure::simulated::{ScriptedPaymentGateway, saved_visa};
use studio_checkout::interfaces::csv::basket_reader::BasketReader;
use studio_checkout::interfaces::render::{render_state, render_totals};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Basket CSV file
    basket: PathBuf,

    /// Promo code to apply before checkout
    #[arg(long)]
    promo: Option<String>,

    /// Account credit available to the customer, in pence
    #[arg(long, default_value_t = 0)]
    credit: i64,

    /// Spend available account credit on this basket
    #[arg(long)]
    use_credit: bool,

    /// Gateway behaviour to simulate
    #[arg(long, value_enum, default_value_t = Scenario::Success)]
    scenario: Scenario,

    /// Path to persistent order database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Print state snapshots as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Success,
    Decline,
    StepUp,
    StepUpCancel,
    Network,
}

const CUSTOMER_REF: &str = "cus_demo";

fn demo_promo_codes() -> Vec<(&'static str, PromoDiscount)> {
    vec![
        ("WELCOME10", PromoDiscount::Percentage(dec!(10))),
        ("TENOFF", PromoDiscount::Fixed(Money::new(dec!(10)))),
    ]
}

#[cfg(feature = "storage-rocksdb")]
async fn open_repository(db_path: Option<&Path>) -> Result<OrderRepositoryRef> {
    use studio_checkout::infrastructure::rocksdb::RocksDbOrderRepository;

    if let Some(path) = db_path {
        let repository = RocksDbOrderRepository::open(path).into_diagnostic()?;
        for (code, discount) in demo_promo_codes() {
            repository.add_promo_code(code, discount).into_diagnostic()?;
        }
        return Ok(Arc::new(repository));
    }
    Ok(in_memory_repository().await)
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_repository(db_path: Option<&Path>) -> Result<OrderRepositoryRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_repository().await)
}

async fn in_memory_repository() -> OrderRepositoryRef {
    let repository = InMemoryOrderRepository::new();
    for (code, discount) in demo_promo_codes() {
        repository.add_promo_code(code, discount).await;
    }
    Arc::new(repository)
}

async fn scripted_gateway(scenario: Scenario, config: &CheckoutConfig) -> ScriptedPaymentGateway {
    let gateway =
        ScriptedPaymentGateway::with_saved_methods(vec![saved_visa("pm_saved_visa", "4242", true)]);
    match scenario {
        Scenario::Success => {}
        Scenario::Decline => {
            gateway
                .push_confirm(Ok(PaymentResult::declined(
                    "CARD_DECLINED",
                    "Your card was declined.",
                )))
                .await;
        }
        Scenario::StepUp | Scenario::StepUpCancel => {
            gateway
                .push_confirm(Ok(PaymentResult::requires_step_up(
                    "pi_demo_3ds",
                    "pi_demo_3ds_secret",
                )))
                .await;
            if scenario == Scenario::StepUpCancel {
                gateway.push_step_up(Ok(StepUpOutcome::Cancelled)).await;
            }
        }
        Scenario::Network => {
            for _ in 0..=config.max_network_retries {
                gateway
                    .push_confirm(Err(CheckoutError::Network(
                        "connection reset by peer".into(),
                    )))
                    .await;
            }
        }
    }
    gateway
}

fn print_state(state: &CheckoutState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state).into_diagnostic()?);
    } else {
        println!("{}", render_state(state));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("studio_checkout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CheckoutConfig::from_env();

    // Build the basket ledger
    let mut basket = Basket::new().with_available_credit(Money::from_minor_units(cli.credit));
    let file = File::open(&cli.basket).into_diagnostic()?;
    for item in BasketReader::new(file).line_items() {
        if let Err(e) = item.and_then(|item| basket.add_item(item)) {
            eprintln!("Error reading line item: {}", e);
        }
    }
    basket.toggle_credit_usage(cli.use_credit);

    let orders = open_repository(cli.db_path.as_deref()).await?;
    let gateway = scripted_gateway(cli.scenario, &config).await;
    let checkout =
        CheckoutOrchestrator::new(CUSTOMER_REF, basket, Arc::new(gateway), orders, config);

    if let Some(code) = &cli.promo
        && let Err(e) = checkout.apply_promo_code(code).await
    {
        eprintln!("Error applying promo code: {}", e);
    }
    println!("{}", render_totals(checkout.basket().await.totals()));

    // Run the checkout: initialize, pay, then resolve 3-D Secure if asked
    if let Err(e) = checkout.initialize_checkout().await {
        warn!(error = %e, "Checkout could not be initialized");
    }
    print_state(&checkout.state(), cli.json)?;

    let CheckoutState::Loaded(session) = checkout.state() else {
        return Ok(());
    };
    let Some(method) = session
        .selected_payment_method
        .or_else(|| session.available_payment_methods.first().cloned())
    else {
        eprintln!("No payment method available");
        return Ok(());
    };

    let result = checkout.process_payment(&method.id, PaymentMethodKind::Card).await;
    print_state(&checkout.state(), cli.json)?;

    if let Ok(result) = result
        && result.requires_step_up_authentication()
        && let Some(secret) = result.client_secret
    {
        if let Err(e) = checkout.handle_3ds_authentication(&secret).await {
            warn!(error = %e, "3-D Secure authentication failed");
        }
        print_state(&checkout.state(), cli.json)?;
    }

    Ok(())
}
