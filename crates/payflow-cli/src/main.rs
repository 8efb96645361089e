//! # payflow
//!
//! Drives both payment interactors against the in-memory sandbox and logs
//! every published state.
//!
//! ## Usage
//!
//! ```bash
//! # Optional tuning, also read from .env
//! export PAYFLOW_CONFIRMATION_TIMEOUT_MS=30000
//! export PAYFLOW_POLL_INTERVAL_MS=500
//!
//! # Or point at a TOML file with the same settings
//! export PAYFLOW_CONFIG=payflow.toml
//!
//! RUST_LOG=debug payflow
//! ```

mod sandbox;

use anyhow::Context;
use payflow_core::{FlowConfig, PaymentContext};
use payflow_interactor::{
    CardField, CardTokenizationConfiguration, CardTokenizationInteractor, CardTokenizationState,
    NativePaymentConfiguration, NativePaymentInteractor, NativePaymentState,
};
use sandbox::{SandboxCards, SandboxInvoices};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let config = load_config()?;
    info!(
        waits_confirmation = config.waits_confirmation,
        timeout = ?config.confirmation_timeout(),
        page_size = config.page_size,
        "Configuration loaded"
    );

    run_native_payment(config).await?;
    run_card_tokenization().await?;

    Ok(())
}

fn load_config() -> anyhow::Result<FlowConfig> {
    let config = match std::env::var("PAYFLOW_CONFIG") {
        Ok(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {path}"))?;
            FlowConfig::from_toml_str(&content)?
        }
        Err(_) => FlowConfig::from_env()?,
    };
    Ok(config)
}

/// Log every state the interactor publishes until it goes away.
fn log_states<S>(name: &'static str, mut states: watch::Receiver<S>)
where
    S: Debug + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interactor = name, state = ?*states.borrow_and_update(), "State");
        while states.changed().await.is_ok() {
            info!(interactor = name, state = ?*states.borrow_and_update(), "State");
        }
    });
}

async fn run_native_payment(config: FlowConfig) -> anyhow::Result<()> {
    let invoices = Arc::new(SandboxInvoices::new(3));
    let configuration =
        NativePaymentConfiguration::new(PaymentContext::new("iv_sandbox", "gway_conf_blik"))
            .with_flow(config);
    let (interactor, completion) = NativePaymentInteractor::spawn(invoices, configuration, None);
    info!(attempt = %interactor.attempt_id(), "💸 Native payment");

    let mut states = interactor.subscribe();
    log_states("native", interactor.subscribe());

    interactor.start();
    states
        .wait_for(|s| matches!(s, NativePaymentState::Started(_)))
        .await?;
    // First page may be short of the full schema.
    while interactor.state().started().map_or(false, |s| s.are_more_available) {
        interactor.load_more();
        states.changed().await?;
        states
            .wait_for(|s| matches!(s, NativePaymentState::Started(_)))
            .await?;
    }

    interactor.update_field("email", "jane@example.com");
    interactor.update_field("phone", "+48 600 700 800");
    interactor.update_field("blik_code", "777 123");
    interactor.submit();

    match completion.wait().await {
        Ok(()) => info!("✅ Native payment finished: {:?}", interactor.state()),
        Err(failure) => warn!(%failure, "❌ Native payment failed"),
    }
    Ok(())
}

async fn run_card_tokenization() -> anyhow::Result<()> {
    let configuration = CardTokenizationConfiguration::default().with_metadata("source", "sandbox");
    let (interactor, completion) =
        CardTokenizationInteractor::spawn(Arc::new(SandboxCards), configuration, None);
    info!(attempt = %interactor.attempt_id(), "💳 Card tokenization");

    let mut states = interactor.subscribe();
    log_states("card", interactor.subscribe());

    interactor.start();
    interactor.update_field(CardField::Number, "4970 1012 3456 7893");
    interactor.update_field(CardField::Expiration, "12/30");
    interactor.update_field(CardField::Cvc, "123");
    interactor.update_field(CardField::CardholderName, "Jane Doe");

    // Choose the co-scheme once the issuer lookup reports it.
    states
        .wait_for(|s| match s {
            CardTokenizationState::Started(started) => started
                .issuer_hint
                .as_ref()
                .map_or(false, |hint| hint.co_scheme.is_some()),
            _ => false,
        })
        .await?;
    interactor.set_preferred_scheme("carte bancaire");
    interactor.tokenize();

    match completion.wait().await {
        Ok(card) => info!(card = %card.id, scheme = %card.scheme, "✅ Card tokenized"),
        Err(failure) => warn!(%failure, "❌ Card tokenization failed"),
    }
    Ok(())
}

fn print_banner() {
    println!(
        r#"
  💸 payflow-rs 💸
  ━━━━━━━━━━━━━━━━━━━━━━━
  Payment authorization sandbox
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
